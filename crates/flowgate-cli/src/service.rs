use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use flowgate_core::engine::{
    AuthorizedTeams, CASE_READ, CasePermissionEngine, CaseReader, LookupError, ModuleGrants,
    StagePermissionEngine, StageReader, WORKFLOW_READ, WorkflowPermissionEngine, WorkflowReader,
    admin_bypass,
};
use flowgate_core::{
    EntityId, ErrorCode, GrantReason, OperationType, PermissionInfo, PermissionResult, UserContext,
};
use flowgate_storage::{EntityStore, StorageError, StoreFactory};
use serde::Serialize;

use crate::adapter::StoreEntityReader;
use crate::audit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Workflow,
    Stage,
    Case,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Workflow => "workflow",
            ResourceType::Stage => "stage",
            ResourceType::Case => "case",
        }
    }

    /// Stages are governed by the workflow module.
    pub fn module_code(self, operation: OperationType) -> &'static str {
        match (self, operation) {
            (ResourceType::Case, OperationType::View) => CASE_READ,
            (ResourceType::Case, OperationType::Operate) => "CASE:UPDATE",
            (ResourceType::Case, OperationType::Delete) => "CASE:DELETE",
            (_, OperationType::View) => WORKFLOW_READ,
            (_, OperationType::Operate) => "WORKFLOW:UPDATE",
            (_, OperationType::Delete) => "WORKFLOW:DELETE",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// View and operate answered together, as a detail page needs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcePermission {
    pub can_view: bool,
    pub can_operate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_reason: Option<GrantReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

type Reader<F> = StoreEntityReader<<F as StoreFactory>::Store>;

pub struct PermissionService<F: StoreFactory> {
    factory: Arc<F>,
}

impl<F: StoreFactory> PermissionService<F> {
    pub fn new(factory: Arc<F>) -> Self {
        Self { factory }
    }

    fn tenant(&self, tenant_id: &str) -> (Arc<F::Store>, Arc<Reader<F>>) {
        let store = Arc::new(self.factory.for_tenant(tenant_id));
        let reader = Arc::new(StoreEntityReader::new(Arc::clone(&store)));
        (store, reader)
    }

    fn effective_grants(ctx: &UserContext, grants: ModuleGrants) -> ModuleGrants {
        if ctx.is_portal_token_with_portal_access() {
            tracing::debug!(
                user_id = %ctx.user_id,
                "portal access, module permission not required"
            );
            return ModuleGrants::ALL;
        }
        grants
    }

    fn precheck(
        resource: ResourceType,
        ctx: &UserContext,
        entity_id: EntityId,
        operation: OperationType,
        grants: ModuleGrants,
    ) -> Option<PermissionResult> {
        if let Some(result) = admin_bypass(ctx) {
            tracing::info!(
                user_id = %ctx.user_id,
                %resource,
                entity_id,
                reason = result.reason(),
                "admin bypassing permission checks"
            );
            return Some(result);
        }

        if entity_id <= 0 || ctx.numeric_user_id().is_none_or(|id| id <= 0) {
            return Some(PermissionResult::denied(
                format!("Invalid user ID or {resource} ID"),
                ErrorCode::InvalidInput,
            ));
        }

        let grants = Self::effective_grants(ctx, grants);
        let granted = if operation.requires_operate() {
            grants.operate
        } else {
            grants.view
        };
        if !granted {
            let code = resource.module_code(operation);
            tracing::warn!(
                user_id = %ctx.user_id,
                permission = code,
                "module permission check failed"
            );
            return Some(PermissionResult::denied(
                format!("User does not have required module permission: {code}"),
                ErrorCode::ModulePermissionDenied,
            ));
        }

        None
    }

    pub async fn check_access(
        &self,
        resource: ResourceType,
        ctx: &UserContext,
        entity_id: EntityId,
        operation: OperationType,
        grants: ModuleGrants,
    ) -> PermissionResult {
        match resource {
            ResourceType::Workflow => {
                self.check_workflow_access(ctx, entity_id, operation, grants)
                    .await
            }
            ResourceType::Stage => {
                self.check_stage_access(ctx, entity_id, operation, grants)
                    .await
            }
            ResourceType::Case => {
                self.check_case_access(ctx, entity_id, operation, grants)
                    .await
            }
        }
    }

    pub async fn check_workflow_access(
        &self,
        ctx: &UserContext,
        workflow_id: EntityId,
        operation: OperationType,
        grants: ModuleGrants,
    ) -> PermissionResult {
        let result = self
            .workflow_access(ctx, workflow_id, operation, grants)
            .await;
        audit::audit_permission_check(ctx, ResourceType::Workflow, workflow_id, operation, &result);
        result
    }

    async fn workflow_access(
        &self,
        ctx: &UserContext,
        workflow_id: EntityId,
        operation: OperationType,
        grants: ModuleGrants,
    ) -> PermissionResult {
        if let Some(result) =
            Self::precheck(ResourceType::Workflow, ctx, workflow_id, operation, grants)
        {
            return result;
        }

        let (_, reader) = self.tenant(ctx.tenant_id());
        let workflow = match reader.workflow(workflow_id).await {
            Ok(Some(workflow)) => workflow,
            Ok(None) => {
                return PermissionResult::denied("Workflow not found", ErrorCode::WorkflowNotFound);
            }
            Err(e) => return check_error(ResourceType::Workflow, workflow_id, &e),
        };

        WorkflowPermissionEngine::new(reader).check_workflow_permission(&workflow, ctx, operation)
    }

    pub async fn check_stage_access(
        &self,
        ctx: &UserContext,
        stage_id: EntityId,
        operation: OperationType,
        grants: ModuleGrants,
    ) -> PermissionResult {
        let result = self.stage_access(ctx, stage_id, operation, grants).await;
        audit::audit_permission_check(ctx, ResourceType::Stage, stage_id, operation, &result);
        result
    }

    async fn stage_access(
        &self,
        ctx: &UserContext,
        stage_id: EntityId,
        operation: OperationType,
        grants: ModuleGrants,
    ) -> PermissionResult {
        if let Some(result) = Self::precheck(ResourceType::Stage, ctx, stage_id, operation, grants)
        {
            return result;
        }

        let (_, reader) = self.tenant(ctx.tenant_id());
        let stage = match reader.stage(stage_id).await {
            Ok(Some(stage)) => stage,
            Ok(None) => {
                return PermissionResult::denied("Stage not found", ErrorCode::StageNotFound);
            }
            Err(e) => return check_error(ResourceType::Stage, stage_id, &e),
        };
        let workflow = match reader.workflow(stage.workflow_id).await {
            Ok(Some(workflow)) => workflow,
            Ok(None) => {
                return PermissionResult::denied(
                    "Parent workflow not found",
                    ErrorCode::WorkflowNotFound,
                );
            }
            Err(e) => return check_error(ResourceType::Workflow, stage.workflow_id, &e),
        };

        let engine = StagePermissionEngine::new(Arc::clone(&reader), reader);
        if engine.check_assigned_user(&stage, ctx) {
            return PermissionResult::full_access(GrantReason::AssignedTo);
        }
        engine.check_stage_permission(&stage, &workflow, ctx, operation, None)
    }

    pub async fn check_case_access(
        &self,
        ctx: &UserContext,
        case_id: EntityId,
        operation: OperationType,
        grants: ModuleGrants,
    ) -> PermissionResult {
        let result = self.case_access(ctx, case_id, operation, grants).await;
        audit::audit_permission_check(ctx, ResourceType::Case, case_id, operation, &result);
        result
    }

    async fn case_access(
        &self,
        ctx: &UserContext,
        case_id: EntityId,
        operation: OperationType,
        grants: ModuleGrants,
    ) -> PermissionResult {
        if let Some(result) = Self::precheck(ResourceType::Case, ctx, case_id, operation, grants) {
            return result;
        }

        let (_, reader) = self.tenant(ctx.tenant_id());
        let case = match reader.case(case_id).await {
            Ok(Some(case)) => case,
            Ok(None) => return PermissionResult::denied("Case not found", ErrorCode::CaseNotFound),
            Err(e) => return check_error(ResourceType::Case, case_id, &e),
        };

        CasePermissionEngine::new(Arc::clone(&reader), reader)
            .check_case_permission(&case, ctx, operation)
            .await
    }

    /// Operate is only asked when view passed.
    pub async fn check_resource_permission(
        &self,
        resource: ResourceType,
        ctx: &UserContext,
        entity_id: EntityId,
        grants: ModuleGrants,
    ) -> ResourcePermission {
        let view = self
            .check_access(resource, ctx, entity_id, OperationType::View, grants)
            .await;
        if !view.success() {
            return ResourcePermission {
                can_view: false,
                can_operate: false,
                grant_reason: None,
                error_message: view.error_message().map(str::to_string),
            };
        }

        let operate = self
            .check_access(resource, ctx, entity_id, OperationType::Operate, grants)
            .await;
        ResourcePermission {
            can_view: true,
            can_operate: operate.success(),
            grant_reason: if operate.success() {
                operate.grant_reason()
            } else {
                view.grant_reason()
            },
            error_message: None,
        }
    }

    pub async fn annotate_workflows(
        &self,
        ctx: &UserContext,
        grants: ModuleGrants,
    ) -> Result<BTreeMap<EntityId, PermissionInfo>, StorageError> {
        let (store, reader) = self.tenant(ctx.tenant_id());
        let workflows = store.list_workflows().await?;
        let grants = Self::effective_grants(ctx, grants);

        let infos = WorkflowPermissionEngine::new(reader)
            .check_batch_workflow_permissions(&workflows, ctx, grants);
        Ok(finish_annotation(ctx, ResourceType::Workflow, infos))
    }

    pub async fn annotate_stages(
        &self,
        ctx: &UserContext,
        workflow_id: Option<EntityId>,
        grants: ModuleGrants,
    ) -> Result<BTreeMap<EntityId, PermissionInfo>, StorageError> {
        let (store, reader) = self.tenant(ctx.tenant_id());
        let stages = store.list_stages(workflow_id).await?;
        let grants = Self::effective_grants(ctx, grants);

        let infos = StagePermissionEngine::new(Arc::clone(&reader), reader)
            .check_batch_stage_permissions(&stages, ctx, grants)
            .await;
        Ok(finish_annotation(ctx, ResourceType::Stage, infos))
    }

    pub async fn annotate_cases(
        &self,
        ctx: &UserContext,
        workflow_id: Option<EntityId>,
        grants: ModuleGrants,
    ) -> Result<BTreeMap<EntityId, PermissionInfo>, StorageError> {
        let (store, reader) = self.tenant(ctx.tenant_id());
        let cases = store.list_cases(workflow_id).await?;
        let grants = Self::effective_grants(ctx, grants);

        let infos = CasePermissionEngine::new(Arc::clone(&reader), reader)
            .check_batch_case_permissions(&cases, ctx, grants)
            .await;
        Ok(finish_annotation(ctx, ResourceType::Case, infos))
    }

    pub async fn authorized_teams(&self, tenant_id: &str, stage_id: EntityId) -> AuthorizedTeams {
        let (_, reader) = self.tenant(tenant_id);
        StagePermissionEngine::new(Arc::clone(&reader), reader)
            .get_authorized_team_ids(stage_id)
            .await
    }
}

fn check_error(
    resource: ResourceType,
    entity_id: EntityId,
    error: &LookupError,
) -> PermissionResult {
    tracing::error!(
        %resource,
        entity_id,
        error = %error,
        "failed to load entity for permission check"
    );
    PermissionResult::denied(
        "Internal error during permission check",
        ErrorCode::PermissionCheckError,
    )
}

fn finish_annotation(
    ctx: &UserContext,
    resource: ResourceType,
    infos: HashMap<EntityId, PermissionInfo>,
) -> BTreeMap<EntityId, PermissionInfo> {
    let visible = infos.values().filter(|i| i.can_view()).count();
    audit::audit_list_annotation(ctx, resource, infos.len(), visible);
    infos.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_core::{Case, Stage, ViewPermissionMode, Workflow};
    use flowgate_storage::InMemoryStoreFactory;

    async fn make_service() -> PermissionService<InMemoryStoreFactory> {
        let factory = InMemoryStoreFactory::new();
        let store = factory.for_tenant("DEFAULT");
        store
            .insert_workflow(Workflow {
                id: 1,
                name: "Onboarding".to_string(),
                view_permission_mode: ViewPermissionMode::VisibleToTeams,
                view_teams: Some(r#"["A","B"]"#.to_string()),
                operate_teams: Some(r#"["A"]"#.to_string()),
                create_user_id: Some(1),
            })
            .await
            .unwrap();
        store
            .insert_stage(Stage {
                id: 10,
                workflow_id: 1,
                name: "Review".to_string(),
                default_assignee: Some(r#"["9"]"#.to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .insert_stage(Stage {
                id: 11,
                workflow_id: 99,
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .insert_case(Case {
                id: 100,
                workflow_id: 1,
                ownership: Some(42),
                view_permission_mode: ViewPermissionMode::Private,
                ..Default::default()
            })
            .await
            .unwrap();
        PermissionService::new(Arc::new(factory))
    }

    #[test]
    fn module_codes_follow_resource_and_operation() {
        assert_eq!(ResourceType::Stage.module_code(OperationType::View), "WORKFLOW:READ");
        assert_eq!(ResourceType::Case.module_code(OperationType::Operate), "CASE:UPDATE");
        assert_eq!(ResourceType::Workflow.module_code(OperationType::Delete), "WORKFLOW:DELETE");
    }

    #[tokio::test]
    async fn invalid_ids_are_rejected() {
        let service = make_service().await;

        let result = service
            .check_workflow_access(
                &UserContext::new("5"),
                0,
                OperationType::View,
                ModuleGrants::ALL,
            )
            .await;
        assert_eq!(result.error_code(), Some(ErrorCode::InvalidInput));

        let result = service
            .check_workflow_access(
                &UserContext::new("alice"),
                1,
                OperationType::View,
                ModuleGrants::ALL,
            )
            .await;
        assert_eq!(result.error_code(), Some(ErrorCode::InvalidInput));
    }

    #[tokio::test]
    async fn admin_bypass_precedes_validation() {
        let service = make_service().await;
        let ctx = UserContext::new("alice").as_system_admin();

        let result = service
            .check_case_access(
                &ctx,
                -3,
                OperationType::Delete,
                ModuleGrants {
                    view: false,
                    operate: false,
                },
            )
            .await;

        assert!(result.success());
        assert_eq!(result.grant_reason(), Some(GrantReason::SystemAdmin));
    }

    #[tokio::test]
    async fn missing_module_permission_is_denied() {
        let service = make_service().await;
        let ctx = UserContext::new("5").in_teams(["A"]);
        let view_only = ModuleGrants {
            view: true,
            operate: false,
        };

        let result = service
            .check_workflow_access(&ctx, 1, OperationType::Operate, view_only)
            .await;

        assert_eq!(result.error_code(), Some(ErrorCode::ModulePermissionDenied));
        assert_eq!(
            result.error_message(),
            Some("User does not have required module permission: WORKFLOW:UPDATE")
        );
    }

    #[tokio::test]
    async fn portal_access_skips_module_check() {
        let service = make_service().await;
        let ctx = UserContext::new("5").in_teams(["A"]).with_portal_access();

        let result = service
            .check_workflow_access(
                &ctx,
                1,
                OperationType::Operate,
                ModuleGrants {
                    view: false,
                    operate: false,
                },
            )
            .await;

        assert!(result.success());
    }

    #[tokio::test]
    async fn missing_entities_report_not_found_codes() {
        let service = make_service().await;
        let ctx = UserContext::new("5").in_teams(["A"]);

        let wf = service
            .check_workflow_access(&ctx, 2, OperationType::View, ModuleGrants::ALL)
            .await;
        assert_eq!(wf.error_code(), Some(ErrorCode::WorkflowNotFound));

        let stage = service
            .check_stage_access(&ctx, 12, OperationType::View, ModuleGrants::ALL)
            .await;
        assert_eq!(stage.error_code(), Some(ErrorCode::StageNotFound));

        let orphan = service
            .check_stage_access(&ctx, 11, OperationType::View, ModuleGrants::ALL)
            .await;
        assert_eq!(orphan.error_code(), Some(ErrorCode::WorkflowNotFound));

        let case = service
            .check_case_access(&ctx, 101, OperationType::View, ModuleGrants::ALL)
            .await;
        assert_eq!(case.error_code(), Some(ErrorCode::CaseNotFound));
    }

    #[tokio::test]
    async fn assigned_user_gets_full_stage_access() {
        let service = make_service().await;
        // Team Z cannot see the workflow at all.
        let ctx = UserContext::new("9").in_teams(["Z"]);

        let result = service
            .check_stage_access(&ctx, 10, OperationType::Operate, ModuleGrants::ALL)
            .await;

        assert!(result.success() && result.can_operate());
        assert_eq!(result.grant_reason(), Some(GrantReason::AssignedTo));
    }

    #[tokio::test]
    async fn resource_permission_combines_view_and_operate() {
        let service = make_service().await;

        let viewer = service
            .check_resource_permission(
                ResourceType::Workflow,
                &UserContext::new("5").in_teams(["B"]),
                1,
                ModuleGrants::ALL,
            )
            .await;
        assert!(viewer.can_view);
        assert!(!viewer.can_operate);
        assert_eq!(viewer.grant_reason, Some(GrantReason::ViewPermission));
        assert!(viewer.error_message.is_none());

        let outsider = service
            .check_resource_permission(
                ResourceType::Workflow,
                &UserContext::new("5").in_teams(["C"]),
                1,
                ModuleGrants::ALL,
            )
            .await;
        assert!(!outsider.can_view);
        assert!(outsider.error_message.is_some());
    }

    #[tokio::test]
    async fn annotate_covers_every_listed_entity() {
        let service = make_service().await;
        let ctx = UserContext::new("5").in_teams(["A"]);

        let stages = service
            .annotate_stages(&ctx, None, ModuleGrants::ALL)
            .await
            .unwrap();
        assert_eq!(stages.keys().copied().collect::<Vec<_>>(), vec![10, 11]);
        assert!(stages[&10].can_operate());
        assert!(!stages[&11].can_view());

        let cases = service
            .annotate_cases(&UserContext::new("42"), Some(1), ModuleGrants::ALL)
            .await
            .unwrap();
        assert!(cases[&100].can_operate());
    }

    #[tokio::test]
    async fn tenants_do_not_share_entities() {
        let service = make_service().await;
        let ctx = UserContext::new("5").in_teams(["A"]).with_tenant("acme");

        let workflows = service
            .annotate_workflows(&ctx, ModuleGrants::ALL)
            .await
            .unwrap();

        assert!(workflows.is_empty());
    }

    #[tokio::test]
    async fn authorized_teams_by_stage() {
        let service = make_service().await;

        let teams = service.authorized_teams("DEFAULT", 10).await;

        assert!(!teams.has_error());
        assert_eq!(teams.team_ids(), ["A", "B"]);
    }
}
