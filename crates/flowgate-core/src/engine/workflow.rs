use std::collections::HashMap;
use std::sync::Arc;

use crate::context::UserContext;
use crate::entity::{EntityId, PermissionSubject, ViewPermissionMode, Workflow};
use crate::primitives::{
    check_operate_teams_public_mode, check_team_blacklist, check_team_whitelist,
};
use crate::result::{ErrorCode, GrantReason, OperationType, PermissionInfo, PermissionResult};

use super::{ModuleGrants, WORKFLOW_READ, WorkflowReader, admin_bypass};

/// Team-based view rule shared by workflows and stages.
pub fn check_view_permission<S: PermissionSubject>(
    subject: &S,
    ctx: &UserContext,
    user_team_ids: &[String],
) -> bool {
    match subject.view_mode() {
        ViewPermissionMode::Public => true,
        ViewPermissionMode::VisibleToTeams => {
            check_team_whitelist(subject.view_teams(), user_team_ids)
        }
        ViewPermissionMode::InvisibleToTeams => {
            check_team_blacklist(subject.view_teams(), user_team_ids)
        }
        ViewPermissionMode::Private => ctx.is_owner(subject.create_user_id()),
    }
}

/// Operate is not symmetric with view: only `InvisibleToTeams` treats the
/// operate list as a blacklist.
pub fn check_operate_permission<S: PermissionSubject>(
    subject: &S,
    user_team_ids: &[String],
) -> bool {
    tracing::debug!(
        entity_id = subject.id(),
        mode = %subject.view_mode(),
        operate_teams = subject.operate_teams().unwrap_or("NULL"),
        "checking operate permission"
    );

    match subject.view_mode() {
        ViewPermissionMode::Public => {
            check_operate_teams_public_mode(subject.operate_teams(), user_team_ids)
        }
        ViewPermissionMode::InvisibleToTeams => {
            check_team_blacklist(subject.operate_teams(), user_team_ids)
        }
        ViewPermissionMode::VisibleToTeams | ViewPermissionMode::Private => {
            check_team_whitelist(subject.operate_teams(), user_team_ids)
        }
    }
}

pub struct WorkflowPermissionEngine<W: WorkflowReader> {
    workflows: Arc<W>,
}

impl<W: WorkflowReader> WorkflowPermissionEngine<W> {
    pub fn new(workflows: Arc<W>) -> Self {
        Self { workflows }
    }

    pub fn check_workflow_permission(
        &self,
        workflow: &Workflow,
        ctx: &UserContext,
        operation: OperationType,
    ) -> PermissionResult {
        if let Some(result) = admin_bypass(ctx) {
            return result;
        }

        let team_ids = ctx.team_ids();
        tracing::debug!(
            workflow_id = workflow.id,
            mode = %workflow.view_permission_mode,
            view_teams = workflow.view_teams.as_deref().unwrap_or("NULL"),
            operate_teams = workflow.operate_teams.as_deref().unwrap_or("NULL"),
            user_teams = ?team_ids,
            "checking workflow permission"
        );

        let can_view = check_view_permission(workflow, ctx, &team_ids);
        let can_operate = can_view
            && operation.requires_operate()
            && check_operate_permission(workflow, &team_ids);

        match operation {
            OperationType::View if can_view => {
                PermissionResult::view_granted(GrantReason::ViewPermission)
            }
            OperationType::View => PermissionResult::denied(
                "User does not have view permission for this workflow",
                ErrorCode::ViewPermissionDenied,
            ),
            OperationType::Operate | OperationType::Delete => {
                if can_operate {
                    PermissionResult::full_access(GrantReason::OperatePermission)
                } else if can_view {
                    PermissionResult::view_only(
                        "User has view permission but not operate permission",
                        ErrorCode::OperatePermissionDenied,
                    )
                } else {
                    PermissionResult::denied(
                        "User does not have permission for this workflow",
                        ErrorCode::PermissionDenied,
                    )
                }
            }
        }
    }

    /// Entity-level view check only; module permission is the caller's job.
    pub async fn check_workflow_view_permission(
        &self,
        workflow_id: EntityId,
        ctx: &UserContext,
        preloaded: Option<&Workflow>,
    ) -> bool {
        if ctx.has_admin_privileges() {
            return true;
        }

        let loaded;
        let workflow = match preloaded {
            Some(w) => w,
            None => match self.workflows.workflow(workflow_id).await {
                Ok(Some(w)) => {
                    loaded = w;
                    &loaded
                }
                Ok(None) => {
                    tracing::warn!(workflow_id, "workflow not found");
                    return false;
                }
                Err(e) => {
                    tracing::error!(workflow_id, error = %e, "failed to load workflow");
                    return false;
                }
            },
        };

        check_view_permission(workflow, ctx, &ctx.team_ids())
    }

    pub fn workflow_permission_info(
        &self,
        workflow: &Workflow,
        ctx: &UserContext,
        grants: ModuleGrants,
        user_team_ids: Option<&[String]>,
    ) -> PermissionInfo {
        if ctx.has_admin_privileges() {
            return PermissionInfo::full_access();
        }
        if !grants.view {
            return PermissionInfo::denied(format!(
                "User does not have required module permission: {WORKFLOW_READ}"
            ));
        }

        let resolved;
        let team_ids = match user_team_ids {
            Some(ids) => ids,
            None => {
                resolved = ctx.team_ids();
                &resolved
            }
        };

        if !check_view_permission(workflow, ctx, team_ids) {
            return PermissionInfo::denied("User is not in allowed teams to view this workflow");
        }

        let can_operate = grants.operate && check_operate_permission(workflow, team_ids);
        PermissionInfo::visible(can_operate)
    }

    pub async fn get_workflow_permission_info_for_list(
        &self,
        workflow_id: EntityId,
        ctx: &UserContext,
        grants: ModuleGrants,
    ) -> PermissionInfo {
        if ctx.has_admin_privileges() {
            return PermissionInfo::full_access();
        }
        if !grants.view {
            return PermissionInfo::denied(format!(
                "User does not have required module permission: {WORKFLOW_READ}"
            ));
        }

        match self.workflows.workflow(workflow_id).await {
            Ok(Some(workflow)) => self.workflow_permission_info(&workflow, ctx, grants, None),
            Ok(None) => PermissionInfo::denied(format!("Workflow {workflow_id} not found")),
            Err(e) => {
                tracing::error!(workflow_id, error = %e, "failed to load workflow for list");
                PermissionInfo::denied(format!("Workflow {workflow_id} could not be loaded"))
            }
        }
    }

    pub fn check_batch_workflow_permissions(
        &self,
        workflows: &[Workflow],
        ctx: &UserContext,
        grants: ModuleGrants,
    ) -> HashMap<EntityId, PermissionInfo> {
        if ctx.has_admin_privileges() {
            return workflows
                .iter()
                .map(|w| (w.id, PermissionInfo::full_access()))
                .collect();
        }

        let team_ids = ctx.team_ids();
        workflows
            .iter()
            .map(|w| {
                (
                    w.id,
                    self.workflow_permission_info(w, ctx, grants, Some(&team_ids)),
                )
            })
            .collect()
    }
}
