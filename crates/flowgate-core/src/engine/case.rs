use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::context::UserContext;
use crate::entity::{Case, EntityId, PermissionSubjectType, ViewPermissionMode, Workflow};
use crate::primitives::{
    check_operate_teams_public_mode, check_operate_users_public_mode, check_team_blacklist,
    check_team_whitelist, check_user_blacklist, check_user_whitelist,
};
use crate::result::{ErrorCode, GrantReason, OperationType, PermissionInfo, PermissionResult};

use super::workflow::{check_operate_permission, check_view_permission};
use super::{CASE_READ, CaseReader, LookupError, ModuleGrants, WorkflowReader, admin_bypass};

type WorkflowLookup = Result<Option<Workflow>, LookupError>;

pub struct CasePermissionEngine<C: CaseReader, W: WorkflowReader> {
    cases: Arc<C>,
    workflows: Arc<W>,
}

impl<C: CaseReader, W: WorkflowReader> CasePermissionEngine<C, W> {
    pub fn new(cases: Arc<C>, workflows: Arc<W>) -> Self {
        Self { cases, workflows }
    }

    /// Fetches the parent workflow only when the case is public and the user
    /// is neither admin nor owner.
    pub async fn check_case_permission(
        &self,
        case: &Case,
        ctx: &UserContext,
        operation: OperationType,
    ) -> PermissionResult {
        let team_ids = ctx.team_ids();
        let mut workflows = HashMap::new();
        self.decide(case, ctx, operation, &team_ids, &mut workflows)
            .await
    }

    /// Same decision as [`Self::check_case_permission`] with the parent
    /// workflow lookup supplied by the caller.
    pub fn evaluate_with_workflow(
        &self,
        case: &Case,
        ctx: &UserContext,
        operation: OperationType,
        workflow: WorkflowLookup,
    ) -> PermissionResult {
        if let Some(result) = bypass(case, ctx) {
            return result;
        }

        let team_ids = ctx.team_ids();
        if case.view_permission_mode == ViewPermissionMode::Public {
            self.inherit(case, ctx, operation, &team_ids, &workflow)
        } else {
            own_rules(case, ctx, operation, &team_ids)
        }
    }

    pub async fn get_case_permission_info_for_list(
        &self,
        case_id: EntityId,
        ctx: &UserContext,
        grants: ModuleGrants,
    ) -> PermissionInfo {
        if ctx.has_admin_privileges() {
            return PermissionInfo::full_access();
        }
        if !grants.view {
            return module_denied();
        }

        let case = match self.cases.case(case_id).await {
            Ok(Some(case)) => case,
            Ok(None) => return PermissionInfo::denied(format!("Case {case_id} not found")),
            Err(e) => {
                tracing::error!(case_id, error = %e, "failed to load case for list");
                return PermissionInfo::denied(format!("Case {case_id} could not be loaded"));
            }
        };

        let team_ids = ctx.team_ids();
        let mut workflows = HashMap::new();
        self.info(&case, ctx, grants, &team_ids, &mut workflows)
            .await
    }

    /// One entry per input case. Parent workflows are fetched at most once
    /// per distinct id.
    pub async fn check_batch_case_permissions(
        &self,
        cases: &[Case],
        ctx: &UserContext,
        grants: ModuleGrants,
    ) -> HashMap<EntityId, PermissionInfo> {
        if ctx.has_admin_privileges() {
            return cases
                .iter()
                .map(|c| (c.id, PermissionInfo::full_access()))
                .collect();
        }
        if !grants.view {
            return cases.iter().map(|c| (c.id, module_denied())).collect();
        }

        let team_ids = ctx.team_ids();
        let mut workflows = HashMap::new();
        let mut infos = HashMap::with_capacity(cases.len());
        for case in cases {
            let info = self
                .info(case, ctx, grants, &team_ids, &mut workflows)
                .await;
            infos.insert(case.id, info);
        }

        tracing::debug!(
            cases = cases.len(),
            workflows_loaded = workflows.len(),
            "batch case permissions computed"
        );
        infos
    }

    async fn info(
        &self,
        case: &Case,
        ctx: &UserContext,
        grants: ModuleGrants,
        team_ids: &[String],
        workflows: &mut HashMap<EntityId, WorkflowLookup>,
    ) -> PermissionInfo {
        let operation = if grants.operate {
            OperationType::Operate
        } else {
            OperationType::View
        };
        let result = self
            .decide(case, ctx, operation, team_ids, workflows)
            .await;
        PermissionInfo::from(&result)
    }

    async fn decide(
        &self,
        case: &Case,
        ctx: &UserContext,
        operation: OperationType,
        team_ids: &[String],
        workflows: &mut HashMap<EntityId, WorkflowLookup>,
    ) -> PermissionResult {
        tracing::debug!(
            case_id = case.id,
            workflow_id = case.workflow_id,
            mode = %case.view_permission_mode,
            view_subject = ?case.view_permission_subject_type,
            operate_subject = ?case.operate_permission_subject_type,
            ownership = ?case.ownership,
            user_teams = ?team_ids,
            %operation,
            "checking case permission"
        );

        if let Some(result) = bypass(case, ctx) {
            return result;
        }
        if case.view_permission_mode != ViewPermissionMode::Public {
            return own_rules(case, ctx, operation, team_ids);
        }

        let lookup = match workflows.entry(case.workflow_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.workflows.workflow(case.workflow_id).await),
        };
        self.inherit(case, ctx, operation, team_ids, lookup)
    }

    fn inherit(
        &self,
        case: &Case,
        ctx: &UserContext,
        operation: OperationType,
        team_ids: &[String],
        lookup: &WorkflowLookup,
    ) -> PermissionResult {
        let workflow = match lookup {
            Ok(Some(workflow)) => workflow,
            Ok(None) => {
                tracing::warn!(
                    case_id = case.id,
                    workflow_id = case.workflow_id,
                    "workflow not found, falling back to case rules"
                );
                return own_rules(case, ctx, operation, team_ids);
            }
            Err(e) => {
                tracing::error!(
                    case_id = case.id,
                    workflow_id = case.workflow_id,
                    error = %e,
                    "workflow lookup failed, falling back to case rules"
                );
                return own_rules(case, ctx, operation, team_ids);
            }
        };

        if !check_view_permission(workflow, ctx, team_ids) {
            tracing::debug!(
                case_id = case.id,
                workflow_id = workflow.id,
                "no view on parent workflow"
            );
            return PermissionResult::denied(
                "User does not have view permission on parent workflow",
                ErrorCode::WorkflowViewPermissionDenied,
            );
        }

        if !operation.requires_operate() {
            return PermissionResult::view_granted(GrantReason::WorkflowInheritedViewPermission);
        }

        if check_operate_permission(workflow, team_ids) {
            PermissionResult::full_access(GrantReason::WorkflowInheritedOperatePermission)
        } else {
            tracing::debug!(
                case_id = case.id,
                workflow_id = workflow.id,
                "no operate on parent workflow"
            );
            PermissionResult::view_only(
                "User has view permission but not operate permission on parent workflow",
                ErrorCode::WorkflowOperatePermissionDenied,
            )
        }
    }
}

fn module_denied() -> PermissionInfo {
    PermissionInfo::denied(format!(
        "User does not have required module permission: {CASE_READ}"
    ))
}

fn bypass(case: &Case, ctx: &UserContext) -> Option<PermissionResult> {
    if let Some(result) = admin_bypass(ctx) {
        return Some(result);
    }
    if ctx.is_owner(case.ownership) {
        tracing::debug!(case_id = case.id, user_id = %ctx.user_id, "user owns case");
        return Some(PermissionResult::full_access(GrantReason::Owner));
    }
    None
}

fn own_rules(
    case: &Case,
    ctx: &UserContext,
    operation: OperationType,
    team_ids: &[String],
) -> PermissionResult {
    if !case_can_view(case, ctx, team_ids) {
        return PermissionResult::denied(
            "User does not have view permission for this case",
            ErrorCode::ViewPermissionDenied,
        );
    }

    if !operation.requires_operate() {
        return PermissionResult::view_granted(GrantReason::CaseViewPermission);
    }

    if case_can_operate(case, ctx, team_ids) {
        PermissionResult::full_access(GrantReason::CaseOperatePermission)
    } else {
        PermissionResult::view_only(
            "User has view permission but not operate permission for this case",
            ErrorCode::OperatePermissionDenied,
        )
    }
}

// Private is a deny here: owners were already admitted by `bypass`.
fn case_can_view(case: &Case, ctx: &UserContext, team_ids: &[String]) -> bool {
    let by_team = case.view_permission_subject_type == PermissionSubjectType::Team;
    let teams = case.view_teams.as_deref();
    let users = case.view_users.as_deref();

    match case.view_permission_mode {
        ViewPermissionMode::Public => true,
        ViewPermissionMode::VisibleToTeams if by_team => check_team_whitelist(teams, team_ids),
        ViewPermissionMode::VisibleToTeams => check_user_whitelist(users, &ctx.user_id),
        ViewPermissionMode::InvisibleToTeams if by_team => check_team_blacklist(teams, team_ids),
        ViewPermissionMode::InvisibleToTeams => check_user_blacklist(users, &ctx.user_id),
        ViewPermissionMode::Private => false,
    }
}

// Always a whitelist; only a public case lets an empty list admit everyone.
fn case_can_operate(case: &Case, ctx: &UserContext, team_ids: &[String]) -> bool {
    let public = case.view_permission_mode == ViewPermissionMode::Public;
    let teams = case.operate_teams.as_deref();
    let users = case.operate_users.as_deref();

    match case.operate_permission_subject_type {
        PermissionSubjectType::Team if public => check_operate_teams_public_mode(teams, team_ids),
        PermissionSubjectType::Team => check_team_whitelist(teams, team_ids),
        PermissionSubjectType::User if public => {
            check_operate_users_public_mode(users, &ctx.user_id)
        }
        PermissionSubjectType::User => check_user_whitelist(users, &ctx.user_id),
    }
}
