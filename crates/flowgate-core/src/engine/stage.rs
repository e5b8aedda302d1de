use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use crate::context::UserContext;
use crate::entity::{EntityId, Stage, ViewPermissionMode, Workflow};
use crate::primitives::{check_operate_teams_public_mode, check_team_whitelist, decode_id_list};
use crate::result::{ErrorCode, GrantReason, OperationType, PermissionInfo, PermissionResult};

use super::workflow::{check_operate_permission, check_view_permission};
use super::{AuthorizedTeams, LookupError, ModuleGrants, StageReader, WorkflowReader, admin_bypass};

/// Why one gate of the stage decision was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenialReason {
    NoWorkflowViewPermission,
    NoStageViewPermission,
    NoWorkflowOperatePermission,
    NoStageOperatePermission,
}

impl DenialReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenialReason::NoWorkflowViewPermission => "NoWorkflowViewPermission",
            DenialReason::NoStageViewPermission => "NoStageViewPermission",
            DenialReason::NoWorkflowOperatePermission => "NoWorkflowOperatePermission",
            DenialReason::NoStageOperatePermission => "NoStageOperatePermission",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageGate {
    Granted(GrantReason),
    Denied(DenialReason),
}

impl StageGate {
    pub fn is_granted(self) -> bool {
        matches!(self, StageGate::Granted(_))
    }
}

/// Both gates of a strict-mode stage check. `operate` is `None` when it was
/// never evaluated: view failed or only view was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDecision {
    pub view: StageGate,
    pub operate: Option<StageGate>,
}

impl StageDecision {
    pub fn can_view(&self) -> bool {
        self.view.is_granted()
    }

    pub fn can_operate(&self) -> bool {
        self.can_view() && self.operate.is_some_and(StageGate::is_granted)
    }
}

// A stage's own operate list is a whitelist in every mode except the
// public "empty means everyone" case.
fn check_stage_operate_permission(stage: &Stage, user_team_ids: &[String]) -> bool {
    tracing::debug!(
        stage_id = stage.id,
        mode = %stage.view_permission_mode,
        operate_teams = stage.operate_teams.as_deref().unwrap_or("NULL"),
        "checking stage operate permission"
    );

    if stage.view_permission_mode == ViewPermissionMode::Public {
        return check_operate_teams_public_mode(stage.operate_teams.as_deref(), user_team_ids);
    }
    check_team_whitelist(stage.operate_teams.as_deref(), user_team_ids)
}

/// Strict mode: a stage can narrow its workflow's grant, never widen it.
pub struct StagePermissionEngine<S: StageReader, W: WorkflowReader> {
    stages: Arc<S>,
    workflows: Arc<W>,
}

impl<S: StageReader, W: WorkflowReader> StagePermissionEngine<S, W> {
    pub fn new(stages: Arc<S>, workflows: Arc<W>) -> Self {
        Self { stages, workflows }
    }

    pub fn evaluate(
        &self,
        stage: &Stage,
        workflow: &Workflow,
        ctx: &UserContext,
        operation: OperationType,
        user_team_ids: &[String],
    ) -> StageDecision {
        let inherits_view = stage.inherits_view();
        let inherits_operate = stage.inherits_operate();
        tracing::debug!(
            stage_id = stage.id,
            workflow_id = workflow.id,
            mode = %stage.view_permission_mode,
            inherits_view,
            inherits_operate,
            user_teams = ?user_team_ids,
            "checking stage permission"
        );

        let view = if !check_view_permission(workflow, ctx, user_team_ids) {
            StageGate::Denied(DenialReason::NoWorkflowViewPermission)
        } else if inherits_view {
            StageGate::Granted(GrantReason::InheritedFromWorkflow)
        } else if check_view_permission(stage, ctx, user_team_ids) {
            StageGate::Granted(GrantReason::WorkflowAndStageViewPermission)
        } else {
            StageGate::Denied(DenialReason::NoStageViewPermission)
        };

        if !view.is_granted() || !operation.requires_operate() {
            tracing::debug!(stage_id = stage.id, ?view, "stage view decided");
            return StageDecision {
                view,
                operate: None,
            };
        }

        let operate = if !check_operate_permission(workflow, user_team_ids) {
            StageGate::Denied(DenialReason::NoWorkflowOperatePermission)
        } else if inherits_operate {
            StageGate::Granted(GrantReason::InheritedFromWorkflow)
        } else if check_stage_operate_permission(stage, user_team_ids) {
            StageGate::Granted(GrantReason::WorkflowAndStageOperatePermission)
        } else {
            StageGate::Denied(DenialReason::NoStageOperatePermission)
        };

        tracing::debug!(stage_id = stage.id, ?view, ?operate, "stage permission decided");
        StageDecision {
            view,
            operate: Some(operate),
        }
    }

    pub fn check_stage_permission(
        &self,
        stage: &Stage,
        workflow: &Workflow,
        ctx: &UserContext,
        operation: OperationType,
        user_team_ids: Option<&[String]>,
    ) -> PermissionResult {
        if let Some(result) = admin_bypass(ctx) {
            return result;
        }

        let resolved;
        let team_ids = match user_team_ids {
            Some(ids) => ids,
            None => {
                resolved = ctx.team_ids();
                &resolved
            }
        };

        let decision = self.evaluate(stage, workflow, ctx, operation, team_ids);
        match (operation, decision.view, decision.operate) {
            (OperationType::View, StageGate::Granted(reason), _) => {
                PermissionResult::view_granted(reason)
            }
            (OperationType::View, StageGate::Denied(_), _) => PermissionResult::denied(
                "User does not have view permission for this stage",
                ErrorCode::ViewPermissionDenied,
            ),
            (_, StageGate::Granted(_), Some(StageGate::Granted(reason))) => {
                PermissionResult::full_access(reason)
            }
            (_, StageGate::Granted(_), _) => PermissionResult::view_only(
                "User has view permission but not operate permission for this stage",
                ErrorCode::OperatePermissionDenied,
            ),
            (_, StageGate::Denied(_), _) => PermissionResult::denied(
                "User does not have permission for this stage",
                ErrorCode::PermissionDenied,
            ),
        }
    }

    /// Separate grant path: membership in the stage's default assignees.
    pub fn check_assigned_user(&self, stage: &Stage, ctx: &UserContext) -> bool {
        if stage
            .default_assignee
            .as_deref()
            .is_none_or(|s| s.trim().is_empty())
        {
            tracing::debug!(stage_id = stage.id, "stage has no default assignee");
            return false;
        }

        let user_id = ctx.user_id.trim();
        if user_id.is_empty() {
            return false;
        }

        let assignees = decode_id_list(stage.default_assignee.as_deref());
        if assignees.iter().any(|a| a == user_id) {
            tracing::info!(user_id, stage_id = stage.id, "user is assigned to stage");
            return true;
        }

        tracing::debug!(
            user_id,
            stage_id = stage.id,
            assignees = assignees.len(),
            "user is not a stage assignee"
        );
        false
    }

    pub fn stage_permission_info(
        &self,
        stage: &Stage,
        workflow: &Workflow,
        ctx: &UserContext,
        grants: ModuleGrants,
        user_team_ids: Option<&[String]>,
    ) -> PermissionInfo {
        if ctx.has_admin_privileges() {
            return PermissionInfo::full_access();
        }
        if !grants.view {
            return PermissionInfo::denied("User does not have module permission to view stages");
        }

        let resolved;
        let team_ids = match user_team_ids {
            Some(ids) => ids,
            None => {
                resolved = ctx.team_ids();
                &resolved
            }
        };

        let operation = if grants.operate {
            OperationType::Operate
        } else {
            OperationType::View
        };
        let decision = self.evaluate(stage, workflow, ctx, operation, team_ids);
        if !decision.can_view() {
            return PermissionInfo::denied("User does not have view permission for this stage");
        }
        PermissionInfo::visible(decision.can_operate())
    }

    pub async fn get_stage_permission_info_for_list(
        &self,
        stage_id: EntityId,
        ctx: &UserContext,
        grants: ModuleGrants,
    ) -> PermissionInfo {
        if ctx.has_admin_privileges() {
            return PermissionInfo::full_access();
        }
        if !grants.view {
            return PermissionInfo::denied("User does not have module permission to view stages");
        }

        let stage = match self.stages.stage(stage_id).await {
            Ok(Some(stage)) => stage,
            Ok(None) => return PermissionInfo::denied(format!("Stage {stage_id} not found")),
            Err(e) => {
                tracing::error!(stage_id, error = %e, "failed to load stage for list");
                return PermissionInfo::denied(format!("Stage {stage_id} could not be loaded"));
            }
        };

        let lookup = self.workflows.workflow(stage.workflow_id).await;
        self.info_with_lookup(&stage, &lookup, ctx, grants, None)
    }

    /// Loads each distinct parent workflow at most once per call.
    pub async fn check_batch_stage_permissions(
        &self,
        stages: &[Stage],
        ctx: &UserContext,
        grants: ModuleGrants,
    ) -> HashMap<EntityId, PermissionInfo> {
        if ctx.has_admin_privileges() {
            return stages
                .iter()
                .map(|s| (s.id, PermissionInfo::full_access()))
                .collect();
        }

        let team_ids = ctx.team_ids();
        let mut workflows: HashMap<EntityId, Result<Option<Workflow>, LookupError>> =
            HashMap::new();
        let mut infos = HashMap::with_capacity(stages.len());

        for stage in stages {
            let lookup = match workflows.entry(stage.workflow_id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    entry.insert(self.workflows.workflow(stage.workflow_id).await)
                }
            };
            let info = self.info_with_lookup(stage, lookup, ctx, grants, Some(&team_ids));
            infos.insert(stage.id, info);
        }

        tracing::debug!(
            stages = stages.len(),
            workflows_loaded = workflows.len(),
            "batch stage permissions computed"
        );
        infos
    }

    fn info_with_lookup(
        &self,
        stage: &Stage,
        lookup: &Result<Option<Workflow>, LookupError>,
        ctx: &UserContext,
        grants: ModuleGrants,
        user_team_ids: Option<&[String]>,
    ) -> PermissionInfo {
        match lookup {
            Ok(Some(workflow)) => {
                self.stage_permission_info(stage, workflow, ctx, grants, user_team_ids)
            }
            Ok(None) => PermissionInfo::denied(format!("Workflow {} not found", stage.workflow_id)),
            Err(e) => {
                tracing::error!(
                    stage_id = stage.id,
                    workflow_id = stage.workflow_id,
                    error = %e,
                    "failed to load parent workflow"
                );
                PermissionInfo::denied(format!(
                    "Workflow {} could not be loaded",
                    stage.workflow_id
                ))
            }
        }
    }

    /// Teams that may view the stage, from its own list or the workflow's
    /// when it inherits.
    pub fn authorized_team_ids(&self, stage: &Stage, workflow: &Workflow) -> AuthorizedTeams {
        if stage.inherits_view() {
            tracing::debug!(stage_id = stage.id, "stage inherits view teams from workflow");
            AuthorizedTeams::from_mode(
                workflow.view_permission_mode,
                workflow.view_teams.as_deref(),
                "Workflow",
            )
        } else {
            AuthorizedTeams::from_mode(
                stage.view_permission_mode,
                stage.view_teams.as_deref(),
                "Stage",
            )
        }
    }

    pub async fn get_authorized_team_ids(&self, stage_id: EntityId) -> AuthorizedTeams {
        let stage = match self.stages.stage(stage_id).await {
            Ok(Some(stage)) => stage,
            Ok(None) => {
                tracing::warn!(stage_id, "stage not found");
                return AuthorizedTeams::error(format!("Stage with ID {stage_id} not found"));
            }
            Err(e) => {
                tracing::error!(stage_id, error = %e, "failed to load stage");
                return AuthorizedTeams::error(format!(
                    "Stage with ID {stage_id} could not be loaded"
                ));
            }
        };

        match self.workflows.workflow(stage.workflow_id).await {
            Ok(Some(workflow)) => self.authorized_team_ids(&stage, &workflow),
            Ok(None) => {
                tracing::warn!(workflow_id = stage.workflow_id, "parent workflow not found");
                AuthorizedTeams::error(format!(
                    "Parent Workflow with ID {} not found",
                    stage.workflow_id
                ))
            }
            Err(e) => {
                tracing::error!(
                    workflow_id = stage.workflow_id,
                    error = %e,
                    "failed to load parent workflow"
                );
                AuthorizedTeams::error(format!(
                    "Parent Workflow with ID {} could not be loaded",
                    stage.workflow_id
                ))
            }
        }
    }
}
