mod case;
mod stage;
mod teams;
mod workflow;

pub use case::CasePermissionEngine;
pub use stage::{DenialReason, StageDecision, StageGate, StagePermissionEngine};
pub use teams::AuthorizedTeams;
pub use workflow::{WorkflowPermissionEngine, check_operate_permission, check_view_permission};

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::context::UserContext;
use crate::entity::{Case, EntityId, Stage, Workflow};
use crate::result::{GrantReason, PermissionResult};

pub const WORKFLOW_READ: &str = "WORKFLOW:READ";
pub const CASE_READ: &str = "CASE:READ";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("storage error: {0}")]
    Storage(String),
}

/// Module-level grants computed once by the caller for a whole list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleGrants {
    pub view: bool,
    pub operate: bool,
}

impl ModuleGrants {
    pub const ALL: ModuleGrants = ModuleGrants {
        view: true,
        operate: true,
    };
}

/// System admins win over tenant admins; both get full access.
pub fn admin_bypass(ctx: &UserContext) -> Option<PermissionResult> {
    if ctx.is_system_admin() {
        tracing::debug!(user_id = %ctx.user_id, "system admin, bypassing entity checks");
        return Some(PermissionResult::full_access(GrantReason::SystemAdmin));
    }
    if ctx.is_tenant_admin() {
        tracing::debug!(
            user_id = %ctx.user_id,
            tenant_id = ctx.tenant_id(),
            "tenant admin, bypassing entity checks"
        );
        return Some(PermissionResult::full_access(GrantReason::TenantAdmin));
    }
    None
}

pub trait WorkflowReader: Send + Sync {
    fn workflow(
        &self,
        id: EntityId,
    ) -> impl Future<Output = Result<Option<Workflow>, LookupError>> + Send;
}

pub trait StageReader: Send + Sync {
    fn stage(&self, id: EntityId)
    -> impl Future<Output = Result<Option<Stage>, LookupError>> + Send;
}

pub trait CaseReader: Send + Sync {
    fn case(&self, id: EntityId) -> impl Future<Output = Result<Option<Case>, LookupError>> + Send;
}
