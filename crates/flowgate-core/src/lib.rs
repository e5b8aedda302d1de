pub mod context;
pub mod engine;
pub mod entity;
pub mod primitives;
pub mod result;

pub use context::{DEFAULT_TEAM, DEFAULT_TENANT, TeamNode, UserContext};
pub use entity::{
    Case, EntityId, PermissionSubject, PermissionSubjectType, Stage, ViewPermissionMode, Workflow,
};
pub use result::{
    ErrorCode, GrantReason, OperationType, PermissionInfo, PermissionResult, UnsupportedOperation,
};
pub use engine::{
    AuthorizedTeams, CaseReader, CasePermissionEngine, LookupError, ModuleGrants, StageReader,
    StagePermissionEngine, WorkflowPermissionEngine, WorkflowReader, admin_bypass,
};
