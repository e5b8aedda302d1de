use std::fmt;

use serde::{Deserialize, Serialize};

pub type EntityId = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewPermissionMode {
    #[default]
    Public,
    VisibleToTeams,
    InvisibleToTeams,
    Private,
}

impl fmt::Display for ViewPermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewPermissionMode::Public => "Public",
            ViewPermissionMode::VisibleToTeams => "VisibleToTeams",
            ViewPermissionMode::InvisibleToTeams => "InvisibleToTeams",
            ViewPermissionMode::Private => "Private",
        };
        f.write_str(name)
    }
}

/// Whether a case's permission lists name teams or individual users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionSubjectType {
    #[default]
    Team,
    User,
}

/// Shape shared by every entity the engines evaluate.
///
/// List accessors return the raw stored JSON text; decoding happens in
/// [`crate::primitives`] so malformed values degrade instead of failing.
pub trait PermissionSubject {
    fn id(&self) -> EntityId;
    fn view_mode(&self) -> ViewPermissionMode;
    fn view_teams(&self) -> Option<&str>;
    fn operate_teams(&self) -> Option<&str>;
    fn create_user_id(&self) -> Option<i64>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workflow {
    pub id: EntityId,
    pub name: String,
    pub view_permission_mode: ViewPermissionMode,
    pub view_teams: Option<String>,
    pub operate_teams: Option<String>,
    pub create_user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage {
    pub id: EntityId,
    pub workflow_id: EntityId,
    pub name: String,
    pub view_permission_mode: ViewPermissionMode,
    pub view_teams: Option<String>,
    pub operate_teams: Option<String>,
    pub default_assignee: Option<String>,
    pub create_user_id: Option<i64>,
}

impl Stage {
    pub fn inherits_view(&self) -> bool {
        is_blank(self.view_teams.as_deref())
    }

    pub fn inherits_operate(&self) -> bool {
        is_blank(self.operate_teams.as_deref())
    }
}

/// An onboarding instance of a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Case {
    pub id: EntityId,
    pub workflow_id: EntityId,
    pub view_permission_mode: ViewPermissionMode,
    pub view_permission_subject_type: PermissionSubjectType,
    pub operate_permission_subject_type: PermissionSubjectType,
    pub view_teams: Option<String>,
    pub view_users: Option<String>,
    pub operate_teams: Option<String>,
    pub operate_users: Option<String>,
    pub ownership: Option<i64>,
    pub create_user_id: Option<i64>,
}

impl PermissionSubject for Workflow {
    fn id(&self) -> EntityId {
        self.id
    }

    fn view_mode(&self) -> ViewPermissionMode {
        self.view_permission_mode
    }

    fn view_teams(&self) -> Option<&str> {
        self.view_teams.as_deref()
    }

    fn operate_teams(&self) -> Option<&str> {
        self.operate_teams.as_deref()
    }

    fn create_user_id(&self) -> Option<i64> {
        self.create_user_id
    }
}

impl PermissionSubject for Stage {
    fn id(&self) -> EntityId {
        self.id
    }

    fn view_mode(&self) -> ViewPermissionMode {
        self.view_permission_mode
    }

    fn view_teams(&self) -> Option<&str> {
        self.view_teams.as_deref()
    }

    fn operate_teams(&self) -> Option<&str> {
        self.operate_teams.as_deref()
    }

    fn create_user_id(&self) -> Option<i64> {
        self.create_user_id
    }
}

impl PermissionSubject for Case {
    fn id(&self) -> EntityId {
        self.id
    }

    fn view_mode(&self) -> ViewPermissionMode {
        self.view_permission_mode
    }

    fn view_teams(&self) -> Option<&str> {
        self.view_teams.as_deref()
    }

    fn operate_teams(&self) -> Option<&str> {
        self.operate_teams.as_deref()
    }

    fn create_user_id(&self) -> Option<i64> {
        self.create_user_id
    }
}

pub(crate) fn is_blank(raw: Option<&str>) -> bool {
    raw.is_none_or(|s| s.trim().is_empty())
}
