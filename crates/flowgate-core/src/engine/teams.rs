use serde::Serialize;

use crate::entity::ViewPermissionMode;
use crate::primitives::decode_id_list;

/// Teams allowed to see an entity, used to filter team trees for display.
///
/// Team ids are kept in first-seen spelling and compared
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthorizedTeams {
    pub is_public_access: bool,
    pub is_blacklist_mode: bool,
    team_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AuthorizedTeams {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub(crate) fn from_mode(
        mode: ViewPermissionMode,
        view_teams: Option<&str>,
        entity: &str,
    ) -> Self {
        let mut result = Self::default();

        match mode {
            ViewPermissionMode::Public => {
                let teams = decode_id_list(view_teams);
                if teams.is_empty() {
                    result.is_public_access = true;
                    tracing::debug!(
                        entity,
                        "public with no team restriction, all teams authorized"
                    );
                } else {
                    result.extend(teams);
                    tracing::debug!(entity, teams = ?result.team_ids, "public with team whitelist");
                }
            }
            ViewPermissionMode::VisibleToTeams => {
                result.extend(decode_id_list(view_teams));
                tracing::debug!(entity, teams = ?result.team_ids, "team whitelist");
            }
            ViewPermissionMode::InvisibleToTeams => {
                result.is_blacklist_mode = true;
                result.extend(decode_id_list(view_teams));
                tracing::debug!(entity, teams = ?result.team_ids, "team blacklist");
            }
            ViewPermissionMode::Private => {
                tracing::debug!(entity, "private, no teams authorized");
            }
        }

        result
    }

    fn extend(&mut self, teams: Vec<String>) {
        for team in teams {
            if !self.contains(&team) {
                self.team_ids.push(team);
            }
        }
    }

    pub fn team_ids(&self) -> &[String] {
        &self.team_ids
    }

    pub fn contains(&self, team_id: &str) -> bool {
        self.team_ids.iter().any(|t| t.eq_ignore_ascii_case(team_id))
    }

    /// Whether a team passes the filter, interpreting the list per mode.
    pub fn allows(&self, team_id: &str) -> bool {
        if self.has_error() {
            return false;
        }
        if self.is_public_access {
            return true;
        }
        self.contains(team_id) != self.is_blacklist_mode
    }

    pub fn has_error(&self) -> bool {
        self.error_message.as_deref().is_some_and(|m| !m.is_empty())
    }
}
