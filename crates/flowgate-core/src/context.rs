use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Team assigned to users that belong to no team at all.
pub const DEFAULT_TEAM: &str = "Other";

pub const DEFAULT_TENANT: &str = "DEFAULT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamNode {
    pub id: String,
    #[serde(default)]
    pub children: Vec<TeamNode>,
}

impl TeamNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(id: impl Into<String>, children: Vec<TeamNode>) -> Self {
        Self {
            id: id.into(),
            children,
        }
    }

    fn collect_ids(&self, seen: &mut HashSet<String>, out: &mut Vec<String>) {
        if seen.insert(self.id.clone()) {
            out.push(self.id.clone());
        }
        for child in &self.children {
            child.collect_ids(seen, out);
        }
    }
}

/// The acting user for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserContext {
    pub user_id: String,
    pub tenant_id: Option<String>,
    pub user_teams: Option<Vec<TeamNode>>,
    pub system_admin: bool,
    pub admin_tenants: Vec<String>,
    pub portal_access: bool,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_teams(mut self, teams: Vec<TeamNode>) -> Self {
        self.user_teams = Some(teams);
        self
    }

    /// Shorthand for a flat team list without sub-teams.
    pub fn in_teams<I, S>(self, team_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_teams(team_ids.into_iter().map(TeamNode::new).collect())
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn as_system_admin(mut self) -> Self {
        self.system_admin = true;
        self
    }

    pub fn as_tenant_admin_of(mut self, tenant_id: impl Into<String>) -> Self {
        self.admin_tenants.push(tenant_id.into());
        self
    }

    pub fn with_portal_access(mut self) -> Self {
        self.portal_access = true;
        self
    }

    pub fn numeric_user_id(&self) -> Option<i64> {
        self.user_id.trim().parse().ok()
    }

    pub fn tenant_id(&self) -> &str {
        match self.tenant_id.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => DEFAULT_TENANT,
        }
    }

    /// Flattens the team tree (sub-teams included) into distinct ids,
    /// falling back to [`DEFAULT_TEAM`] when the user has no team.
    pub fn team_ids(&self) -> Vec<String> {
        let Some(teams) = &self.user_teams else {
            tracing::warn!(
                user_id = %self.user_id,
                "user has no team tree, treating as member of '{DEFAULT_TEAM}'"
            );
            return vec![DEFAULT_TEAM.to_string()];
        };

        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for team in teams {
            team.collect_ids(&mut seen, &mut ids);
        }

        if ids.is_empty() {
            tracing::debug!(
                user_id = %self.user_id,
                "user has no team assignments, treating as member of '{DEFAULT_TEAM}'"
            );
            return vec![DEFAULT_TEAM.to_string()];
        }

        tracing::debug!(user_id = %self.user_id, teams = ?ids, "resolved user teams");
        ids
    }

    pub fn is_system_admin(&self) -> bool {
        self.system_admin
    }

    pub fn is_tenant_admin(&self) -> bool {
        let tenant = self.tenant_id();
        self.admin_tenants.iter().any(|t| t == tenant)
    }

    pub fn has_admin_privileges(&self) -> bool {
        self.is_system_admin() || self.is_tenant_admin()
    }

    pub fn is_owner(&self, create_user_id: Option<i64>) -> bool {
        match (create_user_id, self.numeric_user_id()) {
            (Some(owner), Some(current)) => owner == current,
            _ => false,
        }
    }

    pub fn is_portal_token_with_portal_access(&self) -> bool {
        self.portal_access
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_ids_without_tree_is_other() {
        let ctx = UserContext::new("42");
        assert_eq!(ctx.team_ids(), vec!["Other".to_string()]);
    }

    #[test]
    fn team_ids_with_empty_tree_is_other() {
        let ctx = UserContext::new("42").with_teams(vec![]);
        assert_eq!(ctx.team_ids(), vec!["Other".to_string()]);
    }

    #[test]
    fn team_ids_flatten_sub_teams_in_order() {
        let ctx = UserContext::new("42").with_teams(vec![
            TeamNode::with_children(
                "sales",
                vec![TeamNode::new("sales-east"), TeamNode::new("sales-west")],
            ),
            TeamNode::new("ops"),
        ]);

        assert_eq!(ctx.team_ids(), vec!["sales", "sales-east", "sales-west", "ops"]);
    }

    #[test]
    fn team_ids_are_distinct() {
        let ctx = UserContext::new("42").with_teams(vec![
            TeamNode::with_children("a", vec![TeamNode::new("b")]),
            TeamNode::new("b"),
        ]);

        assert_eq!(ctx.team_ids(), vec!["a", "b"]);
    }

    #[test]
    fn owner_matches_numeric_user_id() {
        let ctx = UserContext::new("42");
        assert!(ctx.is_owner(Some(42)));
        assert!(!ctx.is_owner(Some(7)));
        assert!(!ctx.is_owner(None));
    }

    #[test]
    fn owner_never_matches_non_numeric_user_id() {
        let ctx = UserContext::new("alice");
        assert!(!ctx.is_owner(Some(42)));
    }

    #[test]
    fn tenant_defaults_when_absent_or_blank() {
        assert_eq!(UserContext::new("1").tenant_id(), DEFAULT_TENANT);
        assert_eq!(UserContext::new("1").with_tenant(" ").tenant_id(), DEFAULT_TENANT);
        assert_eq!(UserContext::new("1").with_tenant("acme").tenant_id(), "acme");
    }

    #[test]
    fn tenant_admin_only_for_current_tenant() {
        let ctx = UserContext::new("1")
            .with_tenant("acme")
            .as_tenant_admin_of("globex");
        assert!(!ctx.is_tenant_admin());
        assert!(!ctx.has_admin_privileges());

        let ctx = ctx.as_tenant_admin_of("acme");
        assert!(ctx.is_tenant_admin());
        assert!(ctx.has_admin_privileges());
    }

    #[test]
    fn system_admin_has_admin_privileges() {
        let ctx = UserContext::new("1").as_system_admin();
        assert!(ctx.is_system_admin());
        assert!(!ctx.is_tenant_admin());
        assert!(ctx.has_admin_privileges());
    }

    #[test]
    fn regular_user_has_no_admin_privileges() {
        let ctx = UserContext::new("1").in_teams(["a"]);
        assert!(!ctx.has_admin_privileges());
        assert!(!ctx.is_portal_token_with_portal_access());
    }
}
