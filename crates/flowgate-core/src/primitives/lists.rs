use crate::entity::is_blank;

use super::decode::decode_id_list;

fn any_member(list: &[String], user_team_ids: &[String]) -> bool {
    user_team_ids.iter().any(|team| list.contains(team))
}

/// Empty or absent whitelist denies.
pub fn check_team_whitelist(teams: Option<&str>, user_team_ids: &[String]) -> bool {
    if is_blank(teams) {
        return false;
    }
    any_member(&decode_id_list(teams), user_team_ids)
}

/// Empty or absent blacklist allows.
pub fn check_team_blacklist(teams: Option<&str>, user_team_ids: &[String]) -> bool {
    if is_blank(teams) {
        return true;
    }
    !any_member(&decode_id_list(teams), user_team_ids)
}

pub fn check_user_whitelist(users: Option<&str>, user_id: &str) -> bool {
    if is_blank(users) {
        return false;
    }
    decode_id_list(users).iter().any(|u| u == user_id)
}

pub fn check_user_blacklist(users: Option<&str>, user_id: &str) -> bool {
    if is_blank(users) {
        return true;
    }
    !decode_id_list(users).iter().any(|u| u == user_id)
}

/// Public mode operate rule: no list means everyone may operate, otherwise
/// the list is a whitelist.
pub fn check_operate_teams_public_mode(teams: Option<&str>, user_team_ids: &[String]) -> bool {
    let operate_teams = decode_id_list(teams);
    if operate_teams.is_empty() {
        tracing::debug!("public mode without operate teams, operate granted to all");
        return true;
    }

    let allowed = any_member(&operate_teams, user_team_ids);
    tracing::debug!(teams = ?operate_teams, allowed, "public mode operate teams whitelist");
    allowed
}

pub fn check_operate_users_public_mode(users: Option<&str>, user_id: &str) -> bool {
    let operate_users = decode_id_list(users);
    if operate_users.is_empty() {
        tracing::debug!("public mode without operate users, operate granted to all");
        return true;
    }

    let allowed = operate_users.iter().any(|u| u == user_id);
    tracing::debug!(users = ?operate_users, allowed, "public mode operate users whitelist");
    allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teams(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn whitelist_grants_on_any_overlap() {
        assert!(check_team_whitelist(Some(r#"["A","B"]"#), &teams(&["B"])));
        assert!(check_team_whitelist(Some(r#"["A","B"]"#), &teams(&["C", "A"])));
    }

    #[test]
    fn whitelist_denies_without_overlap() {
        assert!(!check_team_whitelist(Some(r#"["A","B"]"#), &teams(&["C"])));
    }

    #[test]
    fn whitelist_denies_when_empty_or_absent() {
        assert!(!check_team_whitelist(None, &teams(&["A"])));
        assert!(!check_team_whitelist(Some(""), &teams(&["A"])));
        assert!(!check_team_whitelist(Some("[]"), &teams(&["A"])));
    }

    #[test]
    fn whitelist_fails_closed_on_malformed_json() {
        assert!(!check_team_whitelist(Some("[A, B"), &teams(&["A"])));
    }

    #[test]
    fn whitelist_other_sentinel_only_matches_when_listed() {
        assert!(!check_team_whitelist(Some(r#"["A"]"#), &teams(&["Other"])));
        assert!(check_team_whitelist(Some(r#"["Other"]"#), &teams(&["Other"])));
    }

    #[test]
    fn blacklist_denies_members() {
        assert!(!check_team_blacklist(Some(r#"["A"]"#), &teams(&["A"])));
        assert!(check_team_blacklist(Some(r#"["A"]"#), &teams(&["C"])));
    }

    #[test]
    fn blacklist_allows_when_empty_or_absent() {
        assert!(check_team_blacklist(None, &teams(&["A"])));
        assert!(check_team_blacklist(Some("  "), &teams(&["A"])));
        assert!(check_team_blacklist(Some("[]"), &teams(&["A"])));
    }

    #[test]
    fn blacklist_fails_open_on_malformed_json() {
        assert!(check_team_blacklist(Some("garbage"), &teams(&["A"])));
    }

    #[test]
    fn user_whitelist_and_blacklist() {
        let users = Some(r#"["1","2"]"#);
        assert!(check_user_whitelist(users, "2"));
        assert!(!check_user_whitelist(users, "3"));
        assert!(!check_user_whitelist(None, "2"));

        assert!(!check_user_blacklist(users, "2"));
        assert!(check_user_blacklist(users, "3"));
        assert!(check_user_blacklist(None, "2"));
    }

    #[test]
    fn public_mode_operate_without_list_grants_everyone() {
        assert!(check_operate_teams_public_mode(None, &teams(&["Other"])));
        assert!(check_operate_teams_public_mode(Some("[]"), &teams(&["X"])));
        assert!(check_operate_users_public_mode(None, "99"));
        assert!(check_operate_users_public_mode(Some("[]"), "99"));
    }

    #[test]
    fn public_mode_operate_with_list_is_whitelist() {
        assert!(check_operate_teams_public_mode(Some(r#"["A"]"#), &teams(&["A"])));
        assert!(!check_operate_teams_public_mode(Some(r#"["A"]"#), &teams(&["B"])));
        assert!(check_operate_users_public_mode(Some(r#"["7"]"#), "7"));
        assert!(!check_operate_users_public_mode(Some(r#"["7"]"#), "8"));
    }

    #[test]
    fn double_encoded_lists_are_honoured() {
        let raw = Some(r#""[\"A\"]""#);
        assert!(check_team_whitelist(raw, &teams(&["A"])));
        assert!(!check_team_blacklist(raw, &teams(&["A"])));
    }

    #[test]
    fn numeric_team_lists_match_team_ids() {
        assert!(check_team_whitelist(Some("[101, 102]"), &teams(&["102"])));
        assert!(!check_team_blacklist(Some("[101]"), &teams(&["101"])));
        assert!(check_team_blacklist(Some("[101]"), &teams(&["103"])));
        assert!(check_user_whitelist(Some("[42]"), "42"));
    }
}
