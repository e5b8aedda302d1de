//! Pure building blocks shared by the workflow, stage and case engines.
//!
//! Team-id resolution, admin and owner tests live on
//! [`UserContext`](crate::context::UserContext).

mod decode;
mod lists;

pub use decode::decode_id_list;
pub use lists::{
    check_operate_teams_public_mode, check_operate_users_public_mode, check_team_blacklist,
    check_team_whitelist, check_user_blacklist, check_user_whitelist,
};
