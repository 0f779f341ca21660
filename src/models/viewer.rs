use serde::{Deserialize, Serialize};

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ViewerRole {
    #[default]
    User,
    Admin,
}

/// Who is looking at an order: the owning customer or an administrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: String,
    pub role: ViewerRole,
}

impl Viewer {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: ViewerRole::User,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: ViewerRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ViewerRole::Admin
    }
}

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the caller's role (`user` or `admin`).
pub const USER_ROLE_HEADER: &str = "x-user-role";
