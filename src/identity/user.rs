//! `/api/user` response shape.

use serde::{Deserialize, Serialize};

use crate::identity::resolver::{Identity, IdentityError};

/// Who the caller is, or why that could not be determined.
///
/// `connected == false` never carries identity fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub connected: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_initial: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UserInfo {
    pub fn connected(identity: Identity) -> Self {
        let login_name = non_empty(identity.login_name);
        let display_name = non_empty(identity.display_name);
        let first_initial = first_initial(display_name.as_deref(), login_name.as_deref());
        Self {
            connected: true,
            login_name,
            display_name,
            first_initial,
            error: None,
        }
    }

    pub fn disconnected(error: &IdentityError) -> Self {
        Self {
            connected: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

impl From<Result<Identity, IdentityError>> for UserInfo {
    fn from(result: Result<Identity, IdentityError>) -> Self {
        match result {
            Ok(identity) => UserInfo::connected(identity),
            Err(e) => UserInfo::disconnected(&e),
        }
    }
}

/// First character of the display name, else of the login name.
pub fn first_initial(display_name: Option<&str>, login_name: Option<&str>) -> Option<String> {
    display_name
        .and_then(|s| s.chars().next())
        .or_else(|| login_name.and_then(|s| s.chars().next()))
        .map(String::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
