//! Account and authentication payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json::{field, opt_string};
use crate::message::Author;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    /// Accept a value as a user only if it has string `id`, `username` and `email`
    pub fn from_value(raw: &Value) -> Option<Self> {
        Some(Self {
            id: raw.get("id")?.as_str()?.to_string(),
            username: raw.get("username")?.as_str()?.to_string(),
            email: raw.get("email")?.as_str()?.to_string(),
            avatar: opt_string(raw, "avatar"),
        })
    }

    /// The user as a message author, for avatar and label helpers
    pub fn as_author(&self) -> Author {
        Author { id: self.id.clone(), username: self.username.clone(), avatar: self.avatar.clone() }
    }
}

/// A successful login or registration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AuthResponse {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Some endpoints return only the token and user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// The server wants the user to approve this IP address by email before logging in
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IpAuthorizationRequired {
    pub ticket: String,
    pub email: String,
    #[serde(default)]
    pub resend_available_in: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoginOutcome {
    Authenticated(AuthResponse),
    IpAuthorizationRequired(IpAuthorizationRequired),
}

impl LoginOutcome {
    pub(crate) fn from_value(raw: &Value) -> Option<Self> {
        if raw.get("ip_authorization_required").and_then(Value::as_bool) == Some(true) {
            return Some(LoginOutcome::IpAuthorizationRequired(IpAuthorizationRequired {
                ticket: opt_string(raw, "ticket")?,
                email: opt_string(raw, "email").unwrap_or_default(),
                resend_available_in: field(raw, "resend_available_in")
                    .and_then(Value::as_u64)
                    .unwrap_or_default(),
            }));
        }
        auth_response_from_value(raw).map(LoginOutcome::Authenticated)
    }
}

pub(crate) fn auth_response_from_value(raw: &Value) -> Option<AuthResponse> {
    Some(AuthResponse {
        token: opt_string(raw, "token")?,
        user_id: opt_string(raw, "user_id"),
        user: raw.get("user").and_then(User::from_value),
    })
}

/// One poll of a pending IP authorization
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct IpAuthorizationPoll {
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// A signed-in session: the bearer token and, once known, the profile
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Session {
    /// The name own messages are matched against
    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }
}
