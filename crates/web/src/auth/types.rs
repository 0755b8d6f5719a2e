//! Core types for the authentication system.

use serde::{Deserialize, Serialize};

/// Unique identifier for an authenticated identity
pub type IdentityId = String;

/// Session token
pub type SessionToken = String;

/// Caller id used for anti-forgery tokens when nobody is signed in.
pub const ANONYMOUS_CALLER: &str = "anonymous";

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    pub roles: Vec<String>,
    pub created_at: i64,
    pub last_login_at: Option<i64>,
}

/// Session data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub identity_id: IdentityId,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Whoever issued the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub identity: Option<Identity>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self { identity: None }
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// Stable id that anti-forgery tokens are bound to.
    pub fn id(&self) -> &str {
        self.identity
            .as_ref()
            .map(|i| i.id.as_str())
            .unwrap_or(ANONYMOUS_CALLER)
    }

    pub fn roles(&self) -> &[String] {
        self.identity
            .as_ref()
            .map(|i| i.roles.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// Development login request
#[derive(Debug, Clone, Deserialize)]
pub struct DevLoginRequest {
    pub email: String,
    #[serde(default)]
    pub admin: bool,
}

/// Login response carrying the new session
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: SessionToken,
    pub expires_at: i64,
    pub identity: Identity,
}
