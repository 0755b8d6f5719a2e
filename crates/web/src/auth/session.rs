//! Identities and sessions persisted in the shared SQLite database.
//!
//! Session tokens are handed to the client once and stored only as a
//! SHA-256 digest.

use super::types::{Caller, Identity, LoginResponse};
use axum::http::{header, HeaderMap};
use courseware_common::{Database, Result};
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "session";

const DEFAULT_SESSION_TTL_SECS: i64 = 60 * 60 * 12; // 12h

fn now_epoch_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Session store wrapper
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
    ttl_secs: i64,
}

impl SessionStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }

    pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn init_schema(&self) -> Result<()> {
        let conn = self.db.connection();
        let conn = conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS auth_identities (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                roles TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                last_login_at INTEGER
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_auth_identities_email ON auth_identities(email);

            CREATE TABLE IF NOT EXISTS auth_sessions (
                token_hash TEXT PRIMARY KEY,
                identity_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                last_seen_at INTEGER NOT NULL,
                FOREIGN KEY(identity_id) REFERENCES auth_identities(id)
            );
            CREATE INDEX IF NOT EXISTS idx_auth_sessions_identity ON auth_sessions(identity_id);
            CREATE INDEX IF NOT EXISTS idx_auth_sessions_expires ON auth_sessions(expires_at);
            "#,
        )?;
        Ok(())
    }

    // ========================================================================
    // Identities
    // ========================================================================

    /// Create the identity for `email`, or replace its roles if it exists.
    pub fn upsert_identity(&self, email: &str, roles: &[String]) -> Result<Identity> {
        let email = normalize_email(email);
        let roles_joined = roles.join(",");
        let now = now_epoch_secs();

        let conn = self.db.connection();
        let conn = conn.lock();

        let existing: Option<(String, i64)> = conn
            .query_row(
                "SELECT id, created_at FROM auth_identities WHERE email = ?1",
                params![email],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let (id, created_at) = match existing {
            Some((id, created_at)) => {
                conn.execute(
                    "UPDATE auth_identities SET roles = ?1 WHERE id = ?2",
                    params![roles_joined, id],
                )?;
                (id, created_at)
            }
            None => {
                let id = Uuid::new_v4().to_string();
                conn.execute(
                    "INSERT INTO auth_identities (id, email, roles, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![id, email, roles_joined, now],
                )?;
                info!("Created identity {} for {}", id, email);
                (id, now)
            }
        };

        Ok(Identity {
            id,
            email,
            roles: roles.to_vec(),
            created_at,
            last_login_at: None,
        })
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Start a session for an identity. Returns the raw token once.
    pub fn create_session(&self, identity: &Identity) -> Result<LoginResponse> {
        let token = hex::encode(rand::random::<[u8; 32]>());
        let now = now_epoch_secs();
        let expires_at = now + self.ttl_secs;

        let conn = self.db.connection();
        let conn = conn.lock();
        conn.execute(
            "INSERT INTO auth_sessions (token_hash, identity_id, created_at, expires_at, last_seen_at) VALUES (?1, ?2, ?3, ?4, ?3)",
            params![hash_token(&token), identity.id, now, expires_at],
        )?;
        conn.execute(
            "UPDATE auth_identities SET last_login_at = ?1 WHERE id = ?2",
            params![now, identity.id],
        )?;

        debug!("Started session for {}", identity.email);
        let mut identity = identity.clone();
        identity.last_login_at = Some(now);
        Ok(LoginResponse {
            token,
            expires_at,
            identity,
        })
    }

    /// Look up the identity behind a session token. Expired sessions are
    /// removed and resolve to `None`.
    pub fn resolve(&self, token: &str) -> Result<Option<Identity>> {
        let token_hash = hash_token(token);
        let now = now_epoch_secs();

        let conn = self.db.connection();
        let conn = conn.lock();
        let row: Option<(i64, String, String, String, i64, Option<i64>)> = conn
            .query_row(
                "SELECT s.expires_at, i.id, i.email, i.roles, i.created_at, i.last_login_at \
                 FROM auth_sessions s JOIN auth_identities i ON i.id = s.identity_id \
                 WHERE s.token_hash = ?1",
                params![token_hash],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?)),
            )
            .optional()?;

        let Some((expires_at, id, email, roles, created_at, last_login_at)) = row else {
            return Ok(None);
        };

        if expires_at <= now {
            conn.execute(
                "DELETE FROM auth_sessions WHERE token_hash = ?1",
                params![token_hash],
            )?;
            return Ok(None);
        }

        conn.execute(
            "UPDATE auth_sessions SET last_seen_at = ?1 WHERE token_hash = ?2",
            params![now, token_hash],
        )?;

        Ok(Some(Identity {
            id,
            email,
            roles: roles
                .split(',')
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect(),
            created_at,
            last_login_at,
        }))
    }

    /// End a session.
    pub fn revoke(&self, token: &str) -> Result<bool> {
        let conn = self.db.connection();
        let conn = conn.lock();
        let rows = conn.execute(
            "DELETE FROM auth_sessions WHERE token_hash = ?1",
            params![hash_token(token)],
        )?;
        Ok(rows > 0)
    }

    /// Resolve the caller from `Authorization: Bearer` or the session cookie.
    ///
    /// Anything that does not name a live session is the anonymous caller.
    pub fn caller_from_headers(&self, headers: &HeaderMap) -> Caller {
        let Some(token) = token_from_headers(headers) else {
            return Caller::anonymous();
        };
        match self.resolve(&token) {
            Ok(Some(identity)) => Caller::authenticated(identity),
            Ok(None) => Caller::anonymous(),
            Err(e) => {
                warn!("Session lookup failed: {}", e);
                Caller::anonymous()
            }
        }
    }
}

/// The session token a request presents, if any.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|t| !t.is_empty())
}
