//! Anti-forgery tokens for mutating editor requests.
//!
//! A token is an HS256 JWT naming the caller and the action it was issued
//! for. Validation fails closed: a token that is missing, malformed, expired,
//! or minted for another caller or action is rejected.

use super::types::Caller;
use courseware_common::{Database, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Key under which a generated signing secret is persisted.
const SECRET_KV_KEY: &str = "xsrf_secret";

/// Default token lifetime (one day).
pub const DEFAULT_MAX_AGE_SECS: i64 = 60 * 60 * 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XsrfClaims {
    /// Caller id the token was minted for
    pub sub: String,
    /// Action name, e.g. `announcement-edit`
    pub act: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and checks anti-forgery tokens.
#[derive(Clone)]
pub struct XsrfTokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    max_age_secs: i64,
}

impl std::fmt::Debug for XsrfTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XsrfTokenManager")
            .field("max_age_secs", &self.max_age_secs)
            .finish_non_exhaustive()
    }
}

impl XsrfTokenManager {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            max_age_secs: DEFAULT_MAX_AGE_SECS,
        }
    }

    pub fn with_max_age(mut self, max_age_secs: i64) -> Self {
        self.max_age_secs = max_age_secs;
        self
    }

    /// Use the configured secret, or the one persisted in `db`, generating
    /// and storing a fresh one on first start.
    pub fn from_store(configured: Option<&str>, db: &Database) -> Result<Self> {
        if let Some(secret) = configured.filter(|s| !s.is_empty()) {
            return Ok(Self::new(secret.as_bytes()));
        }

        let secret = match db.kv_get(SECRET_KV_KEY)? {
            Some(secret) => secret,
            None => {
                let secret = hex::encode(rand::random::<[u8; 32]>());
                db.kv_set(SECRET_KV_KEY, &secret)?;
                info!("Generated new XSRF signing secret");
                secret
            }
        };
        Ok(Self::new(secret.as_bytes()))
    }

    /// Mint a token for `caller` scoped to `action`.
    pub fn create_token(
        &self,
        caller: &Caller,
        action: &str,
    ) -> std::result::Result<String, jsonwebtoken::errors::Error> {
        self.create_token_at(caller, action, chrono::Utc::now().timestamp())
    }

    fn create_token_at(
        &self,
        caller: &Caller,
        action: &str,
        issued_at: i64,
    ) -> std::result::Result<String, jsonwebtoken::errors::Error> {
        let claims = XsrfClaims {
            sub: caller.id().to_string(),
            act: action.to_string(),
            iat: issued_at,
            exp: issued_at + self.max_age_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Whether `token` was minted by us, is unexpired, and matches both the
    /// caller and the action.
    pub fn is_valid(&self, caller: &Caller, action: &str, token: Option<&str>) -> bool {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return false;
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        match decode::<XsrfClaims>(token, &self.decoding, &validation) {
            Ok(data) => data.claims.act == action && data.claims.sub == caller.id(),
            Err(e) => {
                debug!("Rejected XSRF token for {}: {}", action, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::Identity;

    fn caller(id: &str) -> Caller {
        Caller::authenticated(Identity {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            roles: vec![],
            created_at: 0,
            last_login_at: None,
        })
    }

    #[test]
    fn test_token_binds_caller_and_action() {
        let manager = XsrfTokenManager::new(b"secret");
        let alice = caller("alice");
        let token = manager.create_token(&alice, "announcement-edit").unwrap();

        assert!(manager.is_valid(&alice, "announcement-edit", Some(&token)));
        assert!(!manager.is_valid(&alice, "mc-question-edit", Some(&token)));
        assert!(!manager.is_valid(&caller("bob"), "announcement-edit", Some(&token)));
        assert!(!manager.is_valid(&alice, "announcement-edit", None));
        assert!(!manager.is_valid(&alice, "announcement-edit", Some("")));
        assert!(!manager.is_valid(&alice, "announcement-edit", Some("garbage")));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let alice = caller("alice");
        let token = XsrfTokenManager::new(b"one")
            .create_token(&alice, "edit")
            .unwrap();
        assert!(!XsrfTokenManager::new(b"two").is_valid(&alice, "edit", Some(&token)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = XsrfTokenManager::new(b"secret").with_max_age(60);
        let alice = caller("alice");
        let stale = chrono::Utc::now().timestamp() - 3600;
        let token = manager.create_token_at(&alice, "edit", stale).unwrap();
        assert!(!manager.is_valid(&alice, "edit", Some(&token)));
    }

    #[test]
    fn test_secret_is_persisted() {
        let db = Database::open_memory().unwrap();
        let alice = caller("alice");
        let token = XsrfTokenManager::from_store(None, &db)
            .unwrap()
            .create_token(&alice, "edit")
            .unwrap();

        // A second manager over the same store accepts the token
        let again = XsrfTokenManager::from_store(None, &db).unwrap();
        assert!(again.is_valid(&alice, "edit", Some(&token)));
    }
}
