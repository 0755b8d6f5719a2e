//! Authentication and authorization for the editor service.
//!
//! - `rbac`: role/permission policy and the course-admin capability check
//! - `session`: identities and bearer/cookie sessions stored in SQLite
//! - `xsrf`: signed anti-forgery tokens bound to a caller and an action

pub mod rbac;
pub mod session;
pub mod types;
pub mod xsrf;

pub use rbac::{AccessOracle, Policy, PolicyEngine, Role, COURSE_ADMIN, COURSE_READ};
pub use session::{SessionStore, SESSION_COOKIE};
pub use types::*;
pub use xsrf::{XsrfClaims, XsrfTokenManager};
