//! Courseware editor service
//!
//! Schema-driven REST editors for course content (announcements,
//! questions, question groups, administrator preferences) with
//! session-based access control and anti-forgery tokens.

pub mod auth;
pub mod config;
pub mod editor;
pub mod editors;
pub mod server;

pub use config::WebConfig;
pub use editor::{EditorHandler, EditorSpec, JsonResponse};
pub use server::WebServer;
