//! Courseware Common Library
//!
//! Shared types, storage, and error handling for the Courseware services.

pub mod db;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use db::{Database, EntityRow};
pub use error::{Error, Result};
pub use types::*;

/// Courseware version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store path
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".courseware")
}

/// Default database path
pub fn default_db_path() -> std::path::PathBuf {
    default_store_path().join("courseware.db")
}

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    default_store_path().join("config.toml")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
