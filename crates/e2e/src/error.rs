//! Error types for browser tests

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("Script failed: {0}")]
    Script(String),

    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("No such frame: {0}")]
    NoSuchFrame(String),

    #[error("No option {option:?} in {select}")]
    NoSuchOption { select: String, option: String },

    #[error("No alert is open")]
    NoSuchAlert,

    /// An expectation about the rendered page did not hold. The message
    /// carries what was observed.
    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

/// Fail with `AssertionFailed` unless `actual == expected`.
pub fn expect_equal<T>(what: &str, expected: T, actual: T) -> E2eResult<()>
where
    T: PartialEq + std::fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!(
            "{}: expected {:?}, found {:?}",
            what, expected, actual
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_equal_reports_observed_value() {
        assert!(expect_equal("title", "a", "a").is_ok());

        let err = expect_equal("title", "Welcome", "Error").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Assertion failed: title: expected \"Welcome\", found \"Error\""
        );
    }
}
