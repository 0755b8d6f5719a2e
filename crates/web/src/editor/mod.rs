//! Schema-driven CRUD editors.
//!
//! An editor binds one kind of stored item to a REST endpoint. The
//! behaviour specific to the kind (schema, defaults, validation, deletion
//! rules) comes from an [`EditorSpec`]; storage from a [`Dao`]; the
//! generic request flow lives in [`EditorHandler`].

pub mod dao;
pub mod envelope;
pub mod form;
pub mod handler;
pub mod hooks;
pub mod schema;

pub use dao::{Dao, EntityDao};
pub use envelope::{key_payload, EditorRequest, JsonResponse, XSSI_PREFIX};
pub use form::FormDescriptor;
pub use handler::EditorHandler;
pub use hooks::{EditorHooks, ItemHook, SchemaHook};
pub use schema::{json_to_dict, FieldArray, FieldRegistry, ItemType, Property, SchemaField};

use courseware_common::{Item, JsonMap};
use serde_json::{json, Value};
use thiserror::Error;

/// Result type for editor operations
pub type EditorResult<T> = std::result::Result<T, EditorError>;

/// Outcomes that end an editor request early.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Access denied.")]
    AuthorizationDenied,

    #[error("Bad XSRF token. Please reload the page and try again")]
    CsrfInvalid,

    #[error("Version {0} not supported.")]
    VersionUnsupported(String),

    #[error("{}", .0.join("\n"))]
    ValidationFailed(Vec<String>),

    #[error("Not found.")]
    NotFound,

    #[error("{message}")]
    DeletionForbidden { status: u16, message: String },

    #[error("{0}")]
    Malformed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] courseware_common::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl EditorError {
    /// Envelope status for this outcome.
    pub fn status(&self) -> u16 {
        match self {
            EditorError::AuthorizationDenied => 401,
            EditorError::CsrfInvalid => 403,
            EditorError::VersionUnsupported(_) => 403,
            EditorError::ValidationFailed(_) => 412,
            EditorError::NotFound => 404,
            EditorError::DeletionForbidden { status, .. } => *status,
            EditorError::Malformed(_) => 400,
            EditorError::Storage(_) | EditorError::Token(_) => 500,
        }
    }

    /// Whether this is a server-side failure rather than a refusal.
    pub fn is_internal(&self) -> bool {
        matches!(self, EditorError::Storage(_) | EditorError::Token(_))
    }

    /// Render as a response envelope about `key`.
    pub fn to_response(&self, key: Option<&str>) -> JsonResponse {
        let message = if self.is_internal() {
            "Server error.".to_string()
        } else {
            self.to_string()
        };
        JsonResponse::new(self.status(), message).with_payload(key_payload(key))
    }
}

/// Answer from [`EditorSpec::deletion_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionCheck {
    Allowed,
    /// Refused; the status and message become the response.
    Denied { status: u16, message: String },
}

/// Per-kind behaviour of an editor.
///
/// `schema` and `default_content` must be provided; every other hook has a
/// pass-through default.
pub trait EditorSpec: Send + Sync {
    /// Storage kind of the edited items.
    fn kind(&self) -> &str;

    /// REST path the editor is served under.
    fn uri(&self) -> &str;

    /// Action name anti-forgery tokens are scoped to.
    fn xsrf_action(&self) -> &str;

    fn schema(&self) -> FieldRegistry;

    /// Mapping returned by a GET without a key.
    fn default_content(&self) -> JsonMap;

    /// Supported item versions. The first is used for new items.
    fn schema_versions(&self) -> Vec<Value> {
        vec![json!("1.0")]
    }

    /// Whether the editor form offers a delete action.
    fn deletable(&self) -> bool {
        true
    }

    /// Clean up the raw payload before conversion.
    fn sanitize_input(&self, _payload: &mut JsonMap) {}

    /// Adjust a loaded item's mapping before it is sent to the editor.
    fn transform_for_editor(&self, dict: JsonMap) -> JsonMap {
        dict
    }

    /// Adjust a converted payload before validation.
    fn transform_after_editor(&self, dict: JsonMap) -> JsonMap {
        dict
    }

    /// Semantic checks the schema cannot express. `dict` may be normalized
    /// in place; problems are appended to `errors`.
    fn validate(
        &self,
        _dict: &mut JsonMap,
        _key: Option<&str>,
        _version: &Value,
        _errors: &mut Vec<String>,
    ) -> courseware_common::Result<()> {
        Ok(())
    }

    fn pre_save(&self, _item: &mut Item) {}

    fn after_save(&self, _item: &Item) {}

    /// Referential checks before an item is deleted.
    fn deletion_check(&self, _item: &Item) -> courseware_common::Result<DeletionCheck> {
        Ok(DeletionCheck::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_statuses_and_messages() {
        assert_eq!(EditorError::AuthorizationDenied.status(), 401);
        assert_eq!(EditorError::CsrfInvalid.status(), 403);
        assert_eq!(
            EditorError::VersionUnsupported("2".into()).to_string(),
            "Version 2 not supported."
        );
        assert_eq!(
            EditorError::ValidationFailed(vec!["a".into(), "b".into()]).to_string(),
            "a\nb"
        );
        assert_eq!(EditorError::NotFound.status(), 404);
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = EditorError::Storage(courseware_common::Error::CorruptEntity {
            kind: "question".into(),
            id: "q1".into(),
        });
        let resp = err.to_response(Some("k"));
        assert_eq!(resp.status, 500);
        assert_eq!(resp.message, "Server error.");
        assert_eq!(resp.payload_map().unwrap()["key"], "k");
    }

    #[test]
    fn test_deletion_forbidden_carries_status() {
        let err = EditorError::DeletionForbidden {
            status: 403,
            message: "In use.".into(),
        };
        let resp = err.to_response(Some("k"));
        assert_eq!((resp.status, resp.message.as_str()), (403, "In use."));
    }
}
