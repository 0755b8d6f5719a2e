//! The descriptor a front end needs to render an editor form.

use super::envelope::JsonResponse;
use super::handler::EditorHandler;
use super::{EditorError, EditorResult};
use crate::auth::Caller;
use courseware_common::JsonMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything needed to build and drive an editor form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDescriptor {
    pub rest_url: String,
    pub exit_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_url: Option<String>,
    pub delete_method: String,
    pub key: Option<String>,
    /// JSON schema of the edited object
    pub schema: Value,
    /// `[path, annotations]` display hints
    pub annotations: Value,
    pub auto_return: bool,
}

impl EditorHandler {
    /// Build the form descriptor for `key` (or for a new item).
    pub fn form_descriptor(
        &self,
        caller: &Caller,
        key: Option<&str>,
        exit_url: &str,
        auto_return: bool,
    ) -> EditorResult<FormDescriptor> {
        if !self.access.is_course_admin(caller) {
            return Err(EditorError::AuthorizationDenied);
        }
        let key = key.filter(|k| !k.is_empty());

        let delete_url = match key {
            Some(key) if self.spec.deletable() => {
                let token = self.xsrf.create_token(caller, self.spec.xsrf_action())?;
                Some(format!(
                    "{}?key={}&xsrf_token={}",
                    self.spec.uri(),
                    urlencoding::encode(key),
                    urlencoding::encode(&token)
                ))
            }
            _ => None,
        };

        let schema = self.schema();
        Ok(FormDescriptor {
            rest_url: self.spec.uri().to_string(),
            exit_url: exit_url.to_string(),
            delete_url,
            delete_method: "delete".to_string(),
            key: key.map(String::from),
            schema: schema.json_schema(),
            annotations: schema.schema_dict(),
            auto_return,
        })
    }

    /// The form descriptor wrapped in a response envelope.
    pub fn form(
        &self,
        caller: &Caller,
        key: Option<&str>,
        exit_url: &str,
        auto_return: bool,
    ) -> JsonResponse {
        let result = self
            .form_descriptor(caller, key, exit_url, auto_return)
            .and_then(|descriptor| {
                let value = serde_json::to_value(&descriptor)
                    .map_err(courseware_common::Error::from)?;
                Ok(value.as_object().cloned().unwrap_or_else(JsonMap::new))
            });
        match result {
            Ok(payload) => JsonResponse::new(200, "Success").with_payload(payload),
            Err(e) => e.to_response(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Identity, PolicyEngine, XsrfTokenManager};
    use crate::editor::dao::EntityDao;
    use crate::editor::hooks::EditorHooks;
    use crate::editor::schema::{FieldRegistry, SchemaField};
    use crate::editor::EditorSpec;
    use courseware_common::Database;
    use serde_json::json;
    use std::sync::Arc;

    struct Memo {
        deletable: bool,
    }

    impl EditorSpec for Memo {
        fn kind(&self) -> &str {
            "memo"
        }

        fn uri(&self) -> &str {
            "/rest/memo"
        }

        fn xsrf_action(&self) -> &str {
            "memo-edit"
        }

        fn schema(&self) -> FieldRegistry {
            let mut schema = FieldRegistry::new("Memo");
            schema.add_property(SchemaField::new("body", "Body", "text"));
            schema
        }

        fn default_content(&self) -> JsonMap {
            JsonMap::new()
        }

        fn deletable(&self) -> bool {
            self.deletable
        }
    }

    fn build_handler(deletable: bool) -> (EditorHandler, Arc<XsrfTokenManager>) {
        let xsrf = Arc::new(XsrfTokenManager::new(b"form-test"));
        let handler = EditorHandler::new(
            Arc::new(Memo { deletable }),
            Arc::new(EntityDao::new(Database::open_memory().unwrap(), "memo")),
            Arc::new(PolicyEngine::new()),
            xsrf.clone(),
        );
        (handler, xsrf)
    }

    fn admin() -> Caller {
        Caller::authenticated(Identity {
            id: "a1".into(),
            email: "a@example.com".into(),
            roles: vec!["course_admin".into()],
            created_at: 0,
            last_login_at: None,
        })
    }

    #[test]
    fn test_descriptor_for_existing_item() {
        let (handler, xsrf) = build_handler(true);
        let form = handler
            .form_descriptor(&admin(), Some("k 1"), "/dashboard", false)
            .unwrap();

        assert_eq!(form.rest_url, "/rest/memo");
        assert_eq!(form.delete_method, "delete");
        assert_eq!(form.key.as_deref(), Some("k 1"));
        assert_eq!(form.schema["properties"]["body"]["type"], "text");
        assert_eq!(form.annotations[0][0], json!([]));

        let delete_url = form.delete_url.unwrap();
        assert!(delete_url.starts_with("/rest/memo?key=k%201&xsrf_token="));
        let token = delete_url.split("xsrf_token=").nth(1).unwrap();
        let token = urlencoding::decode(token).unwrap();
        assert!(xsrf.is_valid(&admin(), "memo-edit", Some(token.as_ref())));
    }

    #[test]
    fn test_no_delete_url_without_key_or_when_not_deletable() {
        let (handler, _) = build_handler(true);
        let form = handler.form_descriptor(&admin(), None, "/", true).unwrap();
        assert!(form.delete_url.is_none());
        assert!(form.auto_return);

        let (handler, _) = build_handler(false);
        let form = handler.form_descriptor(&admin(), Some("k"), "/", false).unwrap();
        assert!(form.delete_url.is_none());
    }

    #[test]
    fn test_schema_hooks_reach_the_form() {
        let (handler, _) = build_handler(true);
        let handler = handler.with_hooks(EditorHooks::new().on_schema_load(|schema| {
            schema.add_property(SchemaField::new("tags", "Tags", "string").optional());
        }));
        let form = handler.form_descriptor(&admin(), None, "/", false).unwrap();
        assert!(form.schema["properties"].get("tags").is_some());
    }

    #[test]
    fn test_form_requires_admin() {
        let (handler, _) = build_handler(true);
        let resp = handler.form(&Caller::anonymous(), Some("k"), "/", false);
        assert_eq!((resp.status, resp.message.as_str()), (401, "Access denied."));

        let resp = handler.form(&admin(), None, "/", false);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.payload_map().unwrap()["rest_url"], "/rest/memo");
    }
}
