//! The generic GET/PUT/DELETE flow shared by every editor.

use super::dao::Dao;
use super::envelope::{key_payload, EditorRequest, JsonResponse};
use super::hooks::EditorHooks;
use super::schema::{json_to_dict, FieldRegistry};
use super::{DeletionCheck, EditorError, EditorResult, EditorSpec};
use crate::auth::{AccessOracle, Caller, XsrfTokenManager};
use courseware_common::{display_version, Item, ID_FIELD, VERSION_FIELD};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

/// REST handler for one editor.
#[derive(Clone)]
pub struct EditorHandler {
    pub(super) spec: Arc<dyn EditorSpec>,
    pub(super) dao: Arc<dyn Dao>,
    pub(super) access: Arc<dyn AccessOracle>,
    pub(super) xsrf: Arc<XsrfTokenManager>,
    pub(super) hooks: EditorHooks,
}

fn non_empty(key: Option<&str>) -> Option<&str> {
    key.filter(|k| !k.is_empty())
}

impl EditorHandler {
    pub fn new(
        spec: Arc<dyn EditorSpec>,
        dao: Arc<dyn Dao>,
        access: Arc<dyn AccessOracle>,
        xsrf: Arc<XsrfTokenManager>,
    ) -> Self {
        Self {
            spec,
            dao,
            access,
            xsrf,
            hooks: EditorHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: EditorHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn uri(&self) -> &str {
        self.spec.uri()
    }

    pub fn kind(&self) -> &str {
        self.spec.kind()
    }

    pub fn xsrf_action(&self) -> &str {
        self.spec.xsrf_action()
    }

    /// The editor schema after schema-load hooks.
    pub fn schema(&self) -> FieldRegistry {
        let mut schema = self.spec.schema();
        self.hooks.run_schema_load(&mut schema);
        schema
    }

    fn is_supported(&self, version: Option<&Value>) -> bool {
        version.is_some_and(|v| self.spec.schema_versions().contains(v))
    }

    fn fail(&self, verb: &str, key: Option<&str>, err: EditorError) -> JsonResponse {
        if err.is_internal() {
            error!("{} {} {:?} failed: {}", verb, self.uri(), key, err);
        } else {
            debug!("{} {} {:?} refused: {}", verb, self.uri(), key, err);
        }
        err.to_response(key)
    }

    // ========================================================================
    // GET
    // ========================================================================

    /// Load an item for editing, or the default content when `key` is absent.
    pub fn get(&self, caller: &Caller, key: Option<&str>) -> JsonResponse {
        let key = non_empty(key);
        self.try_get(caller, key)
            .unwrap_or_else(|e| self.fail("GET", key, e))
    }

    fn try_get(&self, caller: &Caller, key: Option<&str>) -> EditorResult<JsonResponse> {
        if !self.access.is_course_admin(caller) {
            return Err(EditorError::AuthorizationDenied);
        }

        let payload = match key {
            Some(key) => {
                let item = self.dao.load(key)?.ok_or(EditorError::NotFound)?;
                if !self.is_supported(item.version()) {
                    return Err(EditorError::VersionUnsupported(display_version(
                        item.version(),
                    )));
                }

                let mut display = item.dict.clone();
                display.insert(
                    ID_FIELD.to_string(),
                    Value::String(item.id.clone().unwrap_or_else(|| key.to_string())),
                );
                self.hooks.run_pre_load(&item, &mut display);
                self.spec.transform_for_editor(display)
            }
            None => self.spec.default_content(),
        };

        let token = self.xsrf.create_token(caller, self.spec.xsrf_action())?;
        Ok(JsonResponse::new(200, "Success")
            .with_payload(payload)
            .with_xsrf_token(token))
    }

    // ========================================================================
    // PUT
    // ========================================================================

    /// Validate and store the item described by the raw `request` field.
    pub fn put(&self, caller: &Caller, raw_request: &str) -> JsonResponse {
        let request = match EditorRequest::parse(raw_request) {
            Ok(request) => request,
            Err(e) => {
                return self.fail(
                    "PUT",
                    None,
                    EditorError::Malformed(format!("Malformed request: {}", e)),
                )
            }
        };
        let key = request.key();
        self.try_put(caller, &request, key.as_deref())
            .unwrap_or_else(|e| self.fail("PUT", key.as_deref(), e))
    }

    fn try_put(
        &self,
        caller: &Caller,
        request: &EditorRequest,
        key: Option<&str>,
    ) -> EditorResult<JsonResponse> {
        if !self
            .xsrf
            .is_valid(caller, self.spec.xsrf_action(), request.xsrf_token.as_deref())
        {
            return Err(EditorError::CsrfInvalid);
        }
        if !self.access.is_course_admin(caller) {
            return Err(EditorError::AuthorizationDenied);
        }

        let mut payload = request.payload_map().map_err(EditorError::Malformed)?;
        self.spec.sanitize_input(&mut payload);

        let mut errors = Vec::new();
        let mut dict = json_to_dict(&payload, &self.schema().json_schema(), &mut errors);

        match dict.get(VERSION_FIELD).cloned() {
            Some(version) if self.is_supported(Some(&version)) => {
                if errors.is_empty() {
                    dict = self.spec.transform_after_editor(dict);
                    self.spec.validate(&mut dict, key, &version, &mut errors)?;
                }
            }
            version => errors.push(format!(
                "Version {} not supported.",
                display_version(version.as_ref())
            )),
        }

        if !errors.is_empty() {
            return Err(EditorError::ValidationFailed(errors));
        }

        let mut item = Item::new(key.map(String::from), dict);
        self.spec.pre_save(&mut item);
        self.hooks.run_pre_save(&mut item);
        let saved_key = self.dao.save(&item)?;
        item.id = Some(saved_key.clone());
        self.spec.after_save(&item);

        info!("Saved {} {}", self.spec.kind(), saved_key);
        Ok(JsonResponse::new(200, "Saved.").with_payload(key_payload(Some(&saved_key))))
    }

    // ========================================================================
    // DELETE
    // ========================================================================

    pub fn delete(&self, caller: &Caller, key: Option<&str>, xsrf_token: Option<&str>) -> JsonResponse {
        let key = non_empty(key);
        self.try_delete(caller, key, xsrf_token)
            .unwrap_or_else(|e| self.fail("DELETE", key, e))
    }

    fn try_delete(
        &self,
        caller: &Caller,
        key: Option<&str>,
        xsrf_token: Option<&str>,
    ) -> EditorResult<JsonResponse> {
        if !self.xsrf.is_valid(caller, self.spec.xsrf_action(), xsrf_token) {
            return Err(EditorError::CsrfInvalid);
        }
        if !self.access.is_course_admin(caller) {
            return Err(EditorError::AuthorizationDenied);
        }

        let key = key.ok_or(EditorError::NotFound)?;
        let item = self.dao.load(key)?.ok_or(EditorError::NotFound)?;

        if let DeletionCheck::Denied { status, message } = self.spec.deletion_check(&item)? {
            return Err(EditorError::DeletionForbidden { status, message });
        }

        self.dao.delete(key)?;
        info!("Deleted {} {}", self.spec.kind(), key);
        Ok(JsonResponse::new(200, "Deleted."))
    }
}
