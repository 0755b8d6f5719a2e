//! Per-administrator display preferences.

use crate::editor::{EditorSpec, FieldRegistry, SchemaField};
use courseware_common::JsonMap;
use serde_json::{json, Value};

pub const ADMIN_PREFS_VERSION: &str = "1.0";

pub struct AdminPrefsEditor;

impl EditorSpec for AdminPrefsEditor {
    fn kind(&self) -> &str {
        "admin_prefs"
    }

    fn uri(&self) -> &str {
        "/rest/admin_prefs"
    }

    fn xsrf_action(&self) -> &str {
        "admin-prefs-edit"
    }

    fn schema(&self) -> FieldRegistry {
        let mut schema = FieldRegistry::new("Admin Prefs")
            .with_description("Administrator preferences")
            .with_extra("className", "inputEx-Group new-form-layout hidden-header");
        schema.add_property(SchemaField::new("version", "", "string").optional().hidden());
        schema.add_property(SchemaField::new("id", "", "string").optional().hidden());
        schema.add_property(
            SchemaField::new("show_hooks", "Show Hook Edit Buttons", "boolean")
                .optional()
                .with_description(
                    "Whether to show controls on course pages to permit editing of \
                     HTML inclusions (hook points) at that location on the page.",
                ),
        );
        schema.add_property(
            SchemaField::new("show_jinja_context", "Show Template Context", "boolean")
                .optional()
                .with_description(
                    "Whether to show a dump of the template context at the bottom \
                     of course pages.",
                ),
        );
        schema
    }

    fn default_content(&self) -> JsonMap {
        let mut content = JsonMap::new();
        content.insert("version".into(), json!(ADMIN_PREFS_VERSION));
        content.insert("show_hooks".into(), Value::Bool(false));
        content
    }

    fn schema_versions(&self) -> Vec<Value> {
        vec![json!(ADMIN_PREFS_VERSION)]
    }

    fn deletable(&self) -> bool {
        false
    }
}
