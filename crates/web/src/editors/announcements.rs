//! Course announcements.

use super::{str_attr, trim_attr};
use crate::editor::{EditorSpec, FieldRegistry, SchemaField};
use crate::editor::schema::ISO_8601_DATE_FORMAT;
use courseware_common::{Item, JsonMap, ID_FIELD};
use serde_json::{json, Value};
use tracing::info;

pub const ANNOUNCEMENT_VERSION: &str = "1.0";

pub struct AnnouncementsEditor;

impl EditorSpec for AnnouncementsEditor {
    fn kind(&self) -> &str {
        "announcement"
    }

    fn uri(&self) -> &str {
        "/rest/announcements"
    }

    fn xsrf_action(&self) -> &str {
        "announcement-edit"
    }

    fn schema(&self) -> FieldRegistry {
        let mut schema = FieldRegistry::new("Announcement");
        schema.add_property(SchemaField::new("version", "", "string").optional().hidden());
        schema.add_property(
            SchemaField::new("key", "ID", "string")
                .optional()
                .read_only()
                .with_extra("className", "inputEx-Field keyHolder"),
        );
        schema.add_property(SchemaField::new("title", "Title", "string").optional());
        schema.add_property(SchemaField::new("html", "Body", "html").optional());
        schema.add_property(
            SchemaField::new("date", "Date", "date")
                .optional()
                .with_extra("dateFormat", "Y-m-d")
                .with_extra("valueFormat", "Y-m-d"),
        );
        schema.add_property(
            SchemaField::new("send_email", "Send Email", "boolean")
                .optional()
                .with_description("Announcement list not configured."),
        );
        schema.add_property(
            SchemaField::new("is_draft", "Status", "boolean")
                .with_select_data(vec![(true, "Private"), (false, "Public")])
                .with_extra("className", "split-from-main-group"),
        );
        schema
    }

    fn default_content(&self) -> JsonMap {
        let today = chrono::Utc::now().date_naive();
        let mut content = JsonMap::new();
        content.insert("version".into(), json!(ANNOUNCEMENT_VERSION));
        content.insert("title".into(), json!("New Announcement"));
        content.insert("date".into(), json!(today.format(ISO_8601_DATE_FORMAT).to_string()));
        content.insert("html".into(), json!(""));
        content.insert("is_draft".into(), Value::Bool(true));
        content.insert("send_email".into(), Value::Bool(false));
        content
    }

    fn schema_versions(&self) -> Vec<Value> {
        vec![json!(ANNOUNCEMENT_VERSION)]
    }

    fn sanitize_input(&self, payload: &mut JsonMap) {
        trim_attr(payload, "title");
    }

    // The key holder shows the item key
    fn transform_for_editor(&self, mut dict: JsonMap) -> JsonMap {
        if let Some(id) = dict.get(ID_FIELD).cloned() {
            dict.insert("key".into(), id);
        }
        dict
    }

    fn transform_after_editor(&self, mut dict: JsonMap) -> JsonMap {
        dict.remove("key");
        dict
    }

    fn validate(
        &self,
        dict: &mut JsonMap,
        _key: Option<&str>,
        _version: &Value,
        errors: &mut Vec<String>,
    ) -> courseware_common::Result<()> {
        if str_attr(dict, "title").is_empty() {
            errors.push("The announcement must have a title.".to_string());
        }
        Ok(())
    }

    fn after_save(&self, item: &Item) {
        if item.dict.get("send_email") == Some(&Value::Bool(true)) {
            info!(
                "Announcement {:?} asked for email but no announcement list is configured",
                item.id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::json_to_dict;

    fn convert(payload: Value) -> (JsonMap, Vec<String>) {
        let editor = AnnouncementsEditor;
        let mut payload = payload.as_object().cloned().unwrap();
        editor.sanitize_input(&mut payload);
        let mut errors = Vec::new();
        let mut dict = json_to_dict(&payload, &editor.schema().json_schema(), &mut errors);
        if errors.is_empty() {
            dict = editor.transform_after_editor(dict);
            editor
                .validate(&mut dict, None, &json!("1.0"), &mut errors)
                .unwrap();
        }
        (dict, errors)
    }

    #[test]
    fn test_title_is_trimmed_and_required() {
        let (dict, errors) = convert(json!({"title": "  Hello ", "is_draft": false}));
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(dict["title"], "Hello");

        let (_, errors) = convert(json!({"title": "   ", "is_draft": false}));
        assert_eq!(errors, vec!["The announcement must have a title."]);
    }

    #[test]
    fn test_date_is_normalized() {
        let (dict, errors) = convert(json!({"title": "t", "is_draft": "true", "date": "2024/03/09"}));
        assert!(errors.is_empty());
        assert_eq!(dict["date"], "2024-03-09");
        assert_eq!(dict["is_draft"], true);
    }

    #[test]
    fn test_key_is_shown_but_not_stored() {
        let mut dict = JsonMap::new();
        dict.insert("id".into(), json!("a1"));
        assert_eq!(AnnouncementsEditor.transform_for_editor(dict)["key"], "a1");

        let (dict, _) = convert(json!({"title": "t", "is_draft": true, "key": "a1"}));
        assert!(!dict.contains_key("key"));
    }

    #[test]
    fn test_defaults_are_a_draft() {
        let content = AnnouncementsEditor.default_content();
        assert_eq!(content["is_draft"], true);
        assert_eq!(content["version"], "1.0");
    }
}
