//! The course editors served by the web server.

pub mod admin_prefs;
pub mod announcements;
pub mod question_groups;
pub mod questions;

pub use admin_prefs::AdminPrefsEditor;
pub use announcements::AnnouncementsEditor;
pub use question_groups::QuestionGroupEditor;
pub use questions::{QuestionEditor, QuestionType};

use crate::auth::{AccessOracle, XsrfTokenManager};
use crate::editor::{EditorHandler, EditorSpec, EntityDao};
use courseware_common::{Database, JsonMap};
use serde_json::Value;
use std::sync::Arc;

/// Storage kind shared by multiple choice and short answer questions.
pub const QUESTION_KIND: &str = "question";

pub const QUESTION_GROUP_KIND: &str = "question_group";

/// Wrap `spec` in a handler storing its items in `db`.
pub fn build_handler(
    spec: Arc<dyn EditorSpec>,
    db: &Database,
    access: Arc<dyn AccessOracle>,
    xsrf: Arc<XsrfTokenManager>,
) -> EditorHandler {
    let dao = Arc::new(EntityDao::new(db.clone(), spec.kind()));
    EditorHandler::new(spec, dao, access, xsrf)
}

/// Every built-in course editor.
pub fn course_editors(
    db: &Database,
    access: Arc<dyn AccessOracle>,
    xsrf: Arc<XsrfTokenManager>,
) -> Vec<EditorHandler> {
    let specs: Vec<Arc<dyn EditorSpec>> = vec![
        Arc::new(AdminPrefsEditor),
        Arc::new(AnnouncementsEditor),
        Arc::new(QuestionEditor::new(QuestionType::MultipleChoice, db)),
        Arc::new(QuestionEditor::new(QuestionType::ShortAnswer, db)),
        Arc::new(QuestionGroupEditor::new(db)),
    ];
    specs
        .into_iter()
        .map(|spec| build_handler(spec, db, access.clone(), xsrf.clone()))
        .collect()
}

/// Read a string attribute, treating anything else as empty.
pub(crate) fn str_attr<'a>(dict: &'a JsonMap, name: &str) -> &'a str {
    dict.get(name).and_then(Value::as_str).unwrap_or("")
}

/// Trim a string attribute in place.
pub(crate) fn trim_attr(dict: &mut JsonMap, name: &str) {
    if let Some(Value::String(s)) = dict.get_mut(name) {
        let trimmed = s.trim();
        if trimmed.len() != s.len() {
            *s = trimmed.to_string();
        }
    }
}

/// Parse a number the way a form submits it: a JSON number or a string.
pub(crate) fn parse_float(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub(crate) fn parse_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Compare a stored reference against a key, whether it was stored as a
/// string or a number.
pub(crate) fn refers_to(value: Option<&Value>, key: &str) -> bool {
    match value {
        Some(Value::String(s)) => s == key,
        Some(Value::Number(n)) => n.to_string() == key,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PolicyEngine;
    use serde_json::json;

    #[test]
    fn test_course_editor_uris_are_unique() {
        let db = Database::open_memory().unwrap();
        let editors = course_editors(
            &db,
            Arc::new(PolicyEngine::new()),
            Arc::new(XsrfTokenManager::new(b"k")),
        );
        let mut uris: Vec<&str> = editors.iter().map(|e| e.uri()).collect();
        uris.sort();
        uris.dedup();
        assert_eq!(uris.len(), 5);
        assert!(uris.contains(&"/rest/question/mc"));
    }

    #[test]
    fn test_attr_helpers() {
        let mut dict = json!({"a": "  x ", "n": 3}).as_object().cloned().unwrap();
        trim_attr(&mut dict, "a");
        trim_attr(&mut dict, "n");
        assert_eq!(str_attr(&dict, "a"), "x");
        assert_eq!(str_attr(&dict, "n"), "");
        assert_eq!(parse_float(Some(&json!(" 2.5"))), Some(2.5));
        assert_eq!(parse_float(Some(&json!("two"))), None);
        assert_eq!(parse_int(Some(&json!("7"))), Some(7));
        assert_eq!(parse_int(Some(&json!("7.5"))), None);
        assert!(refers_to(Some(&json!(12)), "12"));
        assert!(!refers_to(None, "12"));
    }
}
