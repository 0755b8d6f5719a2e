//! Question groups: ordered, weighted lists of questions.

use super::{parse_float, str_attr, trim_attr, QUESTION_GROUP_KIND, QUESTION_KIND};
use crate::editor::{Dao, EditorSpec, EntityDao, FieldArray, FieldRegistry, SchemaField};
use courseware_common::{Database, JsonMap};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::warn;

pub const QUESTION_GROUP_VERSION: &str = "1.5";

pub struct QuestionGroupEditor {
    questions: EntityDao,
    groups: EntityDao,
}

impl QuestionGroupEditor {
    pub fn new(db: &Database) -> Self {
        Self {
            questions: EntityDao::new(db.clone(), QUESTION_KIND),
            groups: EntityDao::new(db.clone(), QUESTION_GROUP_KIND),
        }
    }

    /// `(id, description)` of every question, by description.
    fn question_choices(&self) -> Vec<(String, String)> {
        let questions = match self.questions.list() {
            Ok(questions) => questions,
            Err(e) => {
                warn!("Failed to list questions for group editor: {}", e);
                return Vec::new();
            }
        };
        let mut choices: Vec<(String, String)> = questions
            .into_iter()
            .filter_map(|q| {
                let description = q.get_str("description").unwrap_or("").to_string();
                q.id.map(|id| (id, description))
            })
            .collect();
        choices.sort_by(|a, b| a.1.cmp(&b.1));
        choices
    }
}

impl EditorSpec for QuestionGroupEditor {
    fn kind(&self) -> &str {
        QUESTION_GROUP_KIND
    }

    fn uri(&self) -> &str {
        "/rest/question_group"
    }

    fn xsrf_action(&self) -> &str {
        "question-group-edit"
    }

    fn schema(&self) -> FieldRegistry {
        let mut schema = FieldRegistry::new("Question Group").with_description("question_group");
        schema.add_property(SchemaField::new("version", "", "string").optional().hidden());
        schema.add_property(SchemaField::new("description", "Description", "string").optional());
        schema.add_property(SchemaField::new("introduction", "Introduction", "html").optional());

        let choices = self.question_choices();
        let mut item = FieldRegistry::new("Item").with_extra("className", "question-group-item");
        item.add_property(
            SchemaField::new("weight", "Weight", "number")
                .optional()
                .with_extra("className", "question-group-weight"),
        );
        item.add_property(
            SchemaField::new("question", "Question", "string")
                .optional()
                .with_select_data(
                    choices
                        .iter()
                        .map(|(id, description)| (id.clone(), description.as_str()))
                        .collect(),
                )
                .with_extra("className", "question-group-question"),
        );

        let mut class_name = "question-group-items".to_string();
        if choices.is_empty() {
            class_name.push_str(" empty-question-list");
        }
        schema.add_property(
            FieldArray::new("items", "", item)
                .optional()
                .with_extra("className", class_name)
                .with_extra("sortable", "true")
                .with_extra("listAddLabel", "Add a question")
                .with_extra("listRemoveLabel", "Remove"),
        );
        schema
    }

    fn default_content(&self) -> JsonMap {
        json!({
            "version": QUESTION_GROUP_VERSION,
            "description": "",
            "introduction": "",
            "items": [],
        })
        .as_object()
        .cloned()
        .unwrap_or_default()
    }

    fn schema_versions(&self) -> Vec<Value> {
        vec![json!(QUESTION_GROUP_VERSION)]
    }

    fn sanitize_input(&self, payload: &mut JsonMap) {
        trim_attr(payload, "description");
    }

    fn validate(
        &self,
        dict: &mut JsonMap,
        key: Option<&str>,
        _version: &Value,
        errors: &mut Vec<String>,
    ) -> courseware_common::Result<()> {
        let description = str_attr(dict, "description");
        if description.is_empty() {
            errors.push("The description must be non-empty.".to_string());
        }
        let collides = self
            .groups
            .list()?
            .iter()
            .filter(|g| key.is_none() || g.id.as_deref() != key)
            .any(|g| g.get_str("description") == Some(description));
        if collides {
            errors.push(
                "The description must be different from existing question groups.".to_string(),
            );
        }

        let known: HashSet<String> = self
            .questions
            .list()?
            .into_iter()
            .filter_map(|q| q.id)
            .collect();
        let items: &[Value] = match dict.get("items") {
            Some(Value::Array(items)) => items,
            _ => &[],
        };
        for (index, item) in items.iter().enumerate() {
            let question = item.get("question").and_then(Value::as_str).unwrap_or("");
            if !known.contains(question) {
                errors.push(format!("Item {} must name an existing question.", index + 1));
            }
            if parse_float(item.get("weight")).is_none() {
                errors.push(format!("Item {} must have a numeric weight.", index + 1));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::json_to_dict;
    use courseware_common::Item;

    fn setup() -> (QuestionGroupEditor, EntityDao) {
        let db = Database::open_memory().unwrap();
        let questions = EntityDao::new(db.clone(), QUESTION_KIND);
        (QuestionGroupEditor::new(&db), questions)
    }

    fn add_question(dao: &EntityDao, description: &str) -> String {
        let dict = json!({"description": description}).as_object().cloned().unwrap();
        dao.save(&Item::new(None, dict)).unwrap()
    }

    fn check(editor: &QuestionGroupEditor, payload: Value) -> Vec<String> {
        let mut payload = payload.as_object().cloned().unwrap();
        editor.sanitize_input(&mut payload);
        let mut errors = Vec::new();
        let mut dict = json_to_dict(&payload, &editor.schema().json_schema(), &mut errors);
        if errors.is_empty() {
            editor.validate(&mut dict, None, &json!("1.5"), &mut errors).unwrap();
        }
        errors
    }

    #[test]
    fn test_select_data_lists_questions_by_description() {
        let (editor, questions) = setup();
        let b = add_question(&questions, "beta");
        let a = add_question(&questions, "alpha");

        let annotations = editor.schema().schema_dict();
        let entry = annotations
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e[0].as_array().unwrap().last() == Some(&json!("_inputex"))
                && e[0].as_array().unwrap().contains(&json!("question")))
            .unwrap();
        let choices = entry[1]["choices"].as_array().unwrap();
        assert_eq!(choices[0]["value"], a.as_str());
        assert_eq!(choices[1]["value"], b.as_str());
    }

    #[test]
    fn test_empty_question_list_is_flagged() {
        let (editor, _) = setup();
        let annotations = editor.schema().schema_dict();
        assert!(annotations.to_string().contains("empty-question-list"));
    }

    #[test]
    fn test_items_must_reference_questions() {
        let (editor, questions) = setup();
        let q = add_question(&questions, "q");
        let errors = check(
            &editor,
            json!({
                "version": "1.5",
                "description": " week 1 ",
                "items": [
                    {"question": q, "weight": "1"},
                    {"question": "missing", "weight": 2},
                    {"question": q},
                ],
            }),
        );
        assert_eq!(
            errors,
            vec![
                "Item 2 must name an existing question.",
                "Item 3 must have a numeric weight.",
            ]
        );
    }

    #[test]
    fn test_description_required() {
        let (editor, _) = setup();
        let errors = check(&editor, json!({"version": "1.5", "description": "  "}));
        assert_eq!(errors, vec!["The description must be non-empty."]);
    }
}
