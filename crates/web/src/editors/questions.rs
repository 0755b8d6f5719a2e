//! Multiple choice and short answer question editors.
//!
//! Both kinds of question live under [`QUESTION_KIND`]; the `type`
//! attribute tells them apart. A question cannot be deleted while a
//! question group still lists it.

use super::{parse_float, parse_int, refers_to, str_attr, trim_attr, QUESTION_GROUP_KIND, QUESTION_KIND};
use crate::editor::{
    Dao, DeletionCheck, EditorSpec, EntityDao, FieldArray, FieldRegistry, SchemaField,
};
use courseware_common::{Database, Item, JsonMap};
use serde_json::{json, Value};

pub const QUESTION_VERSION: &str = "1.5";

/// Stored in the `type` attribute.
pub const MULTIPLE_CHOICE: i64 = 0;
pub const SHORT_ANSWER: i64 = 1;

pub const DEFAULT_HEIGHT_ROWS: i64 = 1;
pub const DEFAULT_WIDTH_COLUMNS: i64 = 100;

/// Matchers a short answer grader may use, with their labels.
pub const GRADER_TYPES: &[(&str, &str)] = &[
    ("case_insensitive", "Case insensitive string match"),
    ("regex", "Regular expression"),
    ("numeric", "Numeric"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    MultipleChoice,
    ShortAnswer,
}

impl QuestionType {
    pub fn code(self) -> i64 {
        match self {
            QuestionType::MultipleChoice => MULTIPLE_CHOICE,
            QuestionType::ShortAnswer => SHORT_ANSWER,
        }
    }
}

pub struct QuestionEditor {
    question_type: QuestionType,
    questions: EntityDao,
    groups: EntityDao,
}

impl QuestionEditor {
    pub fn new(question_type: QuestionType, db: &Database) -> Self {
        Self {
            question_type,
            questions: EntityDao::new(db.clone(), QUESTION_KIND),
            groups: EntityDao::new(db.clone(), QUESTION_GROUP_KIND),
        }
    }

    fn check_description(
        &self,
        description: &str,
        key: Option<&str>,
        errors: &mut Vec<String>,
    ) -> courseware_common::Result<()> {
        if description.is_empty() {
            errors.push("The description must be non-empty.".to_string());
        }
        let collides = self
            .questions
            .list()?
            .iter()
            .filter(|q| key.is_none() || q.id.as_deref() != key)
            .any(|q| q.get_str("description") == Some(description));
        if collides {
            errors.push("The description must be different from existing questions.".to_string());
        }
        Ok(())
    }

    fn validate_mc(&self, dict: &mut JsonMap, errors: &mut Vec<String>) {
        let Some(Value::Array(choices)) = dict.get_mut("choices") else {
            errors.push("The question must have at least one choice.".to_string());
            return;
        };
        if choices.is_empty() {
            errors.push("The question must have at least one choice.".to_string());
        }

        for (index, choice) in choices.iter_mut().enumerate() {
            let Some(choice) = choice.as_object_mut() else {
                continue;
            };
            if str_attr(choice, "text").trim().is_empty() {
                errors.push(format!("Choice {} has no response text.", index + 1));
            }
            match parse_float(choice.get("score")) {
                Some(score) => {
                    choice.insert("score".into(), json!(score));
                }
                None => errors.push(format!("Choice {} must have a numeric score.", index + 1)),
            }
        }
    }

    fn validate_sa(&self, dict: &mut JsonMap, errors: &mut Vec<String>) {
        for (field, label, default) in [
            ("rows", "Rows", DEFAULT_HEIGHT_ROWS),
            ("columns", "Columns", DEFAULT_WIDTH_COLUMNS),
        ] {
            let value = match dict.get(field) {
                None | Some(Value::Null) => Some(default),
                present => parse_int(present),
            };
            match value {
                Some(n) => {
                    dict.insert(field.into(), json!(n));
                    if n <= 0 {
                        errors.push(format!("{} must be a positive whole number", label));
                    }
                }
                None => errors.push(format!("{} must be a whole number", label)),
            }
        }

        let graders: &[Value] = match dict.get("graders") {
            Some(Value::Array(graders)) => graders,
            _ => &[],
        };
        if graders.is_empty() {
            errors.push("The question must have at least one answer.".to_string());
        }

        for (index, grader) in graders.iter().enumerate() {
            let empty = JsonMap::new();
            let grader = grader.as_object().unwrap_or(&empty);
            let matcher = grader
                .get("matcher")
                .and_then(Value::as_str)
                .unwrap_or("case_insensitive");
            if !GRADER_TYPES.iter().any(|(name, _)| *name == matcher) {
                errors.push(format!("Answer {} has an unknown matcher: {}", index + 1, matcher));
            }
            if str_attr(grader, "response").trim().is_empty() {
                errors.push(format!("Answer {} has no response text.", index + 1));
            }
            if parse_float(grader.get("score")).is_none() {
                errors.push(format!("Answer {} must have a numeric score.", index + 1));
            }
        }
    }

    fn mc_schema() -> FieldRegistry {
        let mut schema = FieldRegistry::new("Multiple Choice Question")
            .with_description("multiple choice question")
            .with_extra("className", "mc-container");
        schema.add_property(
            SchemaField::new("description", "Description", "string")
                .optional()
                .with_extra("className", "mc-description"),
        );
        schema.add_property(SchemaField::new("version", "", "string").optional().hidden());
        schema.add_property(
            SchemaField::new("question", "Question", "html")
                .optional()
                .with_extra("className", "mc-question"),
        );
        schema.add_property(
            SchemaField::new("multiple_selections", "Selection", "boolean")
                .optional()
                .with_select_data(vec![
                    ("false", "Allow only one selection"),
                    ("true", "Allow multiple selections"),
                ])
                .with_extra("_type", "radio")
                .with_extra("className", "mc-selection"),
        );

        let mut choice = FieldRegistry::new("Choice").with_extra("className", "mc-choice");
        choice.add_property(
            SchemaField::new("score", "Score", "string")
                .optional()
                .with_extra("className", "mc-choice-score")
                .with_extra("value", "0"),
        );
        choice.add_property(
            SchemaField::new("text", "Text", "html")
                .optional()
                .with_extra("className", "mc-choice-text"),
        );
        choice.add_property(
            SchemaField::new("feedback", "Feedback", "html")
                .optional()
                .with_extra("className", "mc-choice-feedback"),
        );
        schema.add_property(
            FieldArray::new("choices", "", choice)
                .optional()
                .with_extra("className", "mc-choice-container")
                .with_extra("listAddLabel", "Add a choice")
                .with_extra("listRemoveLabel", "Delete choice"),
        );
        schema
    }

    fn sa_schema() -> FieldRegistry {
        let mut schema = FieldRegistry::new("Short Answer Question")
            .with_description("short answer question")
            .with_extra("className", "sa-container");
        schema.add_property(SchemaField::new("version", "", "string").optional().hidden());
        schema.add_property(
            SchemaField::new("description", "Description", "string")
                .optional()
                .with_extra("className", "sa-description"),
        );
        schema.add_property(
            SchemaField::new("question", "Question", "html")
                .optional()
                .with_extra("className", "sa-question"),
        );
        schema.add_property(
            SchemaField::new("hint", "Hint", "html")
                .optional()
                .with_extra("className", "sa-hint"),
        );
        schema.add_property(
            SchemaField::new("defaultFeedback", "Feedback", "html")
                .optional()
                .with_extra("className", "sa-feedback"),
        );
        schema.add_property(
            SchemaField::new("rows", "Rows", "string")
                .optional()
                .with_extra("className", "sa-rows")
                .with_extra("value", DEFAULT_HEIGHT_ROWS),
        );
        schema.add_property(
            SchemaField::new("columns", "Columns", "string")
                .optional()
                .with_extra("className", "sa-columns")
                .with_extra("value", DEFAULT_WIDTH_COLUMNS),
        );

        let mut grader = FieldRegistry::new("Answer").with_extra("className", "sa-grader");
        grader.add_property(
            SchemaField::new("score", "Score", "string")
                .optional()
                .with_extra("className", "sa-grader-score")
                .with_extra("value", "1.0"),
        );
        grader.add_property(
            SchemaField::new("matcher", "Grading", "string")
                .optional()
                .with_select_data(GRADER_TYPES.to_vec())
                .with_extra("className", "sa-grader-score"),
        );
        grader.add_property(
            SchemaField::new("response", "Response", "string")
                .optional()
                .with_extra("className", "sa-grader-text"),
        );
        grader.add_property(
            SchemaField::new("feedback", "Feedback", "html")
                .optional()
                .with_extra("className", "sa-grader-feedback"),
        );
        schema.add_property(
            FieldArray::new("graders", "", grader)
                .optional()
                .with_extra("className", "sa-grader-container")
                .with_extra("listAddLabel", "Add an answer")
                .with_extra("listRemoveLabel", "Delete this answer"),
        );
        schema
    }
}

impl EditorSpec for QuestionEditor {
    fn kind(&self) -> &str {
        QUESTION_KIND
    }

    fn uri(&self) -> &str {
        match self.question_type {
            QuestionType::MultipleChoice => "/rest/question/mc",
            QuestionType::ShortAnswer => "/rest/question/sa",
        }
    }

    fn xsrf_action(&self) -> &str {
        match self.question_type {
            QuestionType::MultipleChoice => "mc-question-edit",
            QuestionType::ShortAnswer => "sa-question-edit",
        }
    }

    fn schema(&self) -> FieldRegistry {
        match self.question_type {
            QuestionType::MultipleChoice => Self::mc_schema(),
            QuestionType::ShortAnswer => Self::sa_schema(),
        }
    }

    fn default_content(&self) -> JsonMap {
        let content = match self.question_type {
            QuestionType::MultipleChoice => json!({
                "version": QUESTION_VERSION,
                "question": "",
                "description": "",
                "multiple_selections": "false",
                "choices": [
                    {"score": "1", "text": "", "feedback": ""},
                    {"score": "0", "text": "", "feedback": ""},
                    {"score": "0", "text": "", "feedback": ""},
                    {"score": "0", "text": "", "feedback": ""},
                ],
            }),
            QuestionType::ShortAnswer => json!({
                "version": QUESTION_VERSION,
                "question": "",
                "description": "",
                "graders": [{
                    "score": "1.0",
                    "matcher": "case_insensitive",
                    "response": "",
                    "feedback": "",
                }],
            }),
        };
        content.as_object().cloned().unwrap_or_default()
    }

    fn schema_versions(&self) -> Vec<Value> {
        vec![json!(QUESTION_VERSION)]
    }

    fn sanitize_input(&self, payload: &mut JsonMap) {
        trim_attr(payload, "description");
    }

    // Radio buttons round-trip strings, not booleans
    fn transform_for_editor(&self, mut dict: JsonMap) -> JsonMap {
        if self.question_type == QuestionType::MultipleChoice {
            let multiple = dict.get("multiple_selections") == Some(&Value::Bool(true));
            dict.insert(
                "multiple_selections".into(),
                json!(if multiple { "true" } else { "false" }),
            );
        }
        dict
    }

    fn validate(
        &self,
        dict: &mut JsonMap,
        key: Option<&str>,
        _version: &Value,
        errors: &mut Vec<String>,
    ) -> courseware_common::Result<()> {
        if str_attr(dict, "question").trim().is_empty() {
            errors.push("The question must have a non-empty body.".to_string());
        }
        let description = str_attr(dict, "description").to_string();
        self.check_description(&description, key, errors)?;

        match self.question_type {
            QuestionType::MultipleChoice => self.validate_mc(dict, errors),
            QuestionType::ShortAnswer => self.validate_sa(dict, errors),
        }
        Ok(())
    }

    fn pre_save(&self, item: &mut Item) {
        item.dict
            .insert("type".into(), json!(self.question_type.code()));
    }

    fn deletion_check(&self, item: &Item) -> courseware_common::Result<DeletionCheck> {
        let Some(id) = item.id.as_deref() else {
            return Ok(DeletionCheck::Allowed);
        };

        let mut used_by: Vec<String> = self
            .groups
            .list()?
            .iter()
            .filter(|group| {
                group
                    .dict
                    .get("items")
                    .and_then(Value::as_array)
                    .is_some_and(|items| items.iter().any(|i| refers_to(i.get("question"), id)))
            })
            .map(|group| format!("\"{}\"", group.get_str("description").unwrap_or("")))
            .collect();

        if used_by.is_empty() {
            return Ok(DeletionCheck::Allowed);
        }
        used_by.sort();
        Ok(DeletionCheck::Denied {
            status: 403,
            message: format!(
                "Question in use by question groups:\n{}.\nPlease delete it from those groups and try again.",
                used_by.join(",\n")
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::json_to_dict;

    fn editor(question_type: QuestionType) -> (QuestionEditor, Database) {
        let db = Database::open_memory().unwrap();
        (QuestionEditor::new(question_type, &db), db)
    }

    fn obj(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    fn check(editor: &QuestionEditor, payload: Value, key: Option<&str>) -> (JsonMap, Vec<String>) {
        let mut payload = obj(payload);
        editor.sanitize_input(&mut payload);
        let mut errors = Vec::new();
        let mut dict = json_to_dict(&payload, &editor.schema().json_schema(), &mut errors);
        assert!(errors.is_empty(), "{:?}", errors);
        editor
            .validate(&mut dict, key, &json!(QUESTION_VERSION), &mut errors)
            .unwrap();
        (dict, errors)
    }

    fn mc_payload(description: &str) -> Value {
        json!({
            "version": "1.5",
            "description": description,
            "question": "What is 2 + 2?",
            "multiple_selections": "false",
            "choices": [
                {"score": "1", "text": "4", "feedback": ""},
                {"score": "0", "text": "5", "feedback": ""},
            ],
        })
    }

    #[test]
    fn test_both_question_types_share_storage_kind() {
        let (mc, db) = editor(QuestionType::MultipleChoice);
        let sa = QuestionEditor::new(QuestionType::ShortAnswer, &db);
        assert_eq!(mc.kind(), "question");
        assert_eq!(sa.kind(), mc.kind());
        assert_ne!(mc.kind(), QUESTION_GROUP_KIND);
    }

    #[test]
    fn test_mc_scores_are_coerced() {
        let (editor, _) = editor(QuestionType::MultipleChoice);
        let (dict, errors) = check(&editor, mc_payload(" arithmetic "), None);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(dict["description"], "arithmetic");
        assert_eq!(dict["choices"][0]["score"], json!(1.0));
        assert_eq!(dict["multiple_selections"], false);
    }

    #[test]
    fn test_mc_reports_each_bad_choice() {
        let (editor, _) = editor(QuestionType::MultipleChoice);
        let (_, errors) = check(
            &editor,
            json!({
                "version": "1.5",
                "description": "",
                "question": "  ",
                "choices": [
                    {"score": "one", "text": "a"},
                    {"score": "0", "text": " "},
                ],
            }),
            None,
        );
        assert_eq!(
            errors,
            vec![
                "The question must have a non-empty body.",
                "The description must be non-empty.",
                "Choice 1 must have a numeric score.",
                "Choice 2 has no response text.",
            ]
        );

        let (_, errors) = check(
            &editor,
            json!({"version": "1.5", "description": "d", "question": "q", "choices": []}),
            None,
        );
        assert_eq!(errors, vec!["The question must have at least one choice."]);
    }

    #[test]
    fn test_description_collision_ignores_own_key() {
        let (editor, db) = editor(QuestionType::MultipleChoice);
        let dao = EntityDao::new(db, QUESTION_KIND);
        let key = dao
            .save(&Item::new(None, obj(json!({"description": "taken"}))))
            .unwrap();

        let (_, errors) = check(&editor, mc_payload("taken"), None);
        assert_eq!(errors, vec!["The description must be different from existing questions."]);

        let (_, errors) = check(&editor, mc_payload("taken"), Some(&key));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_mc_editor_sees_string_selections() {
        let (editor, _) = editor(QuestionType::MultipleChoice);
        let dict = editor.transform_for_editor(obj(json!({"multiple_selections": true})));
        assert_eq!(dict["multiple_selections"], "true");
        let dict = editor.transform_for_editor(JsonMap::new());
        assert_eq!(dict["multiple_selections"], "false");
    }

    #[test]
    fn test_sa_rows_and_columns() {
        let (editor, _) = editor(QuestionType::ShortAnswer);
        let base = |rows: Value, columns: Value| {
            json!({
                "version": "1.5",
                "description": "capital",
                "question": "Capital of France?",
                "rows": rows,
                "columns": columns,
                "graders": [{"score": "1.0", "matcher": "case_insensitive", "response": "Paris"}],
            })
        };

        let (dict, errors) = check(&editor, base(json!("3"), json!(" 40 ")), None);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!((dict["rows"].clone(), dict["columns"].clone()), (json!(3), json!(40)));

        let (_, errors) = check(&editor, base(json!("0"), json!("wide")), None);
        assert_eq!(
            errors,
            vec!["Rows must be a positive whole number", "Columns must be a whole number"]
        );
    }

    #[test]
    fn test_sa_missing_size_uses_defaults() {
        let (editor, _) = editor(QuestionType::ShortAnswer);
        let mut payload = editor.default_content();
        payload.insert("description".into(), json!("d"));
        payload.insert("question".into(), json!("q"));
        payload["graders"][0]["response"] = json!("a");
        let (dict, errors) = check(&editor, Value::Object(payload), None);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(dict["rows"], DEFAULT_HEIGHT_ROWS);
        assert_eq!(dict["columns"], DEFAULT_WIDTH_COLUMNS);
    }

    #[test]
    fn test_sa_graders() {
        let (editor, _) = editor(QuestionType::ShortAnswer);
        let (_, errors) = check(
            &editor,
            json!({
                "version": "1.5",
                "description": "d",
                "question": "q",
                "graders": [
                    {"score": "x", "matcher": "fuzzy", "response": ""},
                ],
            }),
            None,
        );
        assert_eq!(
            errors,
            vec![
                "Answer 1 has an unknown matcher: fuzzy",
                "Answer 1 has no response text.",
                "Answer 1 must have a numeric score.",
            ]
        );

        let (_, errors) = check(
            &editor,
            json!({"version": "1.5", "description": "d", "question": "q", "graders": []}),
            None,
        );
        assert_eq!(errors, vec!["The question must have at least one answer."]);
    }

    #[test]
    fn test_pre_save_stamps_type() {
        let (editor, _) = editor(QuestionType::ShortAnswer);
        let mut item = Item::default();
        editor.pre_save(&mut item);
        assert_eq!(item.dict["type"], SHORT_ANSWER);
    }

    #[test]
    fn test_deletion_blocked_by_groups() {
        let (editor, db) = editor(QuestionType::MultipleChoice);
        let groups = EntityDao::new(db, QUESTION_GROUP_KIND);
        for name in ["zeta", "alpha"] {
            groups
                .save(&Item::new(
                    None,
                    obj(json!({"description": name, "items": [{"question": "q1", "weight": 1.0}]})),
                ))
                .unwrap();
        }
        groups
            .save(&Item::new(None, obj(json!({"description": "other", "items": []}))))
            .unwrap();

        let check = editor
            .deletion_check(&Item::new(Some("q1".into()), JsonMap::new()))
            .unwrap();
        assert_eq!(
            check,
            DeletionCheck::Denied {
                status: 403,
                message: "Question in use by question groups:\n\"alpha\",\n\"zeta\".\n\
                          Please delete it from those groups and try again."
                    .to_string(),
            }
        );

        let check = editor
            .deletion_check(&Item::new(Some("q2".into()), JsonMap::new()))
            .unwrap();
        assert_eq!(check, DeletionCheck::Allowed);
    }
}
