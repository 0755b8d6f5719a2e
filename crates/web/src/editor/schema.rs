//! Schema objects for editors.
//!
//! A [`FieldRegistry`] describes one editable item. It renders two views:
//! a JSON schema used to convert and type-check incoming payloads, and a
//! list of display annotations used by the form front end.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use courseware_common::JsonMap;
use serde_json::{json, Number, Value};

/// Every type a schema field may declare.
pub const JSON_TYPES: &[&str] = &[
    "string",
    "date",
    "datetime",
    "text",
    "html",
    "boolean",
    "integer",
    "number",
    "array",
    "object",
    "timestamp",
];

/// Canonical output format for `date` fields.
pub const ISO_8601_DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical output format for `datetime` fields.
pub const ISO_8601_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

const DATE_FORMATS: &[&str] = &[ISO_8601_DATE_FORMAT, "%Y/%m/%d"];

/// A scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub label: String,
    pub field_type: String,
    pub optional: bool,
    pub hidden: bool,
    pub editable: bool,
    pub description: Option<String>,
    /// `(value, label)` choices for select/radio widgets.
    pub select_data: Vec<(Value, String)>,
    pub extra_schema_dict_values: JsonMap,
}

impl SchemaField {
    pub fn new(name: &str, label: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            field_type: field_type.to_string(),
            optional: false,
            hidden: false,
            editable: true,
            description: None,
            select_data: Vec::new(),
            extra_schema_dict_values: JsonMap::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_select_data<V: Into<Value>>(mut self, choices: Vec<(V, &str)>) -> Self {
        self.select_data = choices
            .into_iter()
            .map(|(v, l)| (v.into(), l.to_string()))
            .collect();
        self
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra_schema_dict_values
            .insert(key.to_string(), value.into());
        self
    }

    fn json_schema(&self) -> Value {
        let mut schema = JsonMap::new();
        schema.insert("type".into(), json!(self.field_type));
        schema.insert("optional".into(), json!(self.optional));
        if let Some(description) = &self.description {
            schema.insert("description".into(), json!(description));
        }
        Value::Object(schema)
    }

    fn annotations(&self) -> JsonMap {
        let mut ann = JsonMap::new();
        ann.insert("label".into(), json!(self.label));
        let widget = if self.hidden {
            "hidden"
        } else if !self.select_data.is_empty() {
            "select"
        } else {
            self.field_type.as_str()
        };
        ann.insert("_type".into(), json!(widget));
        if !self.editable {
            ann.insert("uneditable".into(), json!(true));
        }
        if let Some(description) = &self.description {
            ann.insert("description".into(), json!(description));
        }
        if !self.select_data.is_empty() {
            let choices: Vec<Value> = self
                .select_data
                .iter()
                .map(|(value, label)| json!({"value": value, "label": label}))
                .collect();
            ann.insert("choices".into(), Value::Array(choices));
        }
        for (k, v) in &self.extra_schema_dict_values {
            ann.insert(k.clone(), v.clone());
        }
        ann
    }
}

/// Element type of a [`FieldArray`].
#[derive(Debug, Clone, PartialEq)]
pub enum ItemType {
    Field(SchemaField),
    Registry(FieldRegistry),
}

impl From<SchemaField> for ItemType {
    fn from(field: SchemaField) -> Self {
        ItemType::Field(field)
    }
}

impl From<FieldRegistry> for ItemType {
    fn from(registry: FieldRegistry) -> Self {
        ItemType::Registry(registry)
    }
}

/// A list-valued field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldArray {
    pub name: String,
    pub label: String,
    pub item_type: Box<ItemType>,
    pub optional: bool,
    pub description: Option<String>,
    pub extra_schema_dict_values: JsonMap,
}

impl FieldArray {
    pub fn new(name: &str, label: &str, item_type: impl Into<ItemType>) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            item_type: Box::new(item_type.into()),
            optional: false,
            description: None,
            extra_schema_dict_values: JsonMap::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra_schema_dict_values
            .insert(key.to_string(), value.into());
        self
    }

    fn json_schema(&self) -> Value {
        let items = match self.item_type.as_ref() {
            ItemType::Field(field) => field.json_schema(),
            ItemType::Registry(registry) => registry.json_schema(),
        };
        let mut schema = JsonMap::new();
        schema.insert("type".into(), json!("array"));
        schema.insert("optional".into(), json!(self.optional));
        schema.insert("items".into(), items);
        if let Some(description) = &self.description {
            schema.insert("description".into(), json!(description));
        }
        Value::Object(schema)
    }
}

/// One entry of a registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Field(SchemaField),
    Array(FieldArray),
    /// Nested object stored under `name`.
    Object { name: String, registry: FieldRegistry },
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::Field(f) => &f.name,
            Property::Array(a) => &a.name,
            Property::Object { name, .. } => name,
        }
    }
}

impl From<SchemaField> for Property {
    fn from(field: SchemaField) -> Self {
        Property::Field(field)
    }
}

impl From<FieldArray> for Property {
    fn from(array: FieldArray) -> Self {
        Property::Array(array)
    }
}

/// An ordered set of properties describing an object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldRegistry {
    pub title: String,
    pub description: Option<String>,
    pub extra_schema_dict_values: JsonMap,
    properties: Vec<Property>,
}

impl FieldRegistry {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra_schema_dict_values
            .insert(key.to_string(), value.into());
        self
    }

    /// Add a property, replacing any existing one with the same name.
    pub fn add_property(&mut self, property: impl Into<Property>) {
        let property = property.into();
        match self
            .properties
            .iter_mut()
            .find(|p| p.name() == property.name())
        {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    pub fn add_sub_registry(&mut self, name: &str, registry: FieldRegistry) {
        self.add_property(Property::Object {
            name: name.to_string(),
            registry,
        });
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name() == name)
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// The JSON schema used to convert payloads.
    pub fn json_schema(&self) -> Value {
        let mut properties = JsonMap::new();
        for property in &self.properties {
            let schema = match property {
                Property::Field(field) => field.json_schema(),
                Property::Array(array) => array.json_schema(),
                Property::Object { registry, .. } => registry.json_schema(),
            };
            properties.insert(property.name().to_string(), schema);
        }

        let mut schema = JsonMap::new();
        schema.insert("id".into(), json!(self.title));
        schema.insert("type".into(), json!("object"));
        if let Some(description) = &self.description {
            schema.insert("description".into(), json!(description));
        }
        schema.insert("properties".into(), Value::Object(properties));
        Value::Object(schema)
    }

    /// Display annotations as `[path, annotations]` pairs.
    pub fn schema_dict(&self) -> Value {
        let mut entries = Vec::new();
        self.collect_annotations(&[], &mut entries);
        Value::Array(
            entries
                .into_iter()
                .map(|(path, ann)| json!([path, ann]))
                .collect(),
        )
    }

    fn collect_annotations(&self, prefix: &[String], out: &mut Vec<(Vec<String>, JsonMap)>) {
        let mut root = JsonMap::new();
        root.insert("title".into(), json!(self.title));
        if let Some(description) = &self.description {
            root.insert("description".into(), json!(description));
        }
        for (k, v) in &self.extra_schema_dict_values {
            root.insert(k.clone(), v.clone());
        }
        out.push((prefix.to_vec(), root));

        for property in &self.properties {
            let mut path = prefix.to_vec();
            path.push("properties".to_string());
            path.push(property.name().to_string());
            match property {
                Property::Field(field) => {
                    out.push((with_leaf(&path, "_inputex"), field.annotations()));
                }
                Property::Array(array) => {
                    let mut ann = JsonMap::new();
                    ann.insert("label".into(), json!(array.label));
                    if let Some(description) = &array.description {
                        ann.insert("description".into(), json!(description));
                    }
                    for (k, v) in &array.extra_schema_dict_values {
                        ann.insert(k.clone(), v.clone());
                    }
                    out.push((with_leaf(&path, "_inputex"), ann));

                    let items_path = with_leaf(&path, "items");
                    match array.item_type.as_ref() {
                        ItemType::Field(field) => {
                            out.push((with_leaf(&items_path, "_inputex"), field.annotations()));
                        }
                        ItemType::Registry(registry) => {
                            registry.collect_annotations(&items_path, out);
                        }
                    }
                }
                Property::Object { registry, .. } => registry.collect_annotations(&path, out),
            }
        }
    }
}

fn with_leaf(path: &[String], leaf: &str) -> Vec<String> {
    let mut path = path.to_vec();
    path.push(leaf.to_string());
    path
}

// ============================================================================
// Payload conversion
// ============================================================================

/// Convert a decoded JSON payload into the stored representation described
/// by `schema` (a [`FieldRegistry::json_schema`] value).
///
/// Keys absent from the schema are dropped. Every problem found is pushed
/// onto `errors`; the returned map holds whatever converted cleanly.
pub fn json_to_dict(source: &JsonMap, schema: &Value, errors: &mut Vec<String>) -> JsonMap {
    let mut output = JsonMap::new();
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return output;
    };

    for (key, attr) in properties {
        let Some(value) = source.get(key) else {
            let optional = match attr.get("optional") {
                Some(flag) => match convert_bool(flag, "optional") {
                    Ok(optional) => optional,
                    Err(e) => {
                        errors.push(e);
                        continue;
                    }
                },
                None => false,
            };
            if !optional {
                errors.push(format!("Missing required attribute: {}", key));
            }
            continue;
        };

        if let Some(converted) = convert_value(key, value, attr, errors) {
            output.insert(key.clone(), converted);
        }
    }
    output
}

fn convert_value(key: &str, value: &Value, attr: &Value, errors: &mut Vec<String>) -> Option<Value> {
    let attr_type = attr.get("type").and_then(Value::as_str).unwrap_or("");
    if !JSON_TYPES.contains(&attr_type) {
        errors.push(format!("Unsupported JSON type: {}", attr_type));
        return None;
    }

    let result = match attr_type {
        "object" => match value.as_object() {
            Some(map) => Ok(Value::Object(json_to_dict(map, attr, errors))),
            None => Err(format!("Bad object value for {}: {}", key, describe(value))),
        },
        "date" => convert_date(value, key).map(Value::String),
        "datetime" => convert_datetime(value, key).map(Value::String),
        "number" => convert_number(value, key).map(Value::Number),
        "integer" | "timestamp" => convert_integer(value, key).map(Value::from),
        "boolean" => convert_bool(value, key).map(Value::Bool),
        "array" => match value.as_array() {
            Some(elements) => {
                let items = attr.get("items").cloned().unwrap_or(Value::Null);
                Ok(Value::Array(
                    elements
                        .iter()
                        .filter_map(|element| convert_value(key, element, &items, errors))
                        .collect(),
                ))
            }
            None => Err(format!("Bad array value for {}: {}", key, describe(value))),
        },
        _ => Ok(value.clone()),
    };

    match result {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Booleans accept JSON bools and the strings `true`/`false` in any case.
/// Null reads as false.
pub fn convert_bool(value: &Value, key: &str) -> Result<bool, String> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        Value::String(s) => Err(format!("Bad boolean value for {}: {}", key, s.to_lowercase())),
        other => Err(format!("Bad boolean value for {}: {}", key, other)),
    }
}

fn convert_number(value: &Value, key: &str) -> Result<Number, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed
        .and_then(Number::from_f64)
        .ok_or_else(|| format!("Bad number value for {}: {}", key, describe(value)))
}

fn convert_integer(value: &Value, key: &str) -> Result<i64, String> {
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(truncate_to_i64))
            .ok_or_else(|| format!("Bad integer value for {}: {}", key, n)),
        Value::String(s) if s.is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("Bad integer value for {}: {}", key, s)),
        other => Err(format!("Bad integer value for {}: {}", key, other)),
    }
}

/// Truncate toward zero; `None` unless the result fits an `i64`.
fn truncate_to_i64(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; i64::MAX is not.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let truncated = f.trunc();
    (truncated.is_finite() && (-LIMIT..LIMIT).contains(&truncated)).then_some(truncated as i64)
}

fn convert_date(value: &Value, key: &str) -> Result<String, String> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("Bad date value for {}: {}", key, describe(value)))?;
    parse_date(text)
        .map(|d| d.format(ISO_8601_DATE_FORMAT).to_string())
        .ok_or_else(|| format!("Bad date value for {}: {}", key, text))
}

fn convert_datetime(value: &Value, key: &str) -> Result<String, String> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("Bad datetime value for {}: {}", key, describe(value)))?;
    parse_datetime(text)
        .map(|dt| dt.format(ISO_8601_DATETIME_FORMAT).to_string())
        .ok_or_else(|| format!("Bad datetime value for {}: {}", key, text))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Accepts `<date>[T ]<HH:MM[:SS]>[(.|,)fraction][Z]` with either date
/// layout from [`DATE_FORMATS`]. A missing `Z` means local time and is
/// treated the same as UTC.
fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.strip_suffix('Z').unwrap_or(text);
    let (main, fraction) = match text.rfind(|c| c == '.' || c == ',') {
        Some(idx) => (&text[..idx], Some(&text[idx + 1..])),
        None => (text, None),
    };

    let nanos = match fraction {
        Some(digits) => {
            if digits.is_empty() || digits.len() > 9 || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            format!("{:0<9}", digits).parse::<u32>().ok()?
        }
        None => 0,
    };

    let parsed = DATE_FORMATS.iter().find_map(|date| {
        ["T", " "].iter().find_map(|sep| {
            ["%H:%M:%S", "%H:%M"].iter().find_map(|time| {
                let format = format!("{}{}{}", date, sep, time);
                NaiveDateTime::parse_from_str(main, &format).ok()
            })
        })
    })?;

    parsed.with_nanosecond(nanos)
}
