//! Core types shared by the editor service and its storage

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON object, the unit every editor reads and writes.
pub type JsonMap = serde_json::Map<String, Value>;

/// Name of the attribute holding an item's schema version.
pub const VERSION_FIELD: &str = "version";

/// Name of the attribute injected with the item key when an item is shown
/// to an editor.
pub const ID_FIELD: &str = "id";

/// A persisted, versioned attribute bundle (the editor's DTO).
///
/// `id` is `None` until the item has been saved for the first time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Item {
    pub id: Option<String>,
    pub dict: JsonMap,
}

impl Item {
    pub fn new(id: Option<String>, dict: JsonMap) -> Self {
        Self { id, dict }
    }

    /// The declared schema version, if any.
    pub fn version(&self) -> Option<&Value> {
        self.dict.get(VERSION_FIELD)
    }

    /// Read a string attribute.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.dict.get(name).and_then(Value::as_str)
    }
}

/// Render a version value the way users typed it: strings without quotes,
/// everything else as JSON.
pub fn display_version(version: Option<&Value>) -> String {
    match version {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "None".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_lookup() {
        let mut dict = JsonMap::new();
        dict.insert("version".to_string(), json!("1.5"));
        let item = Item::new(None, dict);
        assert_eq!(item.version(), Some(&json!("1.5")));
        assert_eq!(item.get_str("version"), Some("1.5"));
    }

    #[test]
    fn test_display_version() {
        assert_eq!(display_version(Some(&json!("1.5"))), "1.5");
        assert_eq!(display_version(Some(&json!(2))), "2");
        assert_eq!(display_version(None), "None");
    }
}
