//! Data access for editor items.

use courseware_common::{Database, Item, Result};
use tracing::debug;
use uuid::Uuid;

/// Load/save/delete items of one kind by key.
pub trait Dao: Send + Sync {
    /// Storage kind the items live under.
    fn kind(&self) -> &str;

    fn load(&self, key: &str) -> Result<Option<Item>>;

    /// Persist `item`, assigning a fresh key when it has none. Returns the
    /// key the item was stored under.
    fn save(&self, item: &Item) -> Result<String>;

    /// Remove the item. Returns whether anything was deleted.
    fn delete(&self, key: &str) -> Result<bool>;

    /// All items, oldest first.
    fn list(&self) -> Result<Vec<Item>>;
}

/// DAO backed by the shared `entities` table.
#[derive(Clone)]
pub struct EntityDao {
    db: Database,
    kind: String,
}

impl EntityDao {
    pub fn new(db: Database, kind: &str) -> Self {
        Self {
            db,
            kind: kind.to_string(),
        }
    }
}

impl Dao for EntityDao {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn load(&self, key: &str) -> Result<Option<Item>> {
        Ok(self
            .db
            .get_entity(&self.kind, key)?
            .map(|row| Item::new(Some(row.id), row.data)))
    }

    fn save(&self, item: &Item) -> Result<String> {
        let key = match item.id.as_deref() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        self.db.put_entity(&self.kind, &key, &item.dict)?;
        debug!("Saved {} {}", self.kind, key);
        Ok(key)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.db.delete_entity(&self.kind, key)
    }

    fn list(&self) -> Result<Vec<Item>> {
        Ok(self
            .db
            .list_entities(&self.kind)?
            .into_iter()
            .map(|row| Item::new(Some(row.id), row.data))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courseware_common::JsonMap;
    use serde_json::json;

    fn dict(title: &str) -> JsonMap {
        json!({"title": title, "version": "1.0"})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_save_assigns_key() {
        let dao = EntityDao::new(Database::open_memory().unwrap(), "announcement");
        let key = dao.save(&Item::new(None, dict("a"))).unwrap();
        assert!(!key.is_empty());

        let loaded = dao.load(&key).unwrap().unwrap();
        assert_eq!(loaded.id.as_deref(), Some(key.as_str()));
        assert_eq!(loaded.get_str("title"), Some("a"));
    }

    #[test]
    fn test_save_with_key_overwrites() {
        let dao = EntityDao::new(Database::open_memory().unwrap(), "announcement");
        let key = dao.save(&Item::new(None, dict("a"))).unwrap();
        let again = dao.save(&Item::new(Some(key.clone()), dict("b"))).unwrap();
        assert_eq!(key, again);
        assert_eq!(dao.list().unwrap().len(), 1);
        assert_eq!(dao.load(&key).unwrap().unwrap().get_str("title"), Some("b"));
    }

    #[test]
    fn test_delete_missing_is_false() {
        let dao = EntityDao::new(Database::open_memory().unwrap(), "announcement");
        assert!(!dao.delete("nope").unwrap());
        assert!(dao.load("nope").unwrap().is_none());
    }
}
