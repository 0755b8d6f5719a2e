//! Extension points other modules attach to an editor.
//!
//! Each list runs in registration order.

use super::schema::FieldRegistry;
use courseware_common::{Item, JsonMap};
use std::sync::Arc;

/// Adjusts the schema before it is used or shown.
pub type SchemaHook = Arc<dyn Fn(&mut FieldRegistry) + Send + Sync>;

/// Receives an item and the mapping being built for it.
///
/// On load the mapping is the payload about to be returned to the editor.
/// On save it is the dict that will be persisted.
pub type ItemHook = Arc<dyn Fn(&Item, &mut JsonMap) + Send + Sync>;

#[derive(Clone, Default)]
pub struct EditorHooks {
    pub schema_load: Vec<SchemaHook>,
    pub pre_load: Vec<ItemHook>,
    pub pre_save: Vec<ItemHook>,
}

impl std::fmt::Debug for EditorHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorHooks")
            .field("schema_load", &self.schema_load.len())
            .field("pre_load", &self.pre_load.len())
            .field("pre_save", &self.pre_save.len())
            .finish()
    }
}

impl EditorHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_schema_load(mut self, hook: impl Fn(&mut FieldRegistry) + Send + Sync + 'static) -> Self {
        self.schema_load.push(Arc::new(hook));
        self
    }

    pub fn on_pre_load(mut self, hook: impl Fn(&Item, &mut JsonMap) + Send + Sync + 'static) -> Self {
        self.pre_load.push(Arc::new(hook));
        self
    }

    pub fn on_pre_save(mut self, hook: impl Fn(&Item, &mut JsonMap) + Send + Sync + 'static) -> Self {
        self.pre_save.push(Arc::new(hook));
        self
    }

    pub fn run_schema_load(&self, schema: &mut FieldRegistry) {
        for hook in &self.schema_load {
            hook(schema);
        }
    }

    pub fn run_pre_load(&self, item: &Item, display: &mut JsonMap) {
        for hook in &self.pre_load {
            hook(item, display);
        }
    }

    /// Each hook sees the item as left by the previous one; its edits to
    /// the mapping become the item's dict.
    pub fn run_pre_save(&self, item: &mut Item) {
        for hook in &self.pre_save {
            let mut dict = item.dict.clone();
            hook(item, &mut dict);
            item.dict = dict;
        }
    }
}
