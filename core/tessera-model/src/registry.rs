//! Type tag → container factory registry.

use crate::{JsonObject, Object};
use std::collections::HashMap;

type Factory = Box<dyn Fn() -> Box<dyn Object> + Send + Sync>;

/// Maps type tags to factories that yield empty containers.
///
/// Deserialization is driven by the tag: a loader probes a record's `t`
/// field, asks the registry for a container, then hydrates it. Unknown tags
/// yield `None`; callers skip those records.
#[derive(Default)]
pub struct ObjectRegistry {
    factories: HashMap<String, Factory>,
}

impl ObjectRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for `type_key`, replacing any previous one.
    pub fn register<F>(&mut self, type_key: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Object> + Send + Sync + 'static,
    {
        self.factories.insert(type_key.into(), Box::new(factory));
    }

    /// Registers the generic [`JsonObject`] container for `type_key`.
    pub fn register_json(&mut self, type_key: impl Into<String>) {
        let type_key = type_key.into();
        let tag = type_key.clone();
        self.register(type_key, move || {
            Box::new(JsonObject::empty(tag.clone())) as Box<dyn Object>
        });
    }

    /// Yields an empty container for `type_key`, or `None` for unknown tags.
    #[must_use]
    pub fn construct(&self, type_key: &str) -> Option<Box<dyn Object>> {
        self.factories.get(type_key).map(|f| f())
    }

    /// True if a factory is registered for `type_key`.
    #[must_use]
    pub fn contains(&self, type_key: &str) -> bool {
        self.factories.contains_key(type_key)
    }
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
