// src/ui/pool.rs

use std::collections::HashMap;

use crate::ui::dialog::{DialogInstance, DialogKey};

/// Inactive dialog instances, at most one per key.
#[derive(Debug, Default)]
pub struct DialogPool {
    entries: HashMap<DialogKey, DialogInstance>,
}

impl DialogPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an instance. If the key is already pooled the new instance is
    /// handed back untouched and the pooled one is kept.
    pub fn insert(&mut self, instance: DialogInstance) -> Option<DialogInstance> {
        if self.entries.contains_key(&instance.key) {
            return Some(instance);
        }
        self.entries.insert(instance.key.clone(), instance);
        None
    }

    pub fn take(&mut self, key: &str) -> Option<DialogInstance> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&DialogInstance> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Pooled keys, sorted.
    pub fn keys(&self) -> Vec<DialogKey> {
        let mut keys: Vec<_> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove and return every instance for which `evict` is true.
    pub fn evict_where(
        &mut self,
        mut evict: impl FnMut(&DialogInstance) -> bool,
    ) -> Vec<DialogInstance> {
        let keys: Vec<DialogKey> = self
            .entries
            .values()
            .filter(|instance| evict(instance))
            .map(|instance| instance.key.clone())
            .collect();

        keys.iter()
            .filter_map(|key| self.entries.remove(key))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
