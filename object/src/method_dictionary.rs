use std::collections::HashMap;

use parking_lot::RwLock;

use crate::Value;

/// Selector text → method object, owned by one [`Class`](crate::Class).
///
/// Installation takes the write lock and dispatch only ever reads, so a
/// method installed while another reader is walking the chain is either
/// fully visible or not visible at all.
#[derive(Default)]
pub struct MethodDictionary {
    entries: RwLock<HashMap<String, Value>>,
}

impl MethodDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the method stored under `selector`.
    pub fn set_entry(&self, selector: &str, method: Value) -> Option<Value> {
        self.entries.write().insert(selector.to_owned(), method)
    }

    pub fn get_entry(&self, selector: &str) -> Option<Value> {
        self.entries.read().get(selector).copied()
    }

    pub fn contains(&self, selector: &str) -> bool {
        self.entries.read().contains_key(selector)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Sorted selector names, for listings and diagnostics.
    pub fn selectors(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl core::fmt::Debug for MethodDictionary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.selectors()).finish()
    }
}
