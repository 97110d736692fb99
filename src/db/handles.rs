//! Database name to storage handle mapping

use std::collections::HashMap;
use std::sync::Arc;

use super::driver::StorageHandle;

/// Storage handles held by a factory, at most one per database name.
///
/// The table carries no lock of its own; the factory keeps it behind its
/// mutex so lookups, inserts and the shutdown drain are serialized.
#[derive(Default)]
pub struct HandleTable {
    handles: HashMap<String, Arc<dyn StorageHandle>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StorageHandle>> {
        self.handles.get(name).cloned()
    }

    /// Store a handle for `name`, returning the one it replaced
    pub fn insert(
        &mut self,
        name: &str,
        handle: Arc<dyn StorageHandle>,
    ) -> Option<Arc<dyn StorageHandle>> {
        self.handles.insert(name.to_string(), handle)
    }

    /// Remove every handle and hand them back for teardown
    pub fn drain(&mut self) -> Vec<Arc<dyn StorageHandle>> {
        self.handles.drain().map(|(_, handle)| handle).collect()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
