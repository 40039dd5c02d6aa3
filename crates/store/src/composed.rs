//! Fan-out store: replays every write to each child in order.
//!
//! Not transactional. Each child takes its own lock; a failure in one child does not stop or undo
//! the others, and the caller only gets the combined error.

use std::sync::Arc;

use fleet_core::{Entry, Object, Store, StoreError, StoreResult};

#[derive(Default, Clone)]
pub struct ComposedStore {
    children: Vec<Arc<dyn Store>>,
}

impl ComposedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, store: Arc<dyn Store>) {
        self.children.push(store);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn each(&self, f: impl Fn(&dyn Store) -> StoreResult<()>) -> StoreResult<()> {
        let errs: Vec<_> = self.children.iter().filter_map(|c| f(c.as_ref()).err()).collect();
        match StoreError::aggregate(errs) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Store for ComposedStore {
    fn add(&self, obj: &Object) -> StoreResult<()> {
        self.each(|s| s.add(obj))
    }

    fn update(&self, obj: &Object) -> StoreResult<()> {
        self.each(|s| s.update(obj))
    }

    fn delete(&self, obj: &Object) -> StoreResult<()> {
        self.each(|s| s.delete(obj))
    }

    // Reads are not composable across heterogeneous children; query the child caches directly.
    fn get(&self, _obj: &Object) -> StoreResult<Option<Entry>> {
        Ok(None)
    }

    fn get_by_key(&self, _key: &str) -> StoreResult<Option<Entry>> {
        Ok(None)
    }

    fn replace(&self, list: &[Object], resource_version: &str) -> StoreResult<()> {
        self.each(|s| s.replace(list, resource_version))
    }

    fn resync(&self) -> StoreResult<()> {
        self.each(|s| s.resync())
    }
}
