//! Fleet core types: the Store contract, the dynamic object wrapper, and errors.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

mod error;
mod object;

pub use error::StoreError;
pub use object::Object;

pub type StoreResult<T> = Result<T, StoreError>;

/// Change callback: invoked with the key whose observable value changed.
pub type OnChange = Arc<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

/// Projection value read back through [`Store::get`] / [`Store::get_by_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entry {
    Id(String),
    /// Milestone name -> unix seconds.
    Timestamps(BTreeMap<String, f64>),
    Flag(bool),
    /// Membership in a counting store.
    Member,
    Object(Object),
}

/// Uniform write/read contract every cache implements. Event sources program only against this.
///
/// Mutating calls either fully apply or return an error and leave the key untouched.
pub trait Store: Send + Sync {
    fn add(&self, obj: &Object) -> StoreResult<()>;

    /// Defaults to [`Store::add`]; caches have no notion of partial updates.
    fn update(&self, obj: &Object) -> StoreResult<()> {
        self.add(obj)
    }

    fn delete(&self, obj: &Object) -> StoreResult<()>;

    fn get(&self, obj: &Object) -> StoreResult<Option<Entry>>;

    fn get_by_key(&self, key: &str) -> StoreResult<Option<Entry>>;

    fn list(&self) -> Vec<Entry> {
        Vec::new()
    }

    fn list_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Discard prior state and rebuild from `list`, atomically w.r.t. the store's own lock.
    fn replace(&self, list: &[Object], resource_version: &str) -> StoreResult<()>;

    fn resync(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Read side of a store: serialize current state in text exposition format.
pub trait MetricsWriter: Send + Sync {
    fn write_all(&self, w: &mut dyn std::io::Write) -> std::io::Result<()>;
}

pub mod prelude {
    pub use super::{Entry, MetricsWriter, Object, OnChange, Store, StoreError, StoreResult};
}
