//! Generic keyed state cache: one projection of upstream objects per key, behind one lock.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::RwLock;

use fleet_core::{Entry, Object, OnChange, Store, StoreError, StoreResult};
use metrics::counter;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::util::{read, write};

/// Outcome of projecting one object.
#[derive(Debug, Clone, PartialEq)]
pub enum Projected<V> {
    /// Store `V` under the key.
    Set(String, V),
    /// The key has no data anymore; drop any entry.
    Clear(String),
    /// Object fails the cache's validity predicate; ignore it.
    Skip,
}

/// Per-cache extraction rules. Implementations are zero-sized markers.
pub trait Projection: Send + Sync + 'static {
    type Value: Clone + PartialEq + Debug + Send + Sync;

    /// Expected `kind` of incoming objects.
    const KIND: &'static str;

    /// Key an object would be stored under, or `None` when the cache ignores it.
    fn key(obj: &Object) -> Option<String>;

    fn project(obj: &Object) -> StoreResult<Projected<Self::Value>>;

    fn entry(value: &Self::Value) -> Entry;
}

pub struct KeyedCache<P: Projection> {
    map: RwLock<FxHashMap<String, P::Value>>,
    callbacks: RwLock<Vec<OnChange>>,
    _projection: PhantomData<fn() -> P>,
}

impl<P: Projection> Default for KeyedCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Projection> KeyedCache<P> {
    pub fn new() -> Self {
        Self { map: RwLock::new(FxHashMap::default()), callbacks: RwLock::new(Vec::new()), _projection: PhantomData }
    }

    /// Register a change callback. Append-only; invoked in registration order.
    pub fn on_change(&self, f: OnChange) {
        write(&self.callbacks).push(f);
    }

    pub fn value(&self, key: &str) -> Option<P::Value> {
        read(&self.map).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        read(&self.map).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry, sorted by key.
    pub fn snapshot(&self) -> Vec<(String, P::Value)> {
        let mut out: Vec<_> = read(&self.map).iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        out.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn notify(&self, key: &str) {
        // Callbacks run without any cache lock held so they may read this cache or others.
        let callbacks = read(&self.callbacks).clone();
        for cb in callbacks.iter() {
            if let Err(e) = cb(key) {
                counter!("fleet_callback_errors_total", 1, "kind" => P::KIND);
                warn!(kind = P::KIND, key, error = %e, "change callback failed");
            }
        }
    }
}

impl<P: Projection> Store for KeyedCache<P> {
    fn add(&self, obj: &Object) -> StoreResult<()> {
        obj.expect_kind(P::KIND)?;
        let (key, value) = match P::project(obj)? {
            Projected::Skip => {
                trace!(kind = P::KIND, name = ?obj.name(), "ignoring object");
                return Ok(());
            }
            Projected::Clear(key) => {
                if write(&self.map).remove(&key).is_some() {
                    debug!(kind = P::KIND, key = %key, "entry cleared");
                }
                return Ok(());
            }
            Projected::Set(key, value) => (key, value),
        };
        let changed = {
            let mut map = write(&self.map);
            match map.get_mut(&key) {
                Some(cur) if *cur == value => false,
                Some(cur) => {
                    *cur = value;
                    true
                }
                None => {
                    map.insert(key.clone(), value);
                    true
                }
            }
        };
        if changed {
            self.notify(&key);
        }
        Ok(())
    }

    fn delete(&self, obj: &Object) -> StoreResult<()> {
        obj.expect_kind(P::KIND)?;
        if let Some(key) = P::key(obj) {
            write(&self.map).remove(&key);
        }
        Ok(())
    }

    fn get(&self, obj: &Object) -> StoreResult<Option<Entry>> {
        obj.expect_kind(P::KIND)?;
        match P::key(obj) {
            Some(key) => self.get_by_key(&key),
            None => Ok(None),
        }
    }

    fn get_by_key(&self, key: &str) -> StoreResult<Option<Entry>> {
        Ok(read(&self.map).get(key).map(P::entry))
    }

    fn list(&self) -> Vec<Entry> {
        read(&self.map).values().map(P::entry).collect()
    }

    fn list_keys(&self) -> Vec<String> {
        read(&self.map).keys().cloned().collect()
    }

    fn replace(&self, list: &[Object], resource_version: &str) -> StoreResult<()> {
        // Extraction happens before taking the lock. Errors are reported together once the swap
        // is done.
        let mut next = FxHashMap::default();
        let mut errs = Vec::new();
        let mut failed = Vec::new();
        for obj in list {
            let projected = obj.expect_kind(P::KIND).and_then(|_| P::project(obj));
            match projected {
                Ok(Projected::Set(key, value)) => {
                    next.insert(key, value);
                }
                Ok(Projected::Clear(_)) | Ok(Projected::Skip) => {}
                Err(e) => {
                    failed.extend(P::key(obj));
                    errs.push(e);
                }
            }
        }
        let mut map = write(&self.map);
        // A key whose object failed keeps its prior value, as it would after a failed add.
        for key in failed {
            if let Some(prior) = map.remove(&key) {
                next.entry(key).or_insert(prior);
            }
        }
        let count = next.len();
        *map = next;
        drop(map);
        debug!(kind = P::KIND, count, failed = errs.len(), rv = resource_version, "cache replaced");
        match StoreError::aggregate(errs) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
