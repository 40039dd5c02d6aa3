//! Counting store: tracks distinct object uids and re-renders its exposition on every
//! membership change, so scrapes only copy bytes.

use std::sync::{Arc, RwLock};

use fleet_core::{Entry, MetricsWriter, Object, Store, StoreError, StoreResult};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::util::{object_ident, read, write};

/// Renders one blob per declared family from the current member count.
pub type CountRenderFn = Arc<dyn Fn(usize) -> Vec<Vec<u8>> + Send + Sync>;

#[derive(Default)]
struct CountState {
    /// uid -> `namespace/name`, used to match a relisted object that lost its uid.
    seen: FxHashMap<String, Option<String>>,
    rendered: Vec<Vec<u8>>,
}

pub struct CountingStore {
    kind: &'static str,
    headers: Vec<String>,
    render: CountRenderFn,
    state: RwLock<CountState>,
}

impl CountingStore {
    pub fn new(kind: &'static str, headers: Vec<String>, render: CountRenderFn) -> Self {
        Self { kind, headers, render, state: RwLock::new(CountState::default()) }
    }

    pub fn count(&self) -> usize {
        read(&self.state).seen.len()
    }

    fn uid(&self, obj: &Object) -> StoreResult<String> {
        obj.expect_kind(self.kind)?;
        obj.uid().map(str::to_string).ok_or(StoreError::MissingField("metadata.uid"))
    }

    fn rerender(&self, state: &mut CountState) {
        let mut blobs = (self.render)(state.seen.len());
        if blobs.len() != self.headers.len() {
            warn!(kind = self.kind, families = self.headers.len(), rendered = blobs.len(), "render output does not match declared families");
        }
        blobs.resize(self.headers.len(), Vec::new());
        state.rendered = blobs;
    }
}

impl Store for CountingStore {
    fn add(&self, obj: &Object) -> StoreResult<()> {
        let uid = self.uid(obj)?;
        let mut state = write(&self.state);
        if !state.seen.contains_key(&uid) {
            state.seen.insert(uid, object_ident(obj));
            self.rerender(&mut state);
        }
        Ok(())
    }

    fn delete(&self, obj: &Object) -> StoreResult<()> {
        let uid = self.uid(obj)?;
        let mut state = write(&self.state);
        if state.seen.remove(&uid).is_some() {
            self.rerender(&mut state);
        }
        Ok(())
    }

    fn get(&self, obj: &Object) -> StoreResult<Option<Entry>> {
        let uid = self.uid(obj)?;
        self.get_by_key(&uid)
    }

    fn get_by_key(&self, key: &str) -> StoreResult<Option<Entry>> {
        Ok(read(&self.state).seen.contains_key(key).then_some(Entry::Member))
    }

    fn list_keys(&self) -> Vec<String> {
        read(&self.state).seen.keys().cloned().collect()
    }

    fn replace(&self, list: &[Object], resource_version: &str) -> StoreResult<()> {
        let mut errs = Vec::new();
        let mut state = write(&self.state);
        let had_members = !state.seen.is_empty();
        let mut prior = std::mem::take(&mut state.seen);
        let mut carried = Vec::new();
        let mut rendered = false;
        for obj in list {
            match self.uid(obj) {
                Ok(uid) => {
                    if !state.seen.contains_key(&uid) {
                        state.seen.insert(uid, object_ident(obj));
                        self.rerender(&mut state);
                        rendered = true;
                    }
                }
                Err(e) => {
                    // The member this object stood for stays, matched by uid or namespace/name.
                    let uid = obj.uid().map(str::to_string).filter(|u| prior.contains_key(u)).or_else(|| {
                        let ident = object_ident(obj)?;
                        prior.iter().find(|(_, v)| v.as_deref() == Some(ident.as_str())).map(|(k, _)| k.clone())
                    });
                    if let Some(uid) = uid {
                        if let Some(ident) = prior.remove(&uid) {
                            carried.push((uid, ident));
                        }
                    }
                    errs.push(e);
                }
            }
        }
        for (uid, ident) in carried {
            if !state.seen.contains_key(&uid) {
                state.seen.insert(uid, ident);
                self.rerender(&mut state);
                rendered = true;
            }
        }
        // An empty relist must still publish the zero count.
        if had_members && !rendered {
            self.rerender(&mut state);
        }
        debug!(kind = self.kind, count = state.seen.len(), rv = resource_version, "counting store replaced");
        drop(state);
        match StoreError::aggregate(errs) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl MetricsWriter for CountingStore {
    fn write_all(&self, w: &mut dyn std::io::Write) -> std::io::Result<()> {
        let state = read(&self.state);
        for (i, header) in self.headers.iter().enumerate() {
            w.write_all(header.as_bytes())?;
            w.write_all(b"\n")?;
            if let Some(blob) = state.rendered.get(i) {
                w.write_all(blob)?;
            }
        }
        Ok(())
    }
}
