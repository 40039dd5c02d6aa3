//! Per-object rendering store: keeps the latest object for each name together with its rendered
//! family blobs. Rendering happens on write; `refresh` re-renders one key when state the render
//! function reads from another cache has changed.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use fleet_core::{Entry, MetricsWriter, Object, Store, StoreError, StoreResult};
use tracing::{debug, trace};

use crate::util::{read, write};

/// Renders one blob per declared family for a single object.
pub type ObjectRenderFn = Arc<dyn Fn(&Object) -> Vec<Vec<u8>> + Send + Sync>;

struct Rendered {
    obj: Object,
    blobs: Vec<Vec<u8>>,
}

pub struct MetricsStore {
    kind: &'static str,
    headers: Vec<String>,
    render: ObjectRenderFn,
    entries: RwLock<BTreeMap<String, Rendered>>,
}

impl MetricsStore {
    pub fn new(kind: &'static str, headers: Vec<String>, render: ObjectRenderFn) -> Self {
        Self { kind, headers, render, entries: RwLock::new(BTreeMap::new()) }
    }

    fn key(&self, obj: &Object) -> StoreResult<String> {
        obj.expect_kind(self.kind)?;
        obj.name().map(str::to_string).ok_or(StoreError::MissingField("metadata.name"))
    }

    fn render(&self, obj: &Object) -> Vec<Vec<u8>> {
        let mut blobs = (self.render)(obj);
        blobs.resize(self.headers.len(), Vec::new());
        blobs
    }

    /// Re-render the stored object for `key`. Unknown keys are a no-op.
    pub fn refresh(&self, key: &str) {
        let mut entries = write(&self.entries);
        if let Some(entry) = entries.get_mut(key) {
            entry.blobs = self.render(&entry.obj);
            trace!(kind = self.kind, key, "re-rendered");
        }
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MetricsStore {
    fn add(&self, obj: &Object) -> StoreResult<()> {
        let key = self.key(obj)?;
        // Render under the lock so a concurrent refresh cannot be overtaken by a stale render.
        let mut entries = write(&self.entries);
        let blobs = self.render(obj);
        entries.insert(key, Rendered { obj: obj.clone(), blobs });
        Ok(())
    }

    fn delete(&self, obj: &Object) -> StoreResult<()> {
        let key = self.key(obj)?;
        write(&self.entries).remove(&key);
        Ok(())
    }

    fn get(&self, obj: &Object) -> StoreResult<Option<Entry>> {
        let key = self.key(obj)?;
        self.get_by_key(&key)
    }

    fn get_by_key(&self, key: &str) -> StoreResult<Option<Entry>> {
        Ok(read(&self.entries).get(key).map(|r| Entry::Object(r.obj.clone())))
    }

    fn list(&self) -> Vec<Entry> {
        read(&self.entries).values().map(|r| Entry::Object(r.obj.clone())).collect()
    }

    fn list_keys(&self) -> Vec<String> {
        read(&self.entries).keys().cloned().collect()
    }

    fn replace(&self, list: &[Object], resource_version: &str) -> StoreResult<()> {
        let mut entries = write(&self.entries);
        let mut next = BTreeMap::new();
        let mut errs = Vec::new();
        for obj in list {
            match self.key(obj) {
                Ok(key) => {
                    next.insert(key, Rendered { obj: obj.clone(), blobs: self.render(obj) });
                }
                Err(e) => {
                    // A failed object leaves its name's prior rendering in place.
                    if let Some(prior) = obj.name().and_then(|name| entries.remove_entry(name)) {
                        next.entry(prior.0).or_insert(prior.1);
                    }
                    errs.push(e);
                }
            }
        }
        let count = next.len();
        *entries = next;
        drop(entries);
        debug!(kind = self.kind, count, rv = resource_version, "metrics store replaced");
        match StoreError::aggregate(errs) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl MetricsWriter for MetricsStore {
    fn write_all(&self, w: &mut dyn std::io::Write) -> std::io::Result<()> {
        let entries = read(&self.entries);
        for (i, header) in self.headers.iter().enumerate() {
            w.write_all(header.as_bytes())?;
            w.write_all(b"\n")?;
            for r in entries.values() {
                w.write_all(&r.blobs[i])?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn mc(name: &str, vendor: &str) -> Object {
        Object::new(serde_json::json!({
            "kind": "ManagedCluster",
            "metadata": { "name": name, "labels": { "vendor": vendor } }
        }))
    }

    fn store(flag: Arc<AtomicBool>) -> MetricsStore {
        let headers = vec!["# TYPE vendor gauge".to_string(), "# TYPE flagged gauge".to_string()];
        MetricsStore::new(
            "ManagedCluster",
            headers,
            Arc::new(move |o: &Object| {
                let name = o.name().unwrap_or_default();
                vec![
                    format!("vendor{{name=\"{name}\",vendor=\"{}\"}} 1\n", o.label("vendor").unwrap_or_default()).into_bytes(),
                    format!("flagged{{name=\"{name}\"}} {}\n", u8::from(flag.load(Ordering::SeqCst))).into_bytes(),
                ]
            }),
        )
    }

    fn output(s: &MetricsStore) -> String {
        let mut buf = Vec::new();
        s.write_all(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn renders_families_grouped_and_sorted() {
        let s = store(Arc::new(AtomicBool::new(false)));
        s.add(&mc("b", "EKS")).unwrap();
        s.add(&mc("a", "OpenShift")).unwrap();
        assert_eq!(
            output(&s),
            "# TYPE vendor gauge\nvendor{name=\"a\",vendor=\"OpenShift\"} 1\nvendor{name=\"b\",vendor=\"EKS\"} 1\n\
             # TYPE flagged gauge\nflagged{name=\"a\"} 0\nflagged{name=\"b\"} 0\n"
        );
        s.delete(&mc("b", "EKS")).unwrap();
        assert_eq!(s.list_keys(), vec!["a"]);
    }

    #[test]
    fn refresh_picks_up_external_state() {
        let flag = Arc::new(AtomicBool::new(false));
        let s = store(flag.clone());
        s.add(&mc("a", "OpenShift")).unwrap();
        flag.store(true, Ordering::SeqCst);
        assert!(output(&s).contains("flagged{name=\"a\"} 0"));
        s.refresh("a");
        s.refresh("unknown");
        assert!(output(&s).contains("flagged{name=\"a\"} 1"));
    }

    #[test]
    fn replace_drops_stale_objects() {
        let s = store(Arc::new(AtomicBool::new(false)));
        s.add(&mc("stale", "EKS")).unwrap();
        s.replace(&[mc("a", "EKS")], "3").unwrap();
        assert_eq!(s.list_keys(), vec!["a"]);
        assert!(!output(&s).contains("stale"));
        assert!(matches!(s.get_by_key("a").unwrap(), Some(Entry::Object(_))));
    }

    #[test]
    fn replace_keeps_prior_rendering_for_rejected_objects() {
        let s = store(Arc::new(AtomicBool::new(false)));
        s.add(&mc("a", "OpenShift")).unwrap();
        s.add(&mc("gone", "EKS")).unwrap();
        let mut wrong_kind = mc("a", "EKS").into_raw();
        wrong_kind["kind"] = serde_json::Value::String("Secret".into());
        let err = s.replace(&[Object::new(wrong_kind), mc("b", "EKS")], "4").unwrap_err();
        assert!(matches!(err, StoreError::UnexpectedKind { .. }));
        assert_eq!(s.list_keys(), vec!["a", "b"]);
        assert!(output(&s).contains("vendor{name=\"a\",vendor=\"OpenShift\"} 1"));
    }
}
