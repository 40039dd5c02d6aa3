//! Fleet kubehub: drives fleet stores from kube list+watch streams.

#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use fleet_core::{Object, Store, StoreResult};
use futures::TryStreamExt;
use kube::{
    api::Api,
    core::{ApiResource, DynamicObject, GroupVersionKind},
    discovery::{Discovery, Scope},
    runtime::{
        watcher::{self, Event},
        WatchStreamExt,
    },
    Client,
};
use metrics::counter;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub async fn client() -> Result<Client> {
    Client::try_default().await.context("building kube client from default config")
}

pub fn parse_gvk_key(key: &str) -> Result<GroupVersionKind> {
    let parts: Vec<_> = key.split('/').collect();
    match parts.as_slice() {
        [version, kind] => Ok(GroupVersionKind { group: String::new(), version: version.to_string(), kind: kind.to_string() }),
        [group, version, kind] => Ok(GroupVersionKind { group: (*group).to_string(), version: (*version).to_string(), kind: (*kind).to_string() }),
        _ => Err(anyhow!("invalid gvk key: {} (expect v1/Kind or group/v1/Kind)", key)),
    }
}

async fn find_api_resource(client: Client, gvk: &GroupVersionKind) -> Result<(ApiResource, bool)> {
    let discovery = Discovery::new(client).run().await?;
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            if ar.group == gvk.group && ar.version == gvk.version && ar.kind == gvk.kind {
                let namespaced = matches!(caps.scope, Scope::Namespaced);
                return Ok((ar.clone(), namespaced));
            }
        }
    }
    Err(anyhow!("GVK not found: {}/{}/{}", gvk.group, gvk.version, gvk.kind))
}

fn strip_managed_fields(v: &mut serde_json::Value) {
    if let Some(meta) = v.get_mut("metadata") {
        if let Some(obj) = meta.as_object_mut() {
            obj.remove("managedFields");
        }
    }
}

/// Serialize a watched object into the store's object model. List items often come without
/// `kind`, so it is filled in from the watched resource.
pub fn to_object(obj: &DynamicObject, kind: &str) -> Result<Object> {
    let mut raw = serde_json::to_value(obj).context("serializing DynamicObject")?;
    strip_managed_fields(&mut raw);
    if let Some(map) = raw.as_object_mut() {
        map.entry("kind").or_insert_with(|| serde_json::Value::String(kind.to_string()));
    }
    Ok(Object::new(raw))
}

fn convert(ev: Event<DynamicObject>, kind: &str) -> Result<Event<Object>> {
    Ok(match ev {
        Event::Applied(o) => Event::Applied(to_object(&o, kind)?),
        Event::Deleted(o) => Event::Deleted(to_object(&o, kind)?),
        Event::Restarted(list) => Event::Restarted(list.iter().map(|o| to_object(o, kind)).collect::<Result<_>>()?),
    })
}

/// Translates watch events into Store contract calls for one kind.
///
/// `Applied` becomes `add` the first time a key is seen and `update` afterwards. Store errors are
/// logged and counted; they never stop the reflector.
pub struct Reflector {
    gvk: String,
    store: Arc<dyn Store>,
    seen: HashSet<String>,
}

fn object_key(obj: &Object) -> Option<String> {
    obj.uid().map(str::to_string).or_else(|| {
        let name = obj.name()?;
        Some(match obj.namespace() {
            Some(ns) => format!("{ns}/{name}"),
            None => name.to_string(),
        })
    })
}

impl Reflector {
    pub fn new(gvk: impl Into<String>, store: Arc<dyn Store>) -> Self {
        Self { gvk: gvk.into(), store, seen: HashSet::new() }
    }

    fn record(&self, op: &'static str, res: StoreResult<()>) {
        counter!("fleet_events_total", 1, "gvk" => self.gvk.clone(), "op" => op);
        if let Err(e) = res {
            counter!("fleet_store_errors_total", 1, "gvk" => self.gvk.clone(), "op" => op);
            warn!(gvk = %self.gvk, op, error = %e, "store rejected event");
        }
    }

    pub fn handle(&mut self, ev: Event<Object>) {
        match ev {
            Event::Applied(o) => {
                let key = object_key(&o);
                let known = key.as_ref().map(|k| self.seen.contains(k)).unwrap_or(false);
                if known {
                    self.record("update", self.store.update(&o));
                } else {
                    self.record("add", self.store.add(&o));
                    if let Some(k) = key {
                        self.seen.insert(k);
                    }
                }
            }
            Event::Deleted(o) => {
                if let Some(k) = object_key(&o) {
                    self.seen.remove(&k);
                }
                self.record("delete", self.store.delete(&o));
            }
            Event::Restarted(list) => {
                debug!(gvk = %self.gvk, count = list.len(), "watch restart; replacing");
                self.seen = list.iter().filter_map(object_key).collect();
                self.record("replace", self.store.replace(&list, ""));
            }
        }
    }

    pub fn resync(&self) {
        self.record("resync", self.store.resync());
    }
}

#[derive(Debug, Clone)]
pub struct ReflectorConfig {
    /// Restrict namespaced kinds to one namespace.
    pub namespace: Option<String>,
    pub resync: Duration,
}

/// List+watch `gvk_key` and feed `store` until `shutdown` flips or its sender is dropped.
pub async fn run_reflector(
    client: Client,
    gvk_key: &str,
    store: Arc<dyn Store>,
    cfg: ReflectorConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let gvk = parse_gvk_key(gvk_key)?;
    let (ar, namespaced) = find_api_resource(client.clone(), &gvk).await?;
    let api: Api<DynamicObject> = match (namespaced, cfg.namespace.as_deref()) {
        (true, Some(ns)) => Api::namespaced_with(client, ns, &ar),
        _ => Api::all_with(client, &ar),
    };

    let stream = watcher::watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);
    let mut reflector = Reflector::new(gvk_key, store);
    let mut ticker = tokio::time::interval(cfg.resync);
    ticker.tick().await;
    info!(gvk = %gvk_key, ns = ?cfg.namespace, "reflector started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!(gvk = %gvk_key, "reflector stopping");
                break;
            }
            _ = ticker.tick() => reflector.resync(),
            next = stream.try_next() => match next {
                Ok(Some(ev)) => match convert(ev, &ar.kind) {
                    Ok(ev) => reflector.handle(ev),
                    Err(e) => warn!(gvk = %gvk_key, error = ?e, "dropping unconvertible event"),
                },
                Ok(None) => {
                    warn!(gvk = %gvk_key, "watch stream ended");
                    break;
                }
                Err(e) => warn!(gvk = %gvk_key, error = %e, "watch error; retrying"),
            },
        }
    }
    Ok(())
}
