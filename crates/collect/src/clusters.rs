//! ManagedCluster families.

use std::sync::Arc;

use fleet_core::Object;
use fleet_store::{cluster_id, CountingStore, HibernationCache, MetricsStore, MANAGED_CLUSTER_KIND};

use crate::family::{Family, Sample};

pub const CLUSTER_INFO: Family = Family::gauge("fleet_managed_cluster_info", "Managed cluster information.");
pub const CLUSTER_HIBERNATING: Family =
    Family::gauge("fleet_managed_cluster_hibernating", "Whether the managed cluster is hibernating (1) or not (0).");
pub const CLUSTER_COUNT: Family = Family::gauge("fleet_managed_clusters", "Number of managed clusters.");

fn render_cluster(obj: &Object, hibernation: &HibernationCache) -> Vec<Vec<u8>> {
    let name = obj.name().unwrap_or_default();
    let info = Sample::new(1.0)
        .label("managed_cluster_name", name)
        .label("cluster_id", cluster_id(obj).unwrap_or_default())
        .label("vendor", obj.label("vendor").unwrap_or_default())
        .label("version", obj.label("openshiftVersion").unwrap_or_default());
    let hibernating = Sample::new(if hibernation.is_hibernating(name) { 1.0 } else { 0.0 })
        .label("managed_cluster_name", name);
    vec![CLUSTER_INFO.render(&[info]), CLUSTER_HIBERNATING.render(&[hibernating])]
}

/// Per-cluster info and hibernation families. The hibernation sample reads `hibernation` at render
/// time, so the caller wires a change callback to [`MetricsStore::refresh`].
pub fn cluster_store(hibernation: Arc<HibernationCache>) -> MetricsStore {
    MetricsStore::new(
        MANAGED_CLUSTER_KIND,
        vec![CLUSTER_INFO.header(), CLUSTER_HIBERNATING.header()],
        Arc::new(move |obj: &Object| render_cluster(obj, &hibernation)),
    )
}

pub fn cluster_counter() -> CountingStore {
    CountingStore::new(
        MANAGED_CLUSTER_KIND,
        vec![CLUSTER_COUNT.header()],
        Arc::new(|n| vec![CLUSTER_COUNT.render(&[Sample::new(n as f64)])]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{MetricsWriter, Store};

    fn mc(name: &str) -> Object {
        Object::new(serde_json::json!({
            "kind": "ManagedCluster",
            "metadata": { "name": name, "uid": format!("uid-{name}"), "labels": {
                "vendor": "OpenShift", "clusterID": "abc", "openshiftVersion": "4.16.1"
            } }
        }))
    }

    fn text(w: &dyn MetricsWriter) -> String {
        let mut buf = Vec::new();
        w.write_all(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn cluster_families() {
        let hib = Arc::new(HibernationCache::new());
        let store = cluster_store(hib);
        store.add(&mc("c1")).unwrap();
        let out = text(&store);
        assert!(out.contains(
            "fleet_managed_cluster_info{managed_cluster_name=\"c1\",cluster_id=\"abc\",vendor=\"OpenShift\",version=\"4.16.1\"} 1\n"
        ));
        assert!(out.contains("fleet_managed_cluster_hibernating{managed_cluster_name=\"c1\"} 0\n"));
        assert!(out.starts_with("# HELP fleet_managed_cluster_info"));
    }

    #[test]
    fn counter_family() {
        let counter = cluster_counter();
        counter.add(&mc("a")).unwrap();
        counter.add(&mc("b")).unwrap();
        assert!(text(&counter).ends_with("# TYPE fleet_managed_clusters gauge\nfleet_managed_clusters 2\n"));
    }
}
