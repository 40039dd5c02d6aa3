//! ManagedCluster name -> cluster identifier.

use fleet_core::{Entry, Object, StoreResult};

use crate::keyed::{KeyedCache, Projected, Projection};

pub const MANAGED_CLUSTER_KIND: &str = "ManagedCluster";

const VENDOR_LABEL: &str = "vendor";
const CLUSTER_ID_LABEL: &str = "clusterID";
const VERSION_LABEL: &str = "openshiftVersion";
const OPENSHIFT: &str = "OpenShift";

/// Identifier for a ManagedCluster: the OpenShift `clusterID` label when the cluster is a
/// modern OpenShift, the object name otherwise. OpenShift 3.x never carried a usable id.
pub fn cluster_id(obj: &Object) -> Option<String> {
    let name = obj.name()?;
    let is_openshift = obj.label(VENDOR_LABEL) == Some(OPENSHIFT);
    let legacy = obj
        .label(VERSION_LABEL)
        .map(|v| v.trim_start_matches('v').split('.').next() == Some("3"))
        .unwrap_or(false);
    match obj.label(CLUSTER_ID_LABEL) {
        Some(id) if is_openshift && !legacy && !id.is_empty() => Some(id.to_string()),
        _ => Some(name.to_string()),
    }
}

pub struct ClusterIdProjection;

impl Projection for ClusterIdProjection {
    type Value = String;
    const KIND: &'static str = MANAGED_CLUSTER_KIND;

    fn key(obj: &Object) -> Option<String> {
        obj.name().map(str::to_string)
    }

    fn project(obj: &Object) -> StoreResult<Projected<String>> {
        Ok(match (Self::key(obj), cluster_id(obj)) {
            (Some(key), Some(id)) => Projected::Set(key, id),
            _ => Projected::Skip,
        })
    }

    fn entry(value: &String) -> Entry {
        Entry::Id(value.clone())
    }
}

pub type ClusterIdCache = KeyedCache<ClusterIdProjection>;

impl KeyedCache<ClusterIdProjection> {
    /// Cluster id for a ManagedCluster name, if the cluster has been seen.
    pub fn cluster_id(&self, name: &str) -> Option<String> {
        self.value(name)
    }
}
