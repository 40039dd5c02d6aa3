//! Startup wiring: shared caches, enabled collectors, and which store each watched kind feeds.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use fleet_core::Store;
use fleet_store::{ClusterIdCache, ComposedStore, HibernationCache, HostedTimestampCache};
use tracing::info;

use crate::clusters::{cluster_counter, cluster_store};
use crate::hosted::HostedMilestones;
use crate::SnapshotCollector;

pub const MANAGED_CLUSTER_GVK: &str = "cluster.open-cluster-management.io/v1/ManagedCluster";
pub const CLUSTER_DEPLOYMENT_GVK: &str = "hive.openshift.io/v1/ClusterDeployment";
pub const MANIFEST_WORK_GVK: &str = "work.open-cluster-management.io/v1/ManifestWork";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollectorKind {
    ManagedClusters,
    HostedClusters,
}

impl CollectorKind {
    pub const ALL: [CollectorKind; 2] = [CollectorKind::ManagedClusters, CollectorKind::HostedClusters];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorKind::ManagedClusters => "managedclusters",
            CollectorKind::HostedClusters => "hostedclusters",
        }
    }
}

impl FromStr for CollectorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        CollectorKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| anyhow!("unknown collector {:?} (known: managedclusters, hostedclusters)", s))
    }
}

/// One watched kind and the store its events drive.
pub struct Feed {
    pub gvk: &'static str,
    pub store: Arc<dyn Store>,
}

pub struct Wiring {
    pub collector: SnapshotCollector,
    pub feeds: Vec<Feed>,
}

/// Caches shared between collectors. Built once at startup and passed by reference.
#[derive(Default)]
pub struct Registry {
    ids: Arc<ClusterIdCache>,
    hibernation: Arc<HibernationCache>,
    timestamps: Arc<HostedTimestampCache>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &Arc<ClusterIdCache> {
        &self.ids
    }

    pub fn hibernation(&self) -> &Arc<HibernationCache> {
        &self.hibernation
    }

    pub fn timestamps(&self) -> &Arc<HostedTimestampCache> {
        &self.timestamps
    }

    pub fn build_named<S: AsRef<str>>(&self, names: &[S]) -> Result<Wiring> {
        let kinds = names.iter().map(|n| n.as_ref().parse()).collect::<Result<Vec<CollectorKind>>>()?;
        Ok(self.build(&kinds))
    }

    /// Wire the enabled collectors. Each kind gets exactly one feed, and shared caches are
    /// appended to it once no matter how many collectors read them.
    pub fn build(&self, enabled: &[CollectorKind]) -> Wiring {
        let enabled: BTreeSet<CollectorKind> = enabled.iter().copied().collect();
        let mut feeds: BTreeMap<&'static str, ComposedStore> = BTreeMap::new();
        let mut collector = SnapshotCollector::new();

        // Both collectors need cluster ids.
        if !enabled.is_empty() {
            feeds.entry(MANAGED_CLUSTER_GVK).or_default().append(self.ids.clone());
        }

        for kind in &enabled {
            match kind {
                CollectorKind::ManagedClusters => {
                    let clusters = Arc::new(cluster_store(self.hibernation.clone()));
                    let counter = Arc::new(cluster_counter());
                    let mc = feeds.entry(MANAGED_CLUSTER_GVK).or_default();
                    mc.append(clusters.clone());
                    mc.append(counter.clone());
                    feeds.entry(CLUSTER_DEPLOYMENT_GVK).or_default().append(self.hibernation.clone());

                    let target = Arc::downgrade(&clusters);
                    self.hibernation.on_change(Arc::new(move |key: &str| {
                        if let Some(clusters) = target.upgrade() {
                            clusters.refresh(key);
                        }
                        Ok(())
                    }));
                    collector.push(clusters);
                    collector.push(counter);
                }
                CollectorKind::HostedClusters => {
                    feeds.entry(MANIFEST_WORK_GVK).or_default().append(self.timestamps.clone());
                    collector.push(Arc::new(HostedMilestones::new(self.timestamps.clone(), self.ids.clone())));
                }
            }
        }

        info!(
            collectors = ?enabled.iter().map(CollectorKind::as_str).collect::<Vec<_>>(),
            watches = ?feeds.keys().collect::<Vec<_>>(),
            "collectors wired"
        );
        let feeds = feeds
            .into_iter()
            .map(|(gvk, store)| Feed { gvk, store: Arc::new(store) as Arc<dyn Store> })
            .collect();
        Wiring { collector, feeds }
    }
}
