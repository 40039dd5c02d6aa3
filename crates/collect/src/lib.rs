//! Fleet collect: metric families over the fleet stores, the snapshot collector served on scrape,
//! and the startup registry that wires caches to watched kinds.

#![forbid(unsafe_code)]

pub mod clusters;
pub mod family;
pub mod hosted;
mod registry;
mod snapshot;

pub use family::{Family, MetricType, Sample};
pub use registry::{
    CollectorKind, Feed, Registry, Wiring, CLUSTER_DEPLOYMENT_GVK, MANAGED_CLUSTER_GVK, MANIFEST_WORK_GVK,
};
pub use snapshot::SnapshotCollector;
