//! Fleet store: derived-state caches driven by the Store contract.
//!
//! - [`KeyedCache`] family: one projection per resource name ([`ClusterIdCache`],
//!   [`HostedTimestampCache`], [`HibernationCache`]) with change callbacks.
//! - [`CountingStore`]: distinct-uid counter that pre-renders its exposition on write.
//! - [`MetricsStore`]: per-object rendered families, refreshable by key.
//! - [`ComposedStore`]: fan-out of one event stream to several stores.

#![forbid(unsafe_code)]

mod cluster_id;
mod composed;
mod counting;
mod hibernation;
mod hosted;
mod keyed;
mod metrics_store;
mod util;

pub use cluster_id::{cluster_id, ClusterIdCache, ClusterIdProjection, MANAGED_CLUSTER_KIND};
pub use composed::ComposedStore;
pub use counting::{CountRenderFn, CountingStore};
pub use hibernation::{HibernationCache, HibernationProjection, CLUSTER_DEPLOYMENT_KIND};
pub use hosted::{
    HostedTimestampCache, HostedTimestampProjection, HostedTimestamps, Milestone, HOSTED_CLUSTER_LABEL,
    MANIFEST_WORK_KIND,
};
pub use keyed::{KeyedCache, Projected, Projection};
pub use metrics_store::{MetricsStore, ObjectRenderFn};
