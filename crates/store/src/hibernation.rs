//! ClusterDeployment hibernation flag, keyed by cluster name.
//!
//! Only ClusterDeployments living in the namespace of the same name are tracked (one deployment
//! per managed cluster). Any malformed or missing condition reads as "not hibernating".

use fleet_core::{Entry, Object, StoreResult};
use serde_json::Value;

use crate::keyed::{KeyedCache, Projected, Projection};
use crate::util::find_condition;

pub const CLUSTER_DEPLOYMENT_KIND: &str = "ClusterDeployment";
const HIBERNATING_CONDITION: &str = "Hibernating";

pub struct HibernationProjection;

impl Projection for HibernationProjection {
    type Value = bool;
    const KIND: &'static str = CLUSTER_DEPLOYMENT_KIND;

    fn key(obj: &Object) -> Option<String> {
        match (obj.namespace(), obj.name()) {
            (Some(ns), Some(name)) if ns == name => Some(name.to_string()),
            _ => None,
        }
    }

    fn project(obj: &Object) -> StoreResult<Projected<bool>> {
        let Some(key) = Self::key(obj) else { return Ok(Projected::Skip) };
        let hibernating = find_condition(obj.pointer("status.conditions"), HIBERNATING_CONDITION)
            .and_then(|c| c.get("status"))
            .and_then(Value::as_str)
            == Some("True");
        Ok(Projected::Set(key, hibernating))
    }

    fn entry(value: &bool) -> Entry {
        Entry::Flag(*value)
    }
}

pub type HibernationCache = KeyedCache<HibernationProjection>;

impl KeyedCache<HibernationProjection> {
    /// Absent clusters are not hibernating.
    pub fn is_hibernating(&self, name: &str) -> bool {
        self.value(name).unwrap_or(false)
    }
}
