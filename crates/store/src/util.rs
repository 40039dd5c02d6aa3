//! Locking and extraction helpers shared by every cache.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::DateTime;
use fleet_core::{Object, StoreError};
use serde_json::Value;

// A poisoned lock only means a panic happened elsewhere while holding it; every mutation here is
// applied as a single map operation, so the data is still consistent.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Parse an RFC-3339 timestamp into fractional unix seconds.
pub(crate) fn parse_rfc3339(field: &'static str, s: &str) -> Result<f64, StoreError> {
    let ts = DateTime::parse_from_rfc3339(s.trim()).map_err(|source| StoreError::Timestamp {
        field,
        value: s.to_string(),
        source,
    })?;
    Ok(ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) / 1e9)
}

/// `namespace/name`, or the bare name for cluster-scoped objects.
pub(crate) fn object_ident(obj: &Object) -> Option<String> {
    let name = obj.name()?;
    Some(match obj.namespace() {
        Some(ns) => format!("{ns}/{name}"),
        None => name.to_string(),
    })
}

/// Find `{"type": ty, ...}` in a Kubernetes-style conditions array.
pub(crate) fn find_condition<'a>(conditions: Option<&'a Value>, ty: &str) -> Option<&'a Value> {
    conditions?
        .as_array()?
        .iter()
        .find(|c| c.get("type").and_then(Value::as_str) == Some(ty))
}
