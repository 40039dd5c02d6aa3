//! Hosted cluster milestone timestamps, read from ManifestWork status feedback.
//!
//! A ManifestWork labelled with [`HOSTED_CLUSTER_LABEL`] carries a `HostedCluster` manifest for
//! that hosted cluster. The work agent reports feedback values for it:
//!
//! - `Ready` (boolean): absent or false means no milestone data for the hosted cluster.
//! - `ReadyTimestamp` (RFC-3339): when the hosted cluster became ready.
//! - `Message` (free text): may embed `installation started at <RFC-3339>`.

use std::collections::BTreeMap;

use fleet_core::{Entry, Object, StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::keyed::{KeyedCache, Projected, Projection};
use crate::util::parse_rfc3339;

pub const MANIFEST_WORK_KIND: &str = "ManifestWork";
pub const HOSTED_CLUSTER_LABEL: &str = "api.open-cluster-management.io/hosted-cluster-name";

const HOSTED_CLUSTER_GROUP: &str = "hypershift.openshift.io";
const HOSTED_CLUSTER_KIND: &str = "HostedCluster";

const FEEDBACK_READY: &str = "Ready";
const FEEDBACK_READY_TS: &str = "ReadyTimestamp";
const FEEDBACK_MESSAGE: &str = "Message";

static STARTED_AT: Lazy<Regex> = Lazy::new(|| Regex::new(r"installation started at (\S+)").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Milestone {
    Started,
    Ready,
}

impl Milestone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Milestone::Started => "started",
            Milestone::Ready => "ready",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostedTimestamps {
    /// ManagedCluster hosting the control plane (the ManifestWork namespace).
    pub hosting_cluster: String,
    pub milestones: BTreeMap<Milestone, f64>,
}

pub struct HostedTimestampProjection;

fn feedback<'a>(values: &'a [Value], name: &str) -> Option<&'a Value> {
    values
        .iter()
        .find(|v| v.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|v| v.get("fieldValue"))
}

fn feedback_str<'a>(values: &'a [Value], name: &str) -> StoreResult<Option<&'a str>> {
    match feedback(values, name) {
        None => Ok(None),
        Some(fv) => fv
            .get("string")
            .and_then(Value::as_str)
            .map(Some)
            .ok_or_else(|| StoreError::Malformed(format!("feedback {name}: expected string"))),
    }
}

/// Feedback values of the `HostedCluster` manifest named `target`, if the agent reported any.
fn hosted_feedback<'a>(obj: &'a Object, target: &str) -> StoreResult<Option<&'a [Value]>> {
    let Some(manifests) = obj.pointer("status.resourceStatus.manifests") else {
        return Ok(None);
    };
    let manifests = manifests
        .as_array()
        .ok_or_else(|| StoreError::Malformed("status.resourceStatus.manifests".into()))?;
    let found = manifests.iter().find(|m| {
        let meta = &m["resourceMeta"];
        meta["group"].as_str() == Some(HOSTED_CLUSTER_GROUP)
            && meta["kind"].as_str() == Some(HOSTED_CLUSTER_KIND)
            && meta["name"].as_str() == Some(target)
    });
    let Some(manifest) = found else { return Ok(None) };
    match manifest.get("statusFeedback").and_then(|f| f.get("values")) {
        None => Ok(Some(&[] as &[Value])),
        Some(Value::Array(values)) => Ok(Some(values.as_slice())),
        Some(_) => Err(StoreError::Malformed("statusFeedback.values".into())),
    }
}

impl Projection for HostedTimestampProjection {
    type Value = HostedTimestamps;
    const KIND: &'static str = MANIFEST_WORK_KIND;

    fn key(obj: &Object) -> Option<String> {
        obj.label(HOSTED_CLUSTER_LABEL).filter(|s| !s.is_empty()).map(str::to_string)
    }

    fn project(obj: &Object) -> StoreResult<Projected<HostedTimestamps>> {
        let Some(target) = Self::key(obj) else { return Ok(Projected::Skip) };
        let Some(values) = hosted_feedback(obj, &target)? else {
            return Ok(Projected::Skip);
        };
        let ready = match feedback(values, FEEDBACK_READY) {
            None => false,
            Some(fv) => fv
                .get("boolean")
                .and_then(Value::as_bool)
                .ok_or_else(|| StoreError::Malformed(format!("feedback {FEEDBACK_READY}: expected boolean")))?,
        };
        // Any Add or Update reporting not-ready clears the entry, not only one following a relist.
        if !ready {
            return Ok(Projected::Clear(target));
        }
        let hosting_cluster = obj.namespace().ok_or(StoreError::MissingField("metadata.namespace"))?.to_string();

        let mut milestones = BTreeMap::new();
        let ready_ts = feedback_str(values, FEEDBACK_READY_TS)?
            .ok_or(StoreError::MissingField("feedback ReadyTimestamp"))?;
        milestones.insert(Milestone::Ready, parse_rfc3339("ReadyTimestamp", ready_ts)?);
        if let Some(msg) = feedback_str(values, FEEDBACK_MESSAGE)? {
            if let Some(caps) = STARTED_AT.captures(msg) {
                let raw = caps[1].trim_end_matches(|c: char| matches!(c, ',' | ';' | '.' | ')'));
                milestones.insert(Milestone::Started, parse_rfc3339("Message", raw)?);
            }
        }
        Ok(Projected::Set(target, HostedTimestamps { hosting_cluster, milestones }))
    }

    fn entry(value: &HostedTimestamps) -> Entry {
        Entry::Timestamps(value.milestones.iter().map(|(m, ts)| (m.as_str().to_string(), *ts)).collect())
    }
}

pub type HostedTimestampCache = KeyedCache<HostedTimestampProjection>;

impl KeyedCache<HostedTimestampProjection> {
    pub fn timestamps(&self, hosted_cluster: &str) -> Option<HostedTimestamps> {
        self.value(hosted_cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::Store;

    fn work(target: Option<&str>, values: Value) -> Object {
        let mut labels = serde_json::json!({});
        if let Some(t) = target {
            labels[HOSTED_CLUSTER_LABEL] = Value::String(t.to_string());
        }
        Object::new(serde_json::json!({
            "kind": "ManifestWork",
            "metadata": { "name": "hc1-work", "namespace": "hub-a", "labels": labels },
            "status": { "resourceStatus": { "manifests": [
                { "resourceMeta": { "group": "", "kind": "Namespace", "name": "hc1" } },
                { "resourceMeta": { "group": "hypershift.openshift.io", "kind": "HostedCluster", "name": "hc1" },
                  "statusFeedback": { "values": values } }
            ] } }
        }))
    }

    fn ready(ts: &str, msg: Option<&str>) -> Value {
        let mut vals = vec![
            serde_json::json!({ "name": "Ready", "fieldValue": { "type": "Boolean", "boolean": true } }),
            serde_json::json!({ "name": "ReadyTimestamp", "fieldValue": { "type": "String", "string": ts } }),
        ];
        if let Some(m) = msg {
            vals.push(serde_json::json!({ "name": "Message", "fieldValue": { "type": "String", "string": m } }));
        }
        Value::Array(vals)
    }

    #[test]
    fn ready_feedback_yields_both_milestones() {
        let cache = HostedTimestampCache::new();
        let msg = "HostedCluster hc1: installation started at 1970-01-01T00:00:05Z, waiting";
        cache.add(&work(Some("hc1"), ready("1970-01-01T00:01:00Z", Some(msg)))).unwrap();
        let got = cache.timestamps("hc1").unwrap();
        assert_eq!(got.hosting_cluster, "hub-a");
        assert_eq!(got.milestones.get(&Milestone::Ready), Some(&60.0));
        assert_eq!(got.milestones.get(&Milestone::Started), Some(&5.0));
    }

    #[test]
    fn message_without_marker_gives_ready_only() {
        let cache = HostedTimestampCache::new();
        cache.add(&work(Some("hc1"), ready("1970-01-01T00:01:00Z", Some("all good")))).unwrap();
        let got = cache.get_by_key("hc1").unwrap().unwrap();
        let Entry::Timestamps(ts) = got else { panic!("unexpected entry {got:?}") };
        assert_eq!(ts.len(), 1);
        assert_eq!(ts["ready"], 60.0);
    }

    #[test]
    fn unlabelled_work_is_ignored() {
        let cache = HostedTimestampCache::new();
        cache.add(&work(None, ready("1970-01-01T00:01:00Z", None))).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn not_ready_clears_entry() {
        let cache = HostedTimestampCache::new();
        cache.replace(&[work(Some("hc1"), ready("1970-01-01T00:01:00Z", None))], "1").unwrap();
        assert!(cache.timestamps("hc1").is_some());
        let not_ready = serde_json::json!([{ "name": "Ready", "fieldValue": { "type": "Boolean", "boolean": false } }]);
        cache.update(&work(Some("hc1"), not_ready)).unwrap();
        assert!(cache.timestamps("hc1").is_none());
    }

    #[test]
    fn parse_failures_do_not_mutate() {
        let cache = HostedTimestampCache::new();
        cache.add(&work(Some("hc1"), ready("1970-01-01T00:01:00Z", None))).unwrap();
        let err = cache.update(&work(Some("hc1"), ready("not-a-time", None))).unwrap_err();
        assert!(matches!(err, StoreError::Timestamp { field: "ReadyTimestamp", .. }));
        let err = cache
            .update(&work(Some("hc1"), ready("1970-01-01T00:02:00Z", Some("installation started at soon"))))
            .unwrap_err();
        assert!(matches!(err, StoreError::Timestamp { field: "Message", .. }));
        assert_eq!(cache.timestamps("hc1").unwrap().milestones[&Milestone::Ready], 60.0);
    }

    #[test]
    fn relist_with_unparseable_timestamp_keeps_prior_entry() {
        let cache = HostedTimestampCache::new();
        cache.add(&work(Some("hc1"), ready("1970-01-01T00:01:00Z", None))).unwrap();
        let bad = work(Some("hc1"), ready("garbage", None));
        assert!(cache.update(&bad).is_err());
        assert!(cache.timestamps("hc1").is_some());

        let err = cache.replace(&[bad], "5").unwrap_err();
        assert!(matches!(err, StoreError::Timestamp { field: "ReadyTimestamp", .. }));
        assert_eq!(cache.timestamps("hc1").unwrap().milestones[&Milestone::Ready], 60.0);
    }

    #[test]
    fn missing_manifest_is_skipped() {
        let cache = HostedTimestampCache::new();
        let mut o = work(Some("other"), ready("1970-01-01T00:01:00Z", None)).into_raw();
        o["metadata"]["labels"][HOSTED_CLUSTER_LABEL] = Value::String("hc-unknown".into());
        cache.add(&Object::new(o)).unwrap();
        assert!(cache.is_empty());
    }
}
