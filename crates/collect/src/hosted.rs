//! Hosted cluster milestone family, rendered from the timestamp cache at scrape time.

use std::sync::Arc;

use fleet_core::MetricsWriter;
use fleet_store::{ClusterIdCache, HostedTimestampCache};

use crate::family::{Family, Sample};

pub const HOSTED_MILESTONE: Family = Family::gauge(
    "fleet_hosted_cluster_milestone_timestamp_seconds",
    "Unix time at which a hosted cluster reached a provisioning milestone.",
);

pub struct HostedMilestones {
    timestamps: Arc<HostedTimestampCache>,
    ids: Arc<ClusterIdCache>,
}

impl HostedMilestones {
    pub fn new(timestamps: Arc<HostedTimestampCache>, ids: Arc<ClusterIdCache>) -> Self {
        Self { timestamps, ids }
    }
}

impl MetricsWriter for HostedMilestones {
    fn write_all(&self, w: &mut dyn std::io::Write) -> std::io::Result<()> {
        w.write_all(HOSTED_MILESTONE.header().as_bytes())?;
        w.write_all(b"\n")?;
        let mut samples = Vec::new();
        for (hosted, ts) in self.timestamps.snapshot() {
            // The hosting cluster may not have been seen yet; its name is the best id we have.
            let hosting_id = self.ids.cluster_id(&ts.hosting_cluster).unwrap_or_else(|| ts.hosting_cluster.clone());
            for (milestone, at) in &ts.milestones {
                samples.push(
                    Sample::new(*at)
                        .label("hosted_cluster", hosted.as_str())
                        .label("hosting_cluster", ts.hosting_cluster.as_str())
                        .label("hosting_cluster_id", hosting_id.as_str())
                        .label("milestone", milestone.as_str()),
                );
            }
        }
        w.write_all(&HOSTED_MILESTONE.render(&samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{Object, Store};

    fn work(hosted: &str, hosting: &str) -> Object {
        Object::new(serde_json::json!({
            "kind": "ManifestWork",
            "metadata": { "name": format!("{hosted}-work"), "namespace": hosting,
                          "labels": { "api.open-cluster-management.io/hosted-cluster-name": hosted } },
            "status": { "resourceStatus": { "manifests": [{
                "resourceMeta": { "group": "hypershift.openshift.io", "kind": "HostedCluster", "name": hosted },
                "statusFeedback": { "values": [
                    { "name": "Ready", "fieldValue": { "type": "Boolean", "boolean": true } },
                    { "name": "ReadyTimestamp", "fieldValue": { "type": "String", "string": "1970-01-01T00:01:40Z" } },
                    { "name": "Message", "fieldValue": { "type": "String", "string": "installation started at 1970-01-01T00:00:10Z" } }
                ] }
            }] } }
        }))
    }

    #[test]
    fn renders_with_hosting_cluster_id() {
        let ts = Arc::new(HostedTimestampCache::new());
        let ids = Arc::new(ClusterIdCache::new());
        ids.add(&Object::new(serde_json::json!({
            "kind": "ManagedCluster",
            "metadata": { "name": "hub-a", "labels": { "vendor": "OpenShift", "clusterID": "id-a" } }
        })))
        .unwrap();
        ts.add(&work("hc1", "hub-a")).unwrap();
        ts.add(&work("hc2", "hub-b")).unwrap();

        let mut buf = Vec::new();
        HostedMilestones::new(ts, ids).write_all(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("fleet_hosted_cluster_milestone_timestamp_seconds{hosted_cluster=\"hc1\",hosting_cluster=\"hub-a\",hosting_cluster_id=\"id-a\",milestone=\"started\"} 10\n"));
        assert!(out.contains("fleet_hosted_cluster_milestone_timestamp_seconds{hosted_cluster=\"hc1\",hosting_cluster=\"hub-a\",hosting_cluster_id=\"id-a\",milestone=\"ready\"} 100\n"));
        assert!(out.contains("hosted_cluster=\"hc2\",hosting_cluster=\"hub-b\",hosting_cluster_id=\"hub-b\""));
    }
}
