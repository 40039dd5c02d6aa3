#![forbid(unsafe_code)]

use std::collections::HashMap;

use fleet_core::{Object, Store};
use fleet_store::ClusterIdCache;
use proptest::prelude::*;

fn mc(name: &str, id: u8) -> Object {
    Object::new(serde_json::json!({
        "kind": "ManagedCluster",
        "metadata": {
            "name": name,
            "labels": { "vendor": "OpenShift", "clusterID": format!("id-{id}"), "openshiftVersion": "4.15.0" }
        }
    }))
}

#[derive(Debug, Clone)]
enum Op {
    Add(u8, u8),
    Update(u8, u8),
    Delete(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..5, any::<u8>()).prop_map(|(k, v)| Op::Add(k, v)),
        (0u8..5, any::<u8>()).prop_map(|(k, v)| Op::Update(k, v)),
        (0u8..5).prop_map(Op::Delete),
    ]
}

proptest! {
    #[test]
    fn get_by_key_returns_latest_write(ops in proptest::collection::vec(op(), 0..64)) {
        let cache = ClusterIdCache::new();
        let mut model: HashMap<String, String> = HashMap::new();
        for op in ops {
            match op {
                Op::Add(k, v) => {
                    let name = format!("c{k}");
                    cache.add(&mc(&name, v)).unwrap();
                    model.insert(name, format!("id-{v}"));
                }
                Op::Update(k, v) => {
                    let name = format!("c{k}");
                    cache.update(&mc(&name, v)).unwrap();
                    model.insert(name, format!("id-{v}"));
                }
                Op::Delete(k) => {
                    let name = format!("c{k}");
                    cache.delete(&mc(&name, 0)).unwrap();
                    model.remove(&name);
                }
            }
        }
        for k in 0u8..5 {
            let name = format!("c{k}");
            prop_assert_eq!(cache.cluster_id(&name), model.get(&name).cloned());
        }
    }

    #[test]
    fn replace_keeps_exactly_the_listed_keys(
        before in proptest::collection::vec((0u8..8, any::<u8>()), 0..16),
        listed in proptest::collection::vec((0u8..8, any::<u8>()), 0..16),
    ) {
        let cache = ClusterIdCache::new();
        for (k, v) in before {
            cache.add(&mc(&format!("c{k}"), v)).unwrap();
        }
        let list: Vec<Object> = listed.iter().map(|(k, v)| mc(&format!("c{k}"), *v)).collect();
        cache.replace(&list, "1").unwrap();

        let mut want: Vec<String> = listed.iter().map(|(k, _)| format!("c{k}")).collect();
        want.sort();
        want.dedup();
        let mut got = cache.list_keys();
        got.sort();
        prop_assert_eq!(got, want);
    }
}
