use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::StoreError;

/// Dynamically-typed upstream object as delivered by the event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Object(Value);

impl Object {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn into_raw(self) -> Value {
        self.0
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(Value::as_str)
    }

    fn meta_str(&self, field: &str) -> Option<&str> {
        self.0.get("metadata").and_then(|m| m.get(field)).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.meta_str("name").filter(|s| !s.is_empty())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.meta_str("namespace").filter(|s| !s.is_empty())
    }

    pub fn uid(&self) -> Option<&str> {
        self.meta_str("uid").filter(|s| !s.is_empty())
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.0
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(|l| l.get(key))
            .and_then(Value::as_str)
    }

    /// Walk a dotted path of object keys, e.g. `status.conditions`.
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.0, |v, seg| v.get(seg))
    }

    /// Fail with `UnexpectedKind` unless the object declares `expected` as its kind.
    pub fn expect_kind(&self, expected: &'static str) -> Result<(), StoreError> {
        match self.kind() {
            Some(k) if k == expected => Ok(()),
            other => Err(StoreError::UnexpectedKind {
                expected,
                got: other.unwrap_or("<none>").to_string(),
            }),
        }
    }
}

impl From<Value> for Object {
    fn from(v: Value) -> Self {
        Self(v)
    }
}
