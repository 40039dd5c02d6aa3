use thiserror::Error;

/// Errors surfaced synchronously by Store contract calls.
///
/// None of these are fatal: the caller (usually a reflector task) logs and moves on.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unexpected object kind: expected {expected}, got {got}")]
    UnexpectedKind { expected: &'static str, got: String },

    #[error("object missing {0}")]
    MissingField(&'static str),

    #[error("parsing {field} from {value:?}: {source}")]
    Timestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("malformed {0}")]
    Malformed(String),

    #[error("{} child store(s) failed: {}", .0.len(), join(.0))]
    Aggregate(Vec<StoreError>),
}

impl StoreError {
    /// Collapse per-child errors: `None` when empty, the error itself when single.
    pub fn aggregate(mut errs: Vec<StoreError>) -> Option<StoreError> {
        match errs.len() {
            0 => None,
            1 => errs.pop(),
            _ => Some(StoreError::Aggregate(errs)),
        }
    }
}

fn join(errs: &[StoreError]) -> String {
    errs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}
