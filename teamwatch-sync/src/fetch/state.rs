//! Per-orchestrator fetch state and the emptiness predicate.

use std::collections::{BTreeMap, HashMap};

use super::error::FetchError;

/// Snapshot of one orchestrator's execution state.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    /// Last successfully retrieved value, or the default value.
    pub data: T,
    pub loading: bool,
    pub error: Option<FetchError>,
    /// Token of the current call. Bumped by every `execute`/`refetch`; an
    /// outcome carrying an older generation is discarded.
    pub generation: u64,
}

impl<T> FetchState<T> {
    pub fn new(data: T, loading: bool) -> Self {
        Self {
            data,
            loading,
            error: None,
            generation: 0,
        }
    }

    /// Settled with an error that the view should offer to retry.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// "Nothing to show" predicate for empty-state rendering.
///
/// True for zero-length sequences and absent values.
pub trait Emptiness {
    fn is_empty_value(&self) -> bool;
}

impl<T> Emptiness for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Emptiness for Option<T> {
    fn is_empty_value(&self) -> bool {
        self.is_none()
    }
}

impl Emptiness for String {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Emptiness for HashMap<K, V> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Emptiness for BTreeMap<K, V> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl Emptiness for serde_json::Value {
    fn is_empty_value(&self) -> bool {
        use serde_json::Value;
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(_) => false,
        }
    }
}
