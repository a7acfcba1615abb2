//! Hashable wrapper for Value to enable use as HashMap keys

use std::hash::{Hash, Hasher};

use super::Value;

/// A wrapper for Value that implements Hash and Eq.
///
/// Only `無`, booleans, strings and non-NaN numbers can be wrapped; the
/// constructor refuses everything else, so hashing never meets a value it
/// cannot handle.
#[derive(Debug, Clone)]
pub struct HashableValue(Value);

impl HashableValue {
    /// Wrap `value` if it is hashable.
    pub fn new(value: Value) -> Option<Self> {
        if Self::is_hashable(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Check if a value can be hashed
    pub fn is_hashable(value: &Value) -> bool {
        match value {
            Value::Null | Value::Bool(_) | Value::String(_) => true,
            Value::Number(n) => !n.is_nan(),
            _ => false,
        }
    }

    /// The wrapped value.
    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl Hash for HashableValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash the discriminant first
        std::mem::discriminant(&self.0).hash(state);

        match &self.0 {
            Value::Bool(b) => b.hash(state),
            // -0.0 == 0.0, so both must hash alike
            Value::Number(n) => (if *n == 0.0 { 0.0f64 } else { *n }).to_bits().hash(state),
            Value::String(s) => s.hash(state),
            _ => {}
        }
    }
}

impl PartialEq for HashableValue {
    fn eq(&self, other: &Self) -> bool {
        // Delegate to Value's PartialEq
        self.0 == other.0
    }
}

impl Eq for HashableValue {}
