//! Value trait implementations: constructors, predicates, extractors, From traits, PartialEq

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::*;
use crate::error::ErrorKind;

/// 2^63; integral numbers at or beyond it do not fit an `i64`.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

// ═══════════════════════════════════════════════════════════════════
// Convenience Constructors
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// Create an array value
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(items)))
    }

    /// Create a map value
    pub fn map(entries: IndexMap<String, Value>) -> Self {
        Value::Map(Arc::new(RwLock::new(entries)))
    }

    /// Create a map from `(key, value)` pairs.
    pub fn map_from<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Create an error value
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Value::Error(Arc::new(ErrorValue::new(kind, message)))
    }

    /// Create a builtin function value
    pub fn builtin(f: BuiltinFn) -> Self {
        Value::Builtin(f)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Type Predicates
    // ═══════════════════════════════════════════════════════════════════

    /// Type name used in error messages and by `型名`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "無",
            Value::Bool(_) => "真偽値",
            Value::Number(_) => "数値",
            Value::String(_) => "文字列",
            Value::Array(_) => "配列",
            Value::Map(_) => "辞書",
            Value::Function(_) | Value::Builtin(_) | Value::Native(_) | Value::BoundMethod(_) => {
                "関数"
            }
            Value::Class(_) => "型",
            Value::Instance(_) => "インスタンス",
            Value::Promise(_) => "Promise",
            Value::Channel(_) => "チャネル",
            Value::Mutex(_) => "ミューテックス",
            Value::RwLock(_) => "読み書きロック",
            Value::Semaphore(_) => "セマフォ",
            Value::Atomic(_) => "アトミック",
            Value::Thread(_) => "スレッド",
            Value::WaitGroup(_) => "待機グループ",
            Value::Error(_) => "エラー",
        }
    }

    /// Truthiness: `無`, `偽`, `0`, `NaN` and empty strings, arrays and maps
    /// are false; everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.read().is_empty(),
            Value::Map(map) => !map.read().is_empty(),
            _ => true,
        }
    }

    /// Check if value is callable
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_)
                | Value::Builtin(_)
                | Value::Native(_)
                | Value::BoundMethod(_)
                | Value::Class(_)
        )
    }

    /// Check if value is `無`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Value Extractors
    // ═══════════════════════════════════════════════════════════════════

    /// The number, if this is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as an integer, if it is integral and fits an `i64`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < I64_LIMIT => Some(*n as i64),
            _ => None,
        }
    }

    /// The text, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether two values share the same storage. Scalars never do.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
            (Value::BoundMethod(a), Value::BoundMethod(b)) => Arc::ptr_eq(a, b),
            (Value::Promise(a), Value::Promise(b)) => Arc::ptr_eq(a, b),
            (Value::Channel(a), Value::Channel(b)) => Arc::ptr_eq(a, b),
            (Value::Mutex(a), Value::Mutex(b)) => Arc::ptr_eq(a, b),
            (Value::RwLock(a), Value::RwLock(b)) => Arc::ptr_eq(a, b),
            (Value::Semaphore(a), Value::Semaphore(b)) => Arc::ptr_eq(a, b),
            (Value::Atomic(a), Value::Atomic(b)) => Arc::ptr_eq(a, b),
            (Value::Thread(a), Value::Thread(b)) => Arc::ptr_eq(a, b),
            (Value::WaitGroup(a), Value::WaitGroup(b)) => Arc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Arc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Equality
// ═══════════════════════════════════════════════════════════════════

/// Deep equality for arrays, maps and instances (same storage compares
/// equal without reading it); IEEE equality for numbers, so `NaN != NaN`;
/// identity for everything else. Self-containing values compare equal when
/// their shapes match.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        deep_eq(self, other, &mut Vec::new())
    }
}

/// `seen` holds the composite pairs already under comparison. Meeting one
/// again means the walk went round a cycle; that branch is taken as equal
/// and any real difference still fails the pair where it was first seen.
fn deep_eq(a: &Value, b: &Value, seen: &mut Vec<(usize, usize)>) -> bool {
    if a.ptr_eq(b) {
        return true;
    }
    let pair = match (a, b) {
        (Value::Array(x), Value::Array(y)) => Some((Arc::as_ptr(x) as usize, Arc::as_ptr(y) as usize)),
        (Value::Map(x), Value::Map(y)) => Some((Arc::as_ptr(x) as usize, Arc::as_ptr(y) as usize)),
        (Value::Instance(x), Value::Instance(y)) => {
            Some((Arc::as_ptr(x) as usize, Arc::as_ptr(y) as usize))
        }
        _ => None,
    };
    if let Some(pair) = pair {
        if seen.contains(&pair) {
            return true;
        }
        seen.push(pair);
    }

    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            let (a, b) = (a.read(), b.read());
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| deep_eq(x, y, seen))
        }
        (Value::Map(a), Value::Map(b)) => {
            let (a, b) = (a.read(), b.read());
            a.len() == b.len()
                && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| deep_eq(v, w, seen)))
        }
        (Value::Instance(a), Value::Instance(b)) => {
            Arc::ptr_eq(&a.class, &b.class) && {
                let (a, b) = (a.fields.read(), b.fields.read());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| deep_eq(v, w, seen)))
            }
        }
        (Value::BoundMethod(a), Value::BoundMethod(b)) => {
            a.receiver.ptr_eq(&b.receiver) && a.method == b.method
        }
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl From<ErrorValue> for Value {
    fn from(e: ErrorValue) -> Self {
        Value::Error(Arc::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::array(vec![]).is_truthy());
        assert!(!Value::map(IndexMap::new()).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::string("0").is_truthy());
        assert!(Value::array(vec![Value::Null]).is_truthy());
    }

    #[test]
    fn test_as_integer_rejects_out_of_range() {
        assert_eq!(Value::Number(-42.0).as_integer(), Some(-42));
        assert_eq!(Value::Number(9.0e15).as_integer(), Some(9_000_000_000_000_000));
        assert_eq!(Value::Number(1e20).as_integer(), None);
        assert_eq!(Value::Number(-9_223_372_036_854_775_808.0).as_integer(), None);
        assert_eq!(Value::Number(f64::INFINITY).as_integer(), None);
        assert_eq!(Value::Number(f64::NAN).as_integer(), None);
        assert_eq!(Value::Number(1.5).as_integer(), None);
    }

    #[test]
    fn test_cyclic_values_compare_without_overflow() {
        let a = Value::array(vec![Value::Number(1.0)]);
        let b = Value::array(vec![Value::Number(1.0)]);
        if let (Value::Array(x), Value::Array(y)) = (&a, &b) {
            x.write().push(a.clone());
            y.write().push(b.clone());
        }
        assert_eq!(a, b);

        let c = Value::array(vec![Value::Number(2.0)]);
        if let Value::Array(z) = &c {
            z.write().push(c.clone());
        }
        assert_ne!(a, c);

        let m = Value::map_from([("自分", Value::Null)]);
        let n = Value::map_from([("自分", Value::Null)]);
        if let (Value::Map(x), Value::Map(y)) = (&m, &n) {
            x.write().insert("自分".to_string(), m.clone());
            y.write().insert("自分".to_string(), n.clone());
        }
        assert_eq!(m, n);
    }

    #[test]
    fn test_nan_is_not_equal_to_itself() {
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn test_deep_equality() {
        let a = Value::array(vec![Value::Number(1.0), Value::string("x")]);
        let b = Value::array(vec![Value::Number(1.0), Value::string("x")]);
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert_eq!(
            Value::map_from([("a", Value::Number(1.0))]),
            Value::map_from([("a", Value::Number(1.0))])
        );
        assert_ne!(Value::Number(1.0), Value::string("1"));
    }

    #[test]
    fn test_aliasing_shares_mutation() {
        let a = Value::array(vec![]);
        let b = a.clone();
        if let Value::Array(items) = &b {
            items.write().push(Value::Number(4.0));
        }
        assert_eq!(a.to_string(), "[4]");
    }

    #[test]
    fn test_as_integer() {
        assert_eq!(Value::Number(3.0).as_integer(), Some(3));
        assert_eq!(Value::Number(3.5).as_integer(), None);
        assert_eq!(Value::Number(f64::INFINITY).as_integer(), None);
    }
}
