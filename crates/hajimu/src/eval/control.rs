//! Non-local exits: return, break, continue and raised errors

use std::sync::Arc;

use crate::error::{EnvironmentError, ErrorKind, RuntimeError};
use crate::value::{ErrorValue, Value};

/// Signal for non-local jumps.
///
/// Evaluation returns `Err(Signal)` for anything that is not a plain value.
/// Loops consume `Break`/`Continue`, calls consume `Return`, and `試す`
/// consumes `Error`. Whatever escapes to the top of a program is an
/// uncaught error (or the program's final `返す`).
#[derive(Debug, Clone)]
pub enum Signal {
    /// `返す` with its value
    Return(Value),

    /// `抜ける`
    Break,

    /// `次へ`
    Continue,

    /// A raised error
    Error(Arc<ErrorValue>),
}

impl Signal {
    /// Raise an unlocated error of `kind`.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Signal::Error(Arc::new(ErrorValue::new(kind, message)))
    }

    /// Shorthand for a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::TypeError, message)
    }

    /// Shorthand for a `ValueError`.
    pub fn value_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::ValueError, message)
    }

    /// The error carried by this signal, if it is one.
    pub fn as_error(&self) -> Option<&Arc<ErrorValue>> {
        match self {
            Signal::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Settle a signal that escaped a function or task body: `返す` yields
    /// its value, a stray loop exit yields `無`, errors stay errors.
    pub fn into_outcome(self) -> Result<Value, Arc<ErrorValue>> {
        match self {
            Signal::Return(v) => Ok(v),
            Signal::Break | Signal::Continue => Ok(Value::Null),
            Signal::Error(e) => Err(e),
        }
    }
}

impl From<ErrorValue> for Signal {
    fn from(e: ErrorValue) -> Self {
        Signal::Error(Arc::new(e))
    }
}

impl From<Arc<ErrorValue>> for Signal {
    fn from(e: Arc<ErrorValue>) -> Self {
        Signal::Error(e)
    }
}

impl From<EnvironmentError> for Signal {
    fn from(e: EnvironmentError) -> Self {
        match e {
            EnvironmentError::UndefinedVariable { name } => {
                Signal::error(ErrorKind::NameError, format!("未定義の名前です: {}", name))
            }
            EnvironmentError::ImmutableBinding { name } => {
                Signal::type_error(format!("定数 {} には再代入できません", name))
            }
        }
    }
}

/// Misuse of a concurrency primitive is a `ValueError`.
impl From<RuntimeError> for Signal {
    fn from(e: RuntimeError) -> Self {
        Signal::value_error(e.to_string())
    }
}

/// Convert a body's result into a call or task outcome.
pub fn settle(result: Result<Value, Signal>) -> Result<Value, Arc<ErrorValue>> {
    match result {
        Ok(v) => Ok(v),
        Err(signal) => signal.into_outcome(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_errors_map_to_kinds() {
        let undefined = Signal::from(EnvironmentError::UndefinedVariable {
            name: "x".to_string(),
        });
        assert_eq!(undefined.as_error().map(|e| e.kind), Some(ErrorKind::NameError));

        let immutable = Signal::from(EnvironmentError::ImmutableBinding {
            name: "x".to_string(),
        });
        assert_eq!(immutable.as_error().map(|e| e.kind), Some(ErrorKind::TypeError));
    }

    #[test]
    fn test_into_outcome() {
        assert!(matches!(
            Signal::Return(Value::Number(1.0)).into_outcome(),
            Ok(Value::Number(n)) if n == 1.0
        ));
        assert!(matches!(Signal::Break.into_outcome(), Ok(Value::Null)));
        assert!(Signal::value_error("x").into_outcome().is_err());
    }
}
