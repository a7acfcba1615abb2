//! One-shot promises
//!
//! A [`Promise`] moves from pending to fulfilled or rejected exactly once.
//! Waiters block on a condition variable; callbacks registered with
//! [`Promise::on_settle`] run on the settling thread after the state lock
//! is released, or immediately when the promise has already settled.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::cancel::CancelToken;
use super::pool;
use crate::value::{ErrorValue, Value};

/// How a task ended.
pub type Outcome = Result<Value, Arc<ErrorValue>>;

type Callback = Box<dyn FnOnce(&Outcome) + Send + 'static>;

/// How often a blocked worker looks for queued jobs to help with.
const HELP_INTERVAL: Duration = Duration::from_millis(2);

/// Observable state of a promise.
#[derive(Debug, Clone)]
pub enum PromiseState {
    /// Not settled yet
    Pending,
    /// Settled with a value
    Fulfilled(Value),
    /// Settled with an error
    Rejected(Arc<ErrorValue>),
}

impl PromiseState {
    /// The outcome, once settled.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            PromiseState::Pending => None,
            PromiseState::Fulfilled(v) => Some(Ok(v.clone())),
            PromiseState::Rejected(e) => Some(Err(Arc::clone(e))),
        }
    }

    /// Label returned by `p.状態`.
    pub fn label(&self) -> &'static str {
        match self {
            PromiseState::Pending => "待機中",
            PromiseState::Fulfilled(_) => "成功",
            PromiseState::Rejected(_) => "失敗",
        }
    }
}

struct Inner {
    state: PromiseState,
    callbacks: Vec<Callback>,
}

/// Result of an asynchronous computation.
pub struct Promise {
    inner: Mutex<Inner>,
    settled: Condvar,
    token: CancelToken,
}

impl Promise {
    /// A pending promise with a fresh cancellation token.
    pub fn new() -> Arc<Self> {
        Self::with_token(CancelToken::new())
    }

    /// A pending promise cancelled through `token`.
    pub fn with_token(token: CancelToken) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                state: PromiseState::Pending,
                callbacks: Vec::new(),
            }),
            settled: Condvar::new(),
            token,
        })
    }

    /// An already fulfilled promise.
    pub fn resolved(value: Value) -> Arc<Self> {
        let promise = Self::new();
        promise.fulfill(value);
        promise
    }

    /// An already rejected promise.
    pub fn rejected(error: Arc<ErrorValue>) -> Arc<Self> {
        let promise = Self::new();
        promise.reject(error);
        promise
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PromiseState {
        self.inner.lock().state.clone()
    }

    /// Whether the promise has settled.
    pub fn is_settled(&self) -> bool {
        !matches!(self.inner.lock().state, PromiseState::Pending)
    }

    /// The task's cancellation token.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Request cancellation of the task behind this promise.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    // ═══════════════════════════════════════════════════════════════════
    // Settling
    // ═══════════════════════════════════════════════════════════════════

    /// Settle with `outcome`. Returns `false` (and changes nothing) if the
    /// promise had already settled.
    pub fn settle(&self, outcome: Outcome) -> bool {
        let callbacks = {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, PromiseState::Pending) {
                return false;
            }
            inner.state = match &outcome {
                Ok(v) => PromiseState::Fulfilled(v.clone()),
                Err(e) => PromiseState::Rejected(Arc::clone(e)),
            };
            std::mem::take(&mut inner.callbacks)
        };
        self.settled.notify_all();
        for callback in callbacks {
            callback(&outcome);
        }
        true
    }

    /// Fulfil with `value`.
    pub fn fulfill(&self, value: Value) -> bool {
        self.settle(Ok(value))
    }

    /// Reject with `error`.
    pub fn reject(&self, error: Arc<ErrorValue>) -> bool {
        self.settle(Err(error))
    }

    /// Settle with `outcome`, following it when it holds another promise.
    pub fn adopt(self: &Arc<Self>, outcome: Outcome) {
        match outcome {
            Ok(Value::Promise(other)) if !Arc::ptr_eq(&other, self) => {
                let this = Arc::clone(self);
                other.on_settle(move |outcome| this.adopt(outcome.clone()));
            }
            outcome => {
                self.settle(outcome);
            }
        }
    }

    /// Run `callback` once the promise settles.
    pub fn on_settle(&self, callback: impl FnOnce(&Outcome) + Send + 'static) {
        let outcome = {
            let mut inner = self.inner.lock();
            match inner.state.outcome() {
                Some(outcome) => outcome,
                None => {
                    inner.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(&outcome);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Waiting
    // ═══════════════════════════════════════════════════════════════════

    /// Block until the promise settles or `timeout` elapses (`None` when it
    /// does). Pool workers run queued jobs while they wait.
    pub fn wait(&self, timeout: Option<Duration>) -> Option<Outcome> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let helping = pool::is_worker();
        let mut inner = self.inner.lock();
        loop {
            if let Some(outcome) = inner.state.outcome() {
                return Some(outcome);
            }
            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                return None;
            }

            if helping {
                let ran = parking_lot::MutexGuard::unlocked(&mut inner, pool::help);
                if ran {
                    continue;
                }
            }

            let slice = match (deadline, helping) {
                (Some(d), true) => (d - now).min(HELP_INTERVAL),
                (Some(d), false) => d - now,
                (None, true) => HELP_INTERVAL,
                (None, false) => {
                    self.settled.wait(&mut inner);
                    continue;
                }
            };
            self.settled.wait_for(&mut inner, slice);
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Combinators
    // ═══════════════════════════════════════════════════════════════════

    /// Fulfils with every value, in input order, once all fulfil; rejects
    /// with the first rejection.
    pub fn all(promises: Vec<Arc<Promise>>) -> Arc<Promise> {
        let combined = Promise::new();
        if promises.is_empty() {
            combined.fulfill(Value::array(Vec::new()));
            return combined;
        }

        let slots = Arc::new(Mutex::new(vec![Value::Null; promises.len()]));
        let remaining = Arc::new(AtomicUsize::new(promises.len()));
        for (i, promise) in promises.into_iter().enumerate() {
            let combined = Arc::clone(&combined);
            let slots = Arc::clone(&slots);
            let remaining = Arc::clone(&remaining);
            promise.on_settle(move |outcome| match outcome {
                Ok(value) => {
                    slots.lock()[i] = value.clone();
                    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                        let values = std::mem::take(&mut *slots.lock());
                        combined.fulfill(Value::array(values));
                    }
                }
                Err(e) => {
                    combined.reject(Arc::clone(e));
                }
            });
        }
        combined
    }

    /// Settles like the first input to settle.
    pub fn race(promises: Vec<Arc<Promise>>) -> Arc<Promise> {
        let combined = Promise::new();
        for promise in promises {
            let combined = Arc::clone(&combined);
            promise.on_settle(move |outcome| {
                combined.settle(outcome.clone());
            });
        }
        combined
    }
}

impl std::fmt::Debug for Promise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Promise({})", self.state().label())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::error::ErrorKind;

    fn err(message: &str) -> Arc<ErrorValue> {
        Arc::new(ErrorValue::new(ErrorKind::ValueError, message))
    }

    #[test]
    fn test_settles_once() {
        let p = Promise::new();
        assert!(p.fulfill(Value::Number(1.0)));
        assert!(!p.fulfill(Value::Number(2.0)));
        assert!(!p.reject(err("late")));
        assert!(matches!(p.state(), PromiseState::Fulfilled(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn test_wait_across_threads() {
        let p = Promise::new();
        let q = Arc::clone(&p);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            q.fulfill(Value::string("done"));
        });
        let outcome = p.wait(None).expect("no timeout");
        assert_eq!(outcome.ok(), Some(Value::string("done")));
    }

    #[test]
    fn test_wait_timeout() {
        let p = Promise::new();
        assert!(p.wait(Some(Duration::from_millis(5))).is_none());
        assert!(!p.is_settled());
    }

    #[test]
    fn test_on_settle_after_the_fact_runs_immediately() {
        let p = Promise::resolved(Value::Number(3.0));
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        p.on_settle(move |o| *s.lock() = o.clone().ok());
        assert_eq!(*seen.lock(), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_adopt_follows_inner_promise() {
        let inner = Promise::new();
        let outer = Promise::new();
        outer.adopt(Ok(Value::Promise(Arc::clone(&inner))));
        assert!(!outer.is_settled());
        inner.fulfill(Value::Number(7.0));
        assert!(matches!(outer.state(), PromiseState::Fulfilled(Value::Number(n)) if n == 7.0));
    }

    #[test]
    fn test_all_preserves_order_and_race_takes_first() {
        let a = Promise::new();
        let b = Promise::new();
        let all = Promise::all(vec![Arc::clone(&a), Arc::clone(&b)]);
        let race = Promise::race(vec![Arc::clone(&a), Arc::clone(&b)]);
        b.fulfill(Value::Number(2.0));
        a.fulfill(Value::Number(1.0));
        assert_eq!(
            all.wait(None).and_then(Result::ok),
            Some(Value::array(vec![Value::Number(1.0), Value::Number(2.0)]))
        );
        assert_eq!(race.wait(None).and_then(Result::ok), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_all_rejects_on_first_failure() {
        let a = Promise::new();
        let all = Promise::all(vec![Arc::clone(&a), Promise::new()]);
        a.reject(err("boom"));
        let outcome = all.wait(None).expect("settled");
        assert_eq!(outcome.err().map(|e| e.message.clone()), Some("boom".to_string()));
    }
}
