//! Task scheduling on the worker pool

use std::sync::Arc;
use std::time::Duration;

use super::cancel::{self, CancelToken};
use super::pool::ThreadPool;
use super::promise::{Outcome, Promise};

/// Runs tasks on a [`ThreadPool`] and hands back promises.
#[derive(Debug)]
pub struct Scheduler {
    pool: ThreadPool,
}

impl Scheduler {
    /// A scheduler with `workers` permanent pool threads.
    pub fn new(workers: usize) -> Self {
        Self {
            pool: ThreadPool::new(workers),
        }
    }

    /// Run `task` on the pool. The returned promise settles with its
    /// outcome; a task that itself returns a promise is followed.
    pub fn spawn(&self, task: impl FnOnce() -> Outcome + Send + 'static) -> Arc<Promise> {
        let token = CancelToken::new();
        let promise = Promise::with_token(token.clone());
        let settle = Arc::clone(&promise);
        self.pool.submit(move || {
            let outcome = cancel::with_token(token, task);
            settle.adopt(outcome);
        });
        promise
    }

    /// Run a job on the pool without a promise.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        self.pool.submit(job);
    }

    /// A promise fulfilled with `無` after `delay`, without tying up a worker.
    pub fn timer(&self, delay: Duration) -> Arc<Promise> {
        let promise = Promise::new();
        let settle = Arc::clone(&promise);
        let spawned = std::thread::Builder::new()
            .name("hajimu-timer".to_string())
            .spawn(move || {
                std::thread::sleep(delay);
                settle.fulfill(crate::value::Value::Null);
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "timer thread unavailable, sleeping on pool");
            let settle = Arc::clone(&promise);
            self.pool.submit(move || {
                std::thread::sleep(delay);
                settle.fulfill(crate::value::Value::Null);
            });
        }
        promise
    }

    /// Live worker threads.
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_spawn_settles_promise() {
        let scheduler = Scheduler::new(2);
        let p = scheduler.spawn(|| Ok(Value::Number(1.0)));
        assert_eq!(p.wait(None).and_then(Result::ok), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_nested_await_on_single_worker() {
        let scheduler = Arc::new(Scheduler::new(1));
        let inner_scheduler = Arc::clone(&scheduler);
        let outer = scheduler.spawn(move || {
            let inner = inner_scheduler.spawn(|| Ok(Value::Number(2.0)));
            inner.wait(None).unwrap_or(Ok(Value::Null))
        });
        assert_eq!(outer.wait(None).and_then(Result::ok), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_task_sees_its_cancel_token() {
        let scheduler = Scheduler::new(1);
        let p = scheduler.spawn(|| Ok(Value::Bool(cancel::current_token().is_some())));
        assert_eq!(p.wait(None).and_then(Result::ok), Some(Value::Bool(true)));
    }

    #[test]
    fn test_timer() {
        let scheduler = Scheduler::new(1);
        let p = scheduler.timer(Duration::from_millis(5));
        assert!(p.wait(Some(Duration::from_secs(5))).is_some());
    }
}
