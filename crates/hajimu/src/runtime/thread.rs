//! Dedicated OS threads (`スレッド作成` / `合流`)

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use super::cancel::{self, CancelToken};
use super::pool::WORKER_STACK_SIZE;
use super::promise::{Outcome, Promise};
use crate::error::{ErrorKind, RuntimeError};
use crate::value::ErrorValue;

/// A running or finished OS thread and the promise of its result.
pub struct ThreadHandle {
    promise: Arc<Promise>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadHandle {
    /// Start `body` on a new thread.
    pub fn spawn(
        name: &str,
        body: impl FnOnce() -> Outcome + Send + 'static,
    ) -> Result<Arc<Self>, RuntimeError> {
        let token = CancelToken::new();
        let promise = Promise::with_token(token.clone());
        let settle = Arc::clone(&promise);
        let handle = thread::Builder::new()
            .name(format!("hajimu-{}", name))
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                super::stack::mark_large_stack();
                let outcome = cancel::with_token(token, body);
                settle.settle(outcome);
            })
            .map_err(|e| RuntimeError::Spawn(e.to_string()))?;
        Ok(Arc::new(Self {
            promise,
            handle: Mutex::new(Some(handle)),
        }))
    }

    /// Promise settled with the thread's result.
    pub fn promise(&self) -> &Arc<Promise> {
        &self.promise
    }

    /// Wait for the thread to finish and return its result. Joining twice
    /// returns the same result.
    pub fn join(&self) -> Outcome {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                self.promise.reject(Arc::new(ErrorValue::new(
                    ErrorKind::ValueError,
                    "スレッドが異常終了しました",
                )));
            }
        }
        match self.promise.wait(None) {
            Some(outcome) => outcome,
            None => Err(Arc::new(ErrorValue::new(
                ErrorKind::TimeoutError,
                "スレッドの結果を取得できません",
            ))),
        }
    }

    /// Whether the thread has finished.
    pub fn is_finished(&self) -> bool {
        self.promise.is_settled()
    }
}

impl std::fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}
