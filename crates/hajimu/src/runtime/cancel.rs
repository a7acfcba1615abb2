//! Cooperative cancellation
//!
//! Every task carries a [`CancelToken`]. Cancelling only raises the flag;
//! the task stops the next time it asks, through `キャンセル確認()` or
//! when it is awaited after the fact. The token of the task running on the
//! current thread is kept in a thread-local so builtins can find it.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

thread_local! {
    static CURRENT: RefCell<Option<CancelToken>> = const { RefCell::new(None) };
}

/// Run `f` with `token` as the current task's token, restoring the
/// previous one afterwards (worker threads nest tasks while helping).
pub fn with_token<R>(token: CancelToken, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<CancelToken>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            CURRENT.with(|cur| *cur.borrow_mut() = previous);
        }
    }

    let _restore = Restore(CURRENT.with(|cur| cur.replace(Some(token))));
    f()
}

/// Token of the task running on this thread, if any.
pub fn current_token() -> Option<CancelToken> {
    CURRENT.with(|cur| cur.borrow().clone())
}

/// Whether the task running on this thread has been cancelled. The main
/// program is never cancelled.
pub fn is_cancelled() -> bool {
    CURRENT.with(|cur| cur.borrow().as_ref().is_some_and(CancelToken::is_cancelled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_token_scopes_current() {
        assert!(!is_cancelled());
        let token = CancelToken::new();
        token.cancel();
        let inner = with_token(token, is_cancelled);
        assert!(inner);
        assert!(!is_cancelled());
        assert!(current_token().is_none());
    }
}
