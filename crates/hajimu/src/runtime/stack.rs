//! Evaluation stacks
//!
//! Evaluation recurses once per call, so a call depth of a thousand needs
//! far more stack than a default thread has. Every thread the runtime
//! starts gets [`WORKER_STACK_SIZE`]; host threads calling into the
//! interpreter are moved onto such a thread for the duration of the call.

use std::cell::Cell;
use std::io;
use std::panic;
use std::thread;

use super::cancel;
use super::pool::WORKER_STACK_SIZE;

thread_local! {
    static LARGE_STACK: Cell<bool> = const { Cell::new(false) };
}

/// Record that the current thread was started with [`WORKER_STACK_SIZE`].
pub(crate) fn mark_large_stack() {
    LARGE_STACK.with(|large| large.set(true));
}

/// Whether the current thread was started by the runtime.
pub fn on_large_stack() -> bool {
    LARGE_STACK.with(Cell::get)
}

/// Run `f` on a thread with a [`WORKER_STACK_SIZE`] stack, blocking until
/// it returns. Runs `f` in place when the current thread already has one.
/// The current task's cancel token follows `f`; a panic in `f` resumes on
/// the caller.
pub fn with_large_stack<R: Send>(f: impl FnOnce() -> R + Send) -> io::Result<R> {
    if on_large_stack() {
        return Ok(f());
    }
    let token = cancel::current_token();
    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("hajimu-eval".into())
            .stack_size(WORKER_STACK_SIZE)
            .spawn_scoped(scope, move || {
                mark_large_stack();
                match token {
                    Some(token) => cancel::with_token(token, f),
                    None => f(),
                }
            })?;
        match handle.join() {
            Ok(result) => Ok(result),
            Err(payload) => panic::resume_unwind(payload),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::CancelToken;

    #[test]
    fn test_host_thread_moves_to_large_stack() {
        assert!(!on_large_stack());
        let inside = with_large_stack(on_large_stack).unwrap();
        assert!(inside);
        assert!(!on_large_stack());
    }

    #[test]
    fn test_nested_call_stays_on_same_thread() {
        let same = with_large_stack(|| {
            let outer = thread::current().id();
            with_large_stack(|| thread::current().id() == outer).unwrap()
        })
        .unwrap();
        assert!(same);
    }

    #[test]
    fn test_cancel_token_follows_the_call() {
        let token = CancelToken::new();
        token.cancel();
        let seen = cancel::with_token(token, || with_large_stack(cancel::is_cancelled).unwrap());
        assert!(seen);
    }

    #[test]
    fn test_deep_recursion_fits() {
        fn depth(n: u32) -> u32 {
            let pad = std::hint::black_box([0u8; 512]);
            if n == 0 {
                u32::from(pad[0])
            } else {
                1 + depth(n - 1) + u32::from(pad[n as usize % 512])
            }
        }
        assert_eq!(with_large_stack(|| depth(20_000)).unwrap(), 20_000);
    }
}
