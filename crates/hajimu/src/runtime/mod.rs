//! Concurrency runtime
//!
//! Everything a program can share between tasks: the worker pool and its
//! scheduler, promises, channels, locks, counters and OS threads. None of
//! it knows about evaluation; tasks are plain closures returning an
//! [`Outcome`].

mod cancel;
mod channel;
mod pool;
mod promise;
mod scheduler;
mod stack;
mod sync;
mod thread;

pub use cancel::{current_token, is_cancelled, with_token, CancelToken};
pub use channel::{select, Channel, SelectCase, Selected};
pub use pool::{ThreadPool, WORKER_STACK_SIZE};
pub use promise::{Outcome, Promise, PromiseState};
pub use scheduler::Scheduler;
pub use stack::{on_large_stack, with_large_stack};
pub use sync::{AtomicCounter, Mutex, RwLock, Semaphore, WaitGroup};
pub use thread::ThreadHandle;
