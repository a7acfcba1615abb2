//! Elastic worker pool
//!
//! Jobs go through one unbounded crossbeam queue. The pool keeps `core`
//! workers alive for its whole lifetime and adds an extra worker whenever
//! more jobs are queued than workers are idle, up to `max`. Extra workers exit after
//! sitting idle for [`IDLE_TIMEOUT`].
//!
//! A worker that blocks on a promise first drains queued jobs itself
//! ([`help`]), so a task awaiting work it spawned cannot starve the pool.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

/// Stack size of every worker; evaluation is recursive.
pub const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

/// How long an extra worker waits for a job before exiting.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on workers relative to the core count.
const MAX_WORKER_FACTOR: usize = 64;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    queue: Receiver<Job>,
    core: usize,
    max: usize,
    live: AtomicUsize,
    idle: AtomicUsize,
    spawned: AtomicUsize,
}

thread_local! {
    static WORKER_QUEUE: RefCell<Option<Receiver<Job>>> = const { RefCell::new(None) };
}

/// A growable pool of worker threads.
pub struct ThreadPool {
    jobs: Sender<Job>,
    state: Arc<PoolState>,
}

impl ThreadPool {
    /// Create a pool with `core` permanent workers. Threads start lazily
    /// on the first submitted job.
    pub fn new(core: usize) -> Self {
        let core = core.max(1);
        let (jobs, queue) = unbounded();
        Self {
            jobs,
            state: Arc::new(PoolState {
                queue,
                core,
                max: core * MAX_WORKER_FACTOR,
                live: AtomicUsize::new(0),
                idle: AtomicUsize::new(0),
                spawned: AtomicUsize::new(0),
            }),
        }
    }

    /// Queue `job`, adding a worker if the idle ones cannot take it.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        if self.jobs.send(Box::new(job)).is_err() {
            // The receiver lives in `state`, which we hold
            tracing::error!("worker queue disconnected");
            return;
        }
        let state = &self.state;
        if self.jobs.len() > state.idle.load(Ordering::Acquire)
            && state.live.load(Ordering::Acquire) < state.max
        {
            self.spawn_worker();
        }
    }

    /// Live worker threads.
    pub fn worker_count(&self) -> usize {
        self.state.live.load(Ordering::Acquire)
    }

    /// Jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.jobs.len()
    }

    fn spawn_worker(&self) {
        let state = Arc::clone(&self.state);
        let id = state.spawned.fetch_add(1, Ordering::AcqRel);
        let permanent = state.live.fetch_add(1, Ordering::AcqRel) < state.core;

        let spawned = thread::Builder::new()
            .name(format!("hajimu-worker-{}", id))
            .stack_size(WORKER_STACK_SIZE)
            .spawn({
                let state = Arc::clone(&state);
                move || {
                    super::stack::mark_large_stack();
                    worker_loop(state, permanent)
                }
            });
        match spawned {
            Ok(_) => tracing::debug!(worker = id, permanent, "spawned pool worker"),
            Err(e) => {
                state.live.fetch_sub(1, Ordering::AcqRel);
                tracing::warn!(error = %e, "could not spawn pool worker");
            }
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.worker_count())
            .field("queued", &self.queued())
            .finish()
    }
}

fn worker_loop(state: Arc<PoolState>, permanent: bool) {
    WORKER_QUEUE.with(|q| *q.borrow_mut() = Some(state.queue.clone()));

    loop {
        state.idle.fetch_add(1, Ordering::AcqRel);
        let next = if permanent {
            state.queue.recv().map_err(|_| RecvTimeoutError::Disconnected)
        } else {
            state.queue.recv_timeout(IDLE_TIMEOUT)
        };
        state.idle.fetch_sub(1, Ordering::AcqRel);

        match next {
            Ok(job) => run_job(job),
            Err(RecvTimeoutError::Timeout) => {
                tracing::trace!("idle pool worker exiting");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    state.live.fetch_sub(1, Ordering::AcqRel);
    WORKER_QUEUE.with(|q| *q.borrow_mut() = None);
}

fn run_job(job: Job) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(%message, "pool job panicked");
    }
}

/// Whether the current thread is a pool worker.
pub fn is_worker() -> bool {
    WORKER_QUEUE.with(|q| q.borrow().is_some())
}

/// Run one queued job on the current worker thread. Returns `false` when
/// this is not a worker or the queue is empty.
pub fn help() -> bool {
    let job = WORKER_QUEUE.with(|q| q.borrow().as_ref().and_then(|rx| rx.try_recv().ok()));
    match job {
        Some(job) => {
            run_job(job);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_jobs_run() {
        let pool = ThreadPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 20 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_pool_grows_when_workers_block() {
        let pool = ThreadPool::new(1);
        let release = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let release = Arc::clone(&release);
            let done = Arc::clone(&done);
            pool.submit(move || {
                while !release.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        // A fourth job must still run while the first three block
        let ran = Arc::new(AtomicBool::new(false));
        {
            let ran = Arc::clone(&ran);
            let release = Arc::clone(&release);
            pool.submit(move || {
                ran.store(true, Ordering::SeqCst);
                release.store(true, Ordering::SeqCst);
            });
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while done.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_help_outside_worker_is_noop() {
        assert!(!is_worker());
        assert!(!help());
    }
}
