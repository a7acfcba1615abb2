//! Locks and counters exposed to programs
//!
//! These are blocking primitives built on `parking_lot`. They are not
//! scoped guards: programs lock and unlock explicitly, or use `排他`,
//! which releases on every exit path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex as RawMutex};

use crate::error::RuntimeError;

// ═══════════════════════════════════════════════════════════════════════
// Mutex
// ═══════════════════════════════════════════════════════════════════════

/// Non-reentrant mutual exclusion owned by a thread.
#[derive(Debug, Default)]
pub struct Mutex {
    owner: RawMutex<Option<ThreadId>>,
    released: Condvar,
}

impl Mutex {
    /// An unlocked mutex.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the mutex is acquired by the calling thread.
    ///
    /// # Errors
    ///
    /// `Relock` if the calling thread already holds it.
    pub fn lock(&self) -> Result<(), RuntimeError> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        if *owner == Some(me) {
            return Err(RuntimeError::Relock);
        }
        while owner.is_some() {
            self.released.wait(&mut owner);
        }
        *owner = Some(me);
        Ok(())
    }

    /// Acquire without blocking; `false` if another thread holds it.
    pub fn try_lock(&self) -> Result<bool, RuntimeError> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        match *owner {
            Some(holder) if holder == me => Err(RuntimeError::Relock),
            Some(_) => Ok(false),
            None => {
                *owner = Some(me);
                Ok(true)
            }
        }
    }

    /// Release the mutex held by the calling thread.
    pub fn unlock(&self) -> Result<(), RuntimeError> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        match *owner {
            None => Err(RuntimeError::NotHeld("ミューテックス")),
            Some(holder) if holder != me => Err(RuntimeError::NotOwner),
            Some(_) => {
                *owner = None;
                drop(owner);
                self.released.notify_one();
                Ok(())
            }
        }
    }

    /// Whether any thread holds the mutex.
    pub fn is_locked(&self) -> bool {
        self.owner.lock().is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// RwLock
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

#[derive(Debug, Default)]
struct RwState {
    readers: usize,
    writer: bool,
    /// Waiting requests in arrival order
    queue: VecDeque<(u64, Access)>,
    next_ticket: u64,
}

impl RwState {
    /// Whether the request `ticket` may proceed now. Requests are granted
    /// strictly in arrival order, so a waiting writer holds back readers
    /// that arrived after it.
    fn may_enter(&self, ticket: u64, access: Access) -> bool {
        if self.queue.front().map(|(t, _)| *t) != Some(ticket) {
            return false;
        }
        match access {
            Access::Read => !self.writer,
            Access::Write => !self.writer && self.readers == 0,
        }
    }
}

/// Readers-writer lock with first-come, first-served hand-off.
#[derive(Debug, Default)]
pub struct RwLock {
    state: RawMutex<RwState>,
    changed: Condvar,
}

impl RwLock {
    /// An unlocked lock.
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self, access: Access) {
        let mut state = self.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.queue.push_back((ticket, access));
        while !state.may_enter(ticket, access) {
            self.changed.wait(&mut state);
        }
        state.queue.pop_front();
        match access {
            Access::Read => state.readers += 1,
            Access::Write => state.writer = true,
        }
        drop(state);
        // The next queued reader may be able to join
        self.changed.notify_all();
    }

    /// Block until shared access is granted.
    pub fn read_lock(&self) {
        self.acquire(Access::Read);
    }

    /// Block until exclusive access is granted.
    pub fn write_lock(&self) {
        self.acquire(Access::Write);
    }

    /// Release shared access.
    pub fn read_unlock(&self) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        if state.readers == 0 {
            return Err(RuntimeError::NotHeld("読み取りロック"));
        }
        state.readers -= 1;
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    /// Release exclusive access.
    pub fn write_unlock(&self) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        if !state.writer {
            return Err(RuntimeError::NotHeld("書き込みロック"));
        }
        state.writer = false;
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    /// Current readers.
    pub fn readers(&self) -> usize {
        self.state.lock().readers
    }

    /// Whether a writer holds the lock.
    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Semaphore
// ═══════════════════════════════════════════════════════════════════════

/// Counting semaphore.
#[derive(Debug)]
pub struct Semaphore {
    permits: RawMutex<usize>,
    released: Condvar,
}

impl Semaphore {
    /// A semaphore with `permits` available.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: RawMutex::new(permits),
            released: Condvar::new(),
        }
    }

    /// Block until a permit is available and take it.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.released.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Take a permit if one is available.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Return a permit.
    pub fn release(&self) {
        *self.permits.lock() += 1;
        self.released.notify_one();
    }

    /// Permits currently available.
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Counters
// ═══════════════════════════════════════════════════════════════════════

/// Integer updated with atomic read-modify-write operations.
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicI64);

impl AtomicCounter {
    /// A counter starting at `value`.
    pub fn new(value: i64) -> Self {
        Self(AtomicI64::new(value))
    }

    /// Current value.
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    /// Replace the value.
    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Release);
    }

    /// Add `delta` and return the new value.
    pub fn add(&self, delta: i64) -> i64 {
        self.0.fetch_add(delta, Ordering::AcqRel).wrapping_add(delta)
    }

    /// Store `new` if the value is `expected`; report whether it was.
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.0
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Counter that threads can wait on until it returns to zero.
#[derive(Debug, Default)]
pub struct WaitGroup {
    count: RawMutex<i64>,
    zero: Condvar,
}

impl WaitGroup {
    /// A wait group at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust the counter by `delta`.
    ///
    /// # Errors
    ///
    /// `NegativeCounter` if the result would drop below zero; the counter
    /// is left unchanged.
    pub fn add(&self, delta: i64) -> Result<(), RuntimeError> {
        let mut count = self.count.lock();
        let next = *count + delta;
        if next < 0 {
            return Err(RuntimeError::NegativeCounter);
        }
        *count = next;
        if next == 0 {
            drop(count);
            self.zero.notify_all();
        }
        Ok(())
    }

    /// Decrement by one.
    pub fn done(&self) -> Result<(), RuntimeError> {
        self.add(-1)
    }

    /// Block until the counter is zero.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.zero.wait(&mut count);
        }
    }

    /// Current counter value.
    pub fn count(&self) -> i64 {
        *self.count.lock()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_mutex_relock_and_foreign_unlock() {
        let m = Arc::new(Mutex::new());
        m.lock().expect("lock");
        assert_eq!(m.lock(), Err(RuntimeError::Relock));
        assert_eq!(m.try_lock(), Err(RuntimeError::Relock));

        let other = Arc::clone(&m);
        let result = thread::spawn(move || other.unlock()).join().expect("thread");
        assert_eq!(result, Err(RuntimeError::NotOwner));

        m.unlock().expect("unlock");
        assert_eq!(m.unlock(), Err(RuntimeError::NotHeld("ミューテックス")));
    }

    #[test]
    fn test_mutex_excludes() {
        let m = Arc::new(Mutex::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&m);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..50 {
                        m.lock().expect("lock");
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                        m.unlock().expect("unlock");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread");
        }
    }

    #[test]
    fn test_rwlock_writer_excludes_readers() {
        let lock = Arc::new(RwLock::new());
        let writing = Arc::new(AtomicBool::new(false));
        let handles: Vec<_> = (0..6)
            .map(|i| {
                let lock = Arc::clone(&lock);
                let writing = Arc::clone(&writing);
                thread::spawn(move || {
                    for _ in 0..30 {
                        if i % 3 == 0 {
                            lock.write_lock();
                            assert_eq!(lock.readers(), 0);
                            writing.store(true, Ordering::SeqCst);
                            writing.store(false, Ordering::SeqCst);
                            lock.write_unlock().expect("write unlock");
                        } else {
                            lock.read_lock();
                            assert!(!writing.load(Ordering::SeqCst));
                            lock.read_unlock().expect("read unlock");
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread");
        }
        assert_eq!(lock.readers(), 0);
        assert!(!lock.is_write_locked());
    }

    #[test]
    fn test_rwlock_readers_share() {
        let lock = RwLock::new();
        lock.read_lock();
        lock.read_lock();
        assert_eq!(lock.readers(), 2);
        lock.read_unlock().expect("unlock");
        lock.read_unlock().expect("unlock");
        assert!(lock.read_unlock().is_err());
    }

    #[test]
    fn test_semaphore_counts() {
        let s = Semaphore::new(1);
        assert!(s.try_acquire());
        assert!(!s.try_acquire());
        s.release();
        assert_eq!(s.available(), 1);
    }

    #[test]
    fn test_atomic_counter() {
        let c = AtomicCounter::new(5);
        assert_eq!(c.add(3), 8);
        assert!(c.compare_and_set(8, 1));
        assert!(!c.compare_and_set(8, 2));
        assert_eq!(c.get(), 1);
    }

    #[test]
    fn test_wait_group() {
        let wg = Arc::new(WaitGroup::new());
        wg.add(2).expect("add");
        for _ in 0..2 {
            let wg = Arc::clone(&wg);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(5));
                wg.done().expect("done");
            });
        }
        wg.wait();
        assert_eq!(wg.count(), 0);
        assert_eq!(wg.done(), Err(RuntimeError::NegativeCounter));
    }
}
