//! Cross-thread signalling primitives
//!
//! The background threads of the executable share very little state: a stop event each and a
//! handful of scalar values published by a single writer. This module provides both.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A settable, waitable stop flag shared between threads.
///
/// Clones refer to the same underlying event.
#[derive(Clone, Default)]
pub struct StopEvent {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

/// An `f64` which can be written by one thread and read by many without a lock.
///
/// Each load and store is atomic on its own. Readers of several `AtomicF64`s may observe values
/// from different writer updates.
#[derive(Debug, Default)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StopEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event, waking every waiter.
    pub fn set(&self) {
        let (lock, cvar) = &*self.inner;
        let mut set = lock.lock().unwrap_or_else(|p| p.into_inner());
        *set = true;
        cvar.notify_all();
    }

    /// Returns true if the event has been set.
    pub fn is_set(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Wait until the event is set or the timeout elapses.
    ///
    /// Returns true if the event is set. This is the sleep used by every periodic background
    /// thread so that shutdown never waits a full period.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut set = lock.lock().unwrap_or_else(|p| p.into_inner());

        while !*set {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            set = match cvar.wait_timeout(set, deadline - now) {
                Ok((g, _)) => g,
                Err(p) => p.into_inner().0,
            };
        }

        *set
    }
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn test_stop_event_wakes_waiter() {
        let stop = StopEvent::new();
        let waiter = stop.clone();

        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(20));
        stop.set();

        assert!(handle.join().unwrap());
        assert!(stop.is_set());
    }

    #[test]
    fn test_stop_event_times_out() {
        let stop = StopEvent::new();
        let start = Instant::now();

        assert!(!stop.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_atomic_f64() {
        let a = AtomicF64::new(-1.0);
        assert_eq!(a.load(), -1.0);
        a.store(123.456);
        assert_eq!(a.load(), 123.456);
    }
}
