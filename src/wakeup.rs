//! Wakeup and cancellation primitives shared between the device and the pacer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, TryLockError};
use std::time::{Duration, Instant};

/// Auto-reset event fired by a device whenever it has consumed a period.
///
/// Clones share the same event. Any number of notifications between two waits
/// collapse into a single wakeup.
#[derive(Clone, Default)]
pub struct CapacitySignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CapacitySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark capacity as available and wake the waiting thread.
    pub fn notify(&self) {
        let (lock, cvar) = &*self.inner;
        let mut signalled = lock.lock().unwrap_or_else(|e| e.into_inner());
        *signalled = true;
        cvar.notify_one();
    }

    /// Like [`notify`](Self::notify), but never blocks.
    ///
    /// Returns `false`, dropping the wakeup, when another thread holds the
    /// lock. For real-time callbacks that fire again one period later.
    pub fn try_notify(&self) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut signalled = match lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        *signalled = true;
        cvar.notify_one();
        true
    }

    /// Block until notified or until `timeout` elapses.
    ///
    /// Returns `true` when a notification was consumed, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.inner;
        let mut signalled = lock.lock().unwrap_or_else(|e| e.into_inner());

        while !*signalled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            signalled = match cvar.wait_timeout(signalled, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }

        *signalled = false;
        true
    }
}

/// Cooperative stop request for a running session.
///
/// The pacer checks it after every wakeup and moves straight to draining once
/// it is set.
#[derive(Clone, Default, Debug)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn times_out_without_notification() {
        let signal = CapacitySignal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn pending_notification_is_consumed_once() {
        let signal = CapacitySignal::new();
        signal.notify();
        signal.notify();
        assert!(signal.wait_timeout(Duration::from_millis(1)));
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn wakes_from_another_thread() {
        let signal = CapacitySignal::new();
        let remote = signal.clone();
        let notifier = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            remote.notify();
        });
        assert!(signal.wait_timeout(Duration::from_secs(5)));
        notifier.join().unwrap();
    }

    #[test]
    fn try_notify_skips_while_locked() {
        let signal = CapacitySignal::new();
        {
            let _held = signal.inner.0.lock().unwrap();
            assert!(!signal.try_notify());
        }
        assert!(!signal.wait_timeout(Duration::from_millis(1)));

        assert!(signal.try_notify());
        assert!(signal.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn stop_handle_is_shared() {
        let handle = StopHandle::new();
        let remote = handle.clone();
        assert!(!handle.is_stopped());
        remote.stop();
        assert!(handle.is_stopped());
    }
}
