//! Small concurrency helpers shared by the transport, adapter, and SMP
//! layers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

/// A value guarded by a mutex and paired with a condition variable, used
/// wherever spec.md calls for "a condition variable that wakes waiters"
/// (`cv_pairing_state_changed`, the command reply ring, the downgrade
/// ladder's terminal-state wait).
#[derive(Debug, Default)]
pub struct Condvar<T> {
    mtx: Mutex<T>,
    cv: parking_lot::Condvar,
}

impl<T> Condvar<T> {
    /// Creates a new guarded value.
    #[must_use]
    pub fn new(v: T) -> Self {
        Self {
            mtx: Mutex::new(v),
            cv: parking_lot::Condvar::new(),
        }
    }

    /// Locks the value without waiting.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.mtx.lock()
    }

    /// Wakes every thread blocked in [`Self::wait`] or [`Self::wait_timeout`].
    pub fn notify_all(&self) {
        self.cv.notify_all();
    }

    /// Blocks the calling thread until notified, re-acquiring the lock
    /// before returning.
    pub fn wait<'a>(&self, guard: &mut MutexGuard<'a, T>) {
        self.cv.wait(guard);
    }

    /// Blocks until notified or `timeout` elapses, returning whether a
    /// notification was observed (as opposed to a timeout).
    pub fn wait_timeout<'a>(&self, guard: &mut MutexGuard<'a, T>, timeout: Duration) -> bool {
        !self.cv.wait_for(guard, timeout).timed_out()
    }

    /// Blocks until `pred(&*guard)` holds or the deadline passes, returning
    /// whether the predicate was satisfied.
    pub fn wait_until(
        &self,
        deadline: Instant,
        mut pred: impl FnMut(&T) -> bool,
    ) -> MutexGuard<'_, T> {
        let mut guard = self.mtx.lock();
        while !pred(&guard) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.cv.wait_for(&mut guard, deadline - now);
        }
        guard
    }
}

/// Re-arming periodic timer, used for the SMP pairing watchdog (spec.md
/// §4.7). One instance per adapter. Runs its closure on a dedicated thread
/// until [`SimpleTimer::stop`] is called or the timer is dropped.
#[derive(Debug)]
pub struct SimpleTimer {
    stop: Arc<Condvar<bool>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl SimpleTimer {
    /// Starts a new timer that invokes `tick` every `period` until stopped.
    pub fn start(period: Duration, mut tick: impl FnMut() + Send + 'static) -> Self {
        let stop = Arc::new(Condvar::new(false));
        let stop2 = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("smp-watchdog".into())
            .spawn(move || loop {
                let guard = stop2.wait_until(Instant::now() + period, |stopped| *stopped);
                if *guard {
                    return;
                }
                drop(guard);
                tick();
            })
            .expect("failed to spawn timer thread");
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stops the timer and joins its thread.
    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        *self.stop.lock() = true;
        self.stop.notify_all();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for SimpleTimer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop_inner();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn timer_ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let timer = SimpleTimer::start(Duration::from_millis(5), move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(40));
        timer.stop();
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn condvar_wait_until_observes_predicate() {
        let cv = Arc::new(Condvar::new(0));
        let cv2 = Arc::clone(&cv);
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            *cv2.lock() = 42;
            cv2.notify_all();
        });
        let guard = cv.wait_until(Instant::now() + Duration::from_secs(1), |v| *v == 42);
        assert_eq!(*guard, 42);
        drop(guard);
        t.join().unwrap();
    }
}
