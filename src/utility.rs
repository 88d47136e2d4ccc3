//! Helpers shared by the runtime threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Sleep granularity of worker threads
pub const SLEEP_STEP: Duration = Duration::from_millis(500);

/// Lock `mutex`, recovering the data if another thread panicked while
/// holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sleep for `total` in steps of at most `step`, checking `running` between
/// steps.
///
/// Returns `false` as soon as `running` is cleared.
pub fn sleep_while_running(running: &AtomicBool, total: Duration, step: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if !running.load(Ordering::Relaxed) {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(step));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_sleep_completes() {
        let running = AtomicBool::new(true);
        let start = Instant::now();
        assert!(sleep_while_running(&running, Duration::from_millis(30), Duration::from_millis(10)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_sleep_returns_when_stopped() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        assert!(!sleep_while_running(&running, Duration::from_secs(10), SLEEP_STEP));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_sleep_observes_other_thread() {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            flag.store(false, Ordering::Relaxed);
        });
        let start = Instant::now();
        assert!(!sleep_while_running(&running, Duration::from_secs(10), Duration::from_millis(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        stopper.join().unwrap();
    }

    #[test]
    fn test_lock_recovers_from_poison() {
        let mutex = Arc::new(Mutex::new(1));
        let poisoner = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert_eq!(*lock(&mutex), 1);
    }
}
