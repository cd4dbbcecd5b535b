//! Counting semaphore built on `Mutex` + `Condvar`.
//!
//! Waiters block on the condition variable; nothing here polls. Permits are
//! RAII values so a permit taken on a path that later unwinds is handed back
//! instead of leaking.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    // The counter is never held across foreign code, so poisoning can only
    // come from an unrelated panic and the count is still valid.
    fn count(&self) -> MutexGuard<'_, usize> {
        self.permits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until a permit is available and takes it.
    pub fn acquire(&self) -> Permit<'_> {
        let mut permits = self.count();
        while *permits == 0 {
            permits = self
                .available
                .wait(permits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
        Permit::new(self)
    }

    /// Takes a permit only if one is available right now.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut permits = self.count();
        if *permits == 0 {
            return None;
        }
        *permits -= 1;
        Some(Permit::new(self))
    }

    /// Waits at most `timeout` for a permit.
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<Permit<'_>> {
        let deadline = Instant::now() + timeout;
        let mut permits = self.count();
        while *permits == 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, _) = self
                .available
                .wait_timeout(permits, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            permits = guard;
        }
        *permits -= 1;
        Some(Permit::new(self))
    }

    /// Returns one permit and wakes a single waiter.
    pub fn release(&self) {
        let mut permits = self.count();
        *permits += 1;
        drop(permits);
        self.available.notify_one();
    }

    pub fn available(&self) -> usize {
        *self.count()
    }
}

/// A taken permit. Dropping it releases one permit to its target semaphore,
/// which starts out as the semaphore it was taken from.
#[derive(Debug)]
#[must_use = "dropping a permit releases it immediately"]
pub struct Permit<'a> {
    target: Option<&'a Semaphore>,
}

impl<'a> Permit<'a> {
    fn new(source: &'a Semaphore) -> Self {
        Self {
            target: Some(source),
        }
    }

    /// Release into `other` instead of the source semaphore on drop.
    pub fn redirect(&mut self, other: &'a Semaphore) {
        self.target = Some(other);
    }

    /// Consumes the permit without releasing it anywhere.
    pub fn forget(mut self) {
        self.target = None;
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            target.release();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_and_drop_restores_count() {
        let sem = Semaphore::new(2);
        let a = sem.acquire();
        let b = sem.acquire();
        assert_eq!(sem.available(), 0);
        drop(a);
        assert_eq!(sem.available(), 1);
        drop(b);
        assert_eq!(sem.available(), 2);
    }

    #[test]
    fn test_try_acquire_on_empty() {
        let sem = Semaphore::new(0);
        assert!(sem.try_acquire().is_none());
        sem.release();
        let permit = sem.try_acquire();
        assert!(permit.is_some());
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn test_forget_consumes_permit() {
        let sem = Semaphore::new(1);
        sem.acquire().forget();
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn test_redirect_moves_permit() {
        let from = Semaphore::new(1);
        let to = Semaphore::new(0);
        let mut permit = from.acquire();
        permit.redirect(&to);
        drop(permit);
        assert_eq!(from.available(), 0);
        assert_eq!(to.available(), 1);
    }

    #[test]
    fn test_acquire_timeout_expires() {
        let sem = Semaphore::new(0);
        let start = Instant::now();
        assert!(sem.acquire_timeout(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let sem = Arc::new(Semaphore::new(0));
        let acquired = Arc::new(AtomicBool::new(false));

        let waiter = {
            let sem = Arc::clone(&sem);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                sem.acquire().forget();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        sem.release();
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert_eq!(sem.available(), 0);
    }
}
