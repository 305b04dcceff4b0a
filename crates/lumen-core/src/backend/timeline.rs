use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Monotonic completion value of a fence, with blocking waits.
#[derive(Debug, Default)]
pub(crate) struct FenceTimeline {
    completed: Mutex<u64>,
    cond: Condvar,
}

impl FenceTimeline {
    pub(crate) fn completed(&self) -> u64 {
        *self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn complete(&self, value: u64) {
        let mut done = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        if value > *done {
            *done = value;
            self.cond.notify_all();
        }
    }

    /// Returns `false` if `timeout` expired before `value` completed.
    pub(crate) fn wait(&self, value: u64, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut done = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        while *done < value {
            match deadline {
                None => {
                    done = self.cond.wait(done).unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    done = self
                        .cond
                        .wait_timeout(done, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn completion_is_monotonic() {
        let t = FenceTimeline::default();
        t.complete(5);
        t.complete(3);
        assert_eq!(t.completed(), 5);
    }

    #[test]
    fn zero_timeout_on_pending_value_expires() {
        let t = FenceTimeline::default();
        assert!(!t.wait(1, Some(Duration::ZERO)));
        assert!(t.wait(0, Some(Duration::ZERO)));
    }

    #[test]
    fn wait_wakes_on_completion() {
        let t = Arc::new(FenceTimeline::default());
        let signaler = Arc::clone(&t);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            signaler.complete(2);
        });
        assert!(t.wait(2, Some(Duration::from_secs(5))));
        handle.join().unwrap();
    }
}
