//! Generic poll-until-condition engine.
//!
//! Every wait-style operation in this crate (text on screen, app running,
//! device booted, emulator joined the device list) is an instantiation of
//! [`Poller::poll_until`]: invoke a predicate, and while it reports "not
//! yet", sleep a fixed interval and retry within a bounded attempt budget.
//!
//! The sleep is injectable via the [`Clock`] trait so polling logic is
//! deterministically testable without real wall-clock waits.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use adbpilot_core::poll::Poller;
//!
//! let poller = Poller::new();
//! let mut attempts = 0;
//! let found = poller
//!     .poll_until(Duration::ZERO, 5, || {
//!         attempts += 1;
//!         Ok::<bool, std::convert::Infallible>(attempts == 3)
//!     })
//!     .unwrap();
//! assert!(found);
//! assert_eq!(attempts, 3);
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Source of sleeps for the polling loop.
///
/// Production code uses [`SystemClock`]; tests inject a fake that records
/// requested sleeps instead of waiting.
pub trait Clock: Send + Sync {
    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Retries a predicate every `interval` until success or attempt exhaustion.
///
/// Attempts are strictly sequential on the calling thread; the engine never
/// spawns parallel pollers and never caches predicate results across
/// attempts. There is no cancellation primitive beyond attempt exhaustion:
/// callers needing early abort encode it in the predicate (for instance by
/// returning an error, which stops the poll immediately).
#[derive(Clone)]
pub struct Poller {
    clock: Arc<dyn Clock>,
}

impl Poller {
    /// Creates a poller that sleeps on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a poller with an injected clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Invokes `predicate` up to `max_attempts` times, sleeping `interval`
    /// between attempts.
    ///
    /// The first invocation is immediate; `max_attempts` counts total
    /// invocations, so `1` means no retry and `0` means the predicate is
    /// never invoked. No sleep follows the final attempt.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` on the first attempt where the predicate reports true
    /// - `Ok(false)` once attempts are exhausted — callers decide whether
    ///   exhaustion is an error
    /// - `Err(_)` as soon as the predicate fails hard; a transport fault is
    ///   never retried as if it were "not yet true"
    pub fn poll_until<E, F>(
        &self,
        interval: Duration,
        max_attempts: u32,
        mut predicate: F,
    ) -> Result<bool, E>
    where
        F: FnMut() -> Result<bool, E>,
    {
        for attempt in 0..max_attempts {
            if predicate()? {
                return Ok(true);
            }
            if attempt + 1 < max_attempts {
                self.clock.sleep(interval);
            }
        }
        Ok(false)
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Clock that records requested sleeps without waiting.
    #[derive(Default)]
    struct FakeClock {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl Clock for FakeClock {
        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn fake_poller() -> (Poller, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::default());
        (Poller::with_clock(clock.clone()), clock)
    }

    #[test]
    fn always_false_exhausts_exactly_max_attempts() {
        let (poller, clock) = fake_poller();
        let mut invocations = 0;

        let result = poller.poll_until(Duration::ZERO, 3, || {
            invocations += 1;
            Ok::<bool, std::convert::Infallible>(false)
        });

        assert_eq!(result, Ok(false));
        assert_eq!(invocations, 3);
        // No sleep after the final attempt.
        assert_eq!(clock.sleeps.lock().unwrap().len(), 2);
    }

    #[test]
    fn immediate_success_skips_sleep() {
        let (poller, clock) = fake_poller();

        let result = poller.poll_until(Duration::from_secs(10), 5, || {
            Ok::<bool, std::convert::Infallible>(true)
        });

        assert_eq!(result, Ok(true));
        assert!(clock.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn succeeds_partway_through_budget() {
        let (poller, clock) = fake_poller();
        let mut invocations = 0;

        let result = poller.poll_until(Duration::from_millis(100), 10, || {
            invocations += 1;
            Ok::<bool, std::convert::Infallible>(invocations == 4)
        });

        assert_eq!(result, Ok(true));
        assert_eq!(invocations, 4);
        assert_eq!(
            *clock.sleeps.lock().unwrap(),
            vec![Duration::from_millis(100); 3]
        );
    }

    #[test]
    fn single_attempt_means_no_retry() {
        let (poller, clock) = fake_poller();
        let mut invocations = 0;

        let result = poller.poll_until(Duration::from_secs(1), 1, || {
            invocations += 1;
            Ok::<bool, std::convert::Infallible>(false)
        });

        assert_eq!(result, Ok(false));
        assert_eq!(invocations, 1);
        assert!(clock.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn zero_attempts_never_invokes_predicate() {
        let (poller, _clock) = fake_poller();
        let mut invocations = 0;

        let result = poller.poll_until(Duration::ZERO, 0, || {
            invocations += 1;
            Ok::<bool, std::convert::Infallible>(true)
        });

        assert_eq!(result, Ok(false));
        assert_eq!(invocations, 0);
    }

    #[test]
    fn predicate_error_aborts_immediately() {
        let (poller, clock) = fake_poller();
        let mut invocations = 0;

        let result: Result<bool, &str> = poller.poll_until(Duration::from_secs(1), 5, || {
            invocations += 1;
            if invocations == 2 {
                Err("transport fault")
            } else {
                Ok(false)
            }
        });

        assert_eq!(result, Err("transport fault"));
        assert_eq!(invocations, 2);
        // Only the sleep between attempts 1 and 2 happened.
        assert_eq!(clock.sleeps.lock().unwrap().len(), 1);
    }

    #[test]
    fn predicate_reobserves_state_each_attempt() {
        let (poller, _clock) = fake_poller();
        let observations = Mutex::new(vec![false, false, true]);

        let result = poller.poll_until(Duration::ZERO, 5, || {
            let mut obs = observations.lock().unwrap();
            Ok::<bool, std::convert::Infallible>(obs.remove(0))
        });

        assert_eq!(result, Ok(true));
        assert!(observations.lock().unwrap().is_empty());
    }
}
