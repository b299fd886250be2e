//! Bounded retry with exponential backoff and cooperative cancellation.

use crate::error::{CoreError, CoreResult};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration that retries without waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self::immediate(1)
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% jitter
            let jitter = delay_secs * 0.25 * rand_jitter();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out.
    ///
    /// `op` receives the 0-indexed attempt number. Only errors for which
    /// [`CoreError::is_retryable`] holds are retried; exhaustion yields
    /// [`CoreError::ConcurrencyExhausted`].
    pub fn run<T>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        mut op: impl FnMut(u32) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let attempts = self.max_attempts.max(1);
        for attempt in 0..attempts {
            cancel.sleep(self.delay_for_attempt(attempt))?;

            match op(attempt) {
                Err(err) if err.is_retryable() => {
                    tracing::debug!(operation, attempt, error = %err, "retrying after conflict");
                }
                other => return other,
            }
        }

        tracing::warn!(operation, attempts, "retries exhausted");
        Err(CoreError::ConcurrencyExhausted { attempts })
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Cheap pseudo-random jitter in `[0, 1)` without an RNG dependency.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// A cloneable handle used to cancel a long-running ledger operation.
///
/// Waiting on the token blocks on a condition variable, so `cancel` wakes
/// sleepers immediately.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<CancelState>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every operation holding a clone of this token.
    pub fn cancel(&self) {
        *self.state.cancelled.lock() = true;
        self.state.wake.notify_all();
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.state.cancelled.lock()
    }

    /// Waits for `duration` unless cancelled first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Cancelled`] if the token is or becomes cancelled.
    pub fn sleep(&self, duration: Duration) -> CoreResult<()> {
        let deadline = Instant::now() + duration;
        let mut cancelled = self.state.cancelled.lock();
        while !*cancelled {
            if self
                .state
                .wake
                .wait_until(&mut cancelled, deadline)
                .timed_out()
            {
                break;
            }
        }
        if *cancelled {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn retry_config_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.delay_for_attempt(1), Duration::ZERO);
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);

        let delay1 = config.delay_for_attempt(1);
        assert!(delay1 >= Duration::from_millis(100));
        assert!(delay1 <= Duration::from_millis(125));

        let delay2 = config.delay_for_attempt(2);
        assert!(delay2 >= Duration::from_millis(200));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0)
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(5));
    }

    #[test]
    fn run_retries_conflicts_only() {
        let config = RetryConfig::immediate(5);
        let cancel = CancellationToken::new();

        let mut calls = 0;
        let result = config.run(&cancel, "test", |attempt| {
            calls += 1;
            if attempt < 2 {
                Err(CoreError::conflict("doc"))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls, 3);

        let mut calls = 0;
        let result: CoreResult<()> = config.run(&cancel, "test", |_| {
            calls += 1;
            Err(CoreError::validation("bad"))
        });
        assert!(matches!(result, Err(CoreError::Validation { .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn run_exhausts() {
        let config = RetryConfig::immediate(5);
        let result: CoreResult<()> =
            config.run(&CancellationToken::new(), "test", |_| Err(CoreError::conflict("doc")));
        assert!(matches!(
            result,
            Err(CoreError::ConcurrencyExhausted { attempts: 5 })
        ));
    }

    #[test]
    fn cancelled_token_stops_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut called = false;
        let result: CoreResult<()> = RetryConfig::immediate(3).run(&cancel, "test", |_| {
            called = true;
            Ok(())
        });
        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert!(!called);
    }

    #[test]
    fn cancel_wakes_sleeper() {
        let cancel = CancellationToken::new();
        let sleeper = cancel.clone();

        let started = Instant::now();
        let handle = thread::spawn(move || sleeper.sleep(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        cancel.cancel();

        assert!(matches!(handle.join().unwrap(), Err(CoreError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
