//! Bounded retry with error-class-aware backoff.
//!
//! Rate-limit errors back off from a long base delay that grows
//! geometrically. Everything else uses a short `2^attempt` backoff. Both
//! add uniform jitter. The engine does not know what it wraps, so it serves
//! model calls and plain network calls alike.

use crate::error::{DigestError, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Suspension point used for backoff and pacing.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Errors that expose a category name for classification.
pub trait Categorized {
    fn category(&self) -> &str;
}

impl Categorized for DigestError {
    fn category(&self) -> &str {
        DigestError::category(self)
    }
}

/// Backoff class chosen from an error's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    RateLimit,
    Standard,
}

impl ErrorClass {
    /// Classify by category name; anything naming a rate limit backs off long.
    pub fn classify(category: &str) -> Self {
        let normalized: String = category
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        if normalized.contains("ratelimit") {
            ErrorClass::RateLimit
        } else {
            ErrorClass::Standard
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per unit of work, including the first.
    pub max_retries: u32,
    /// Base delay in seconds for rate-limit errors.
    pub rate_limit_base_delay: f64,
    /// Growth factor applied per attempt to the rate-limit delay.
    pub backoff_multiplier: f64,
    /// Upper bound of the jitter added to rate-limit delays.
    pub rate_limit_jitter: f64,
    /// Upper bound of the jitter added to standard delays.
    pub standard_jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_base_delay: 60.0,
            backoff_multiplier: 1.5,
            rate_limit_jitter: 10.0,
            standard_jitter: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Same policy with a different attempt budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries < 1 {
            return Err(DigestError::Config(
                "retry.max_retries must be at least 1".to_string(),
            ));
        }
        let non_negative = [
            ("retry.rate_limit_base_delay", self.rate_limit_base_delay),
            ("retry.backoff_multiplier", self.backoff_multiplier),
            ("retry.rate_limit_jitter", self.rate_limit_jitter),
            ("retry.standard_jitter", self.standard_jitter),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(DigestError::Config(format!(
                    "{} must be a non-negative number (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Delay before the next attempt after a failure at zero-based `attempt`.
    pub fn delay_for<R: Rng + ?Sized>(
        &self,
        class: ErrorClass,
        attempt: u32,
        rng: &mut R,
    ) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let seconds = match class {
            ErrorClass::RateLimit => {
                self.rate_limit_base_delay * self.backoff_multiplier.powi(exponent)
                    + jitter(rng, self.rate_limit_jitter)
            }
            ErrorClass::Standard => 2f64.powi(exponent) + jitter(rng, self.standard_jitter),
        };
        Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX)
    }
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, range: f64) -> f64 {
    if range > 0.0 {
        rng.gen_range(0.0..range)
    } else {
        0.0
    }
}

/// Executes fallible operations under a [`RetryPolicy`].
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Retrier {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Same sleeper, different attempt budget.
    pub fn with_max_retries(&self, max_retries: u32) -> Self {
        Self {
            policy: self.policy.clone().with_max_retries(max_retries),
            sleeper: self.sleeper.clone(),
        }
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    ///
    /// The final error is returned unchanged; no sleep follows the last attempt.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Categorized + Display,
    {
        let max_retries = self.policy.max_retries.max(1);
        let mut attempt: u32 = 0;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            warn!(
                attempt = attempt + 1,
                max_retries,
                category = error.category(),
                error = %error,
                "Attempt failed"
            );

            if attempt + 1 >= max_retries {
                warn!(category = error.category(), "All retry attempts failed");
                return Err(error);
            }

            let class = ErrorClass::classify(error.category());
            let delay = self
                .policy
                .delay_for(class, attempt, &mut rand::thread_rng());
            info!(delay_secs = delay.as_secs_f64(), ?class, "Retrying after backoff");
            self.sleeper.sleep(delay).await;

            attempt += 1;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSleeper;
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn retrier(max_retries: u32) -> (Retrier, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let policy = RetryPolicy::default().with_max_retries(max_retries);
        (Retrier::new(policy, sleeper.clone()), sleeper)
    }

    #[test]
    fn test_classify() {
        assert_eq!(ErrorClass::classify("RateLimitError"), ErrorClass::RateLimit);
        assert_eq!(ErrorClass::classify("rate_limit_exceeded"), ErrorClass::RateLimit);
        assert_eq!(ErrorClass::classify("HttpError"), ErrorClass::Standard);
        assert_eq!(ErrorClass::classify(""), ErrorClass::Standard);
    }

    #[test]
    fn test_rate_limit_delay_exceeds_standard_delay() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);

        for attempt in 0..5 {
            let rate = policy.delay_for(ErrorClass::RateLimit, attempt, &mut rng);
            let standard = policy.delay_for(ErrorClass::Standard, attempt, &mut rng);
            assert!(
                rate > standard,
                "attempt {}: {:?} should exceed {:?}",
                attempt,
                rate,
                standard
            );
        }
    }

    #[test]
    fn test_delay_bounds() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(42);

        let rate = policy.delay_for(ErrorClass::RateLimit, 2, &mut rng).as_secs_f64();
        assert!((135.0..145.0).contains(&rate), "got {}", rate);

        let standard = policy.delay_for(ErrorClass::Standard, 3, &mut rng).as_secs_f64();
        assert!((8.0..9.0).contains(&standard), "got {}", standard);
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let policy = RetryPolicy {
            rate_limit_jitter: 0.0,
            standard_jitter: 0.0,
            ..RetryPolicy::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            policy.delay_for(ErrorClass::Standard, 0, &mut rng),
            Duration::from_secs(1)
        );
        assert_eq!(
            policy.delay_for(ErrorClass::RateLimit, 1, &mut rng),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy::default().with_max_retries(0).validate().is_err());
        let negative = RetryPolicy {
            standard_jitter: -1.0,
            ..RetryPolicy::default()
        };
        assert!(negative.validate().is_err());
    }

    #[tokio::test]
    async fn test_success_on_first_attempt_never_sleeps() {
        let (retrier, sleeper) = retrier(3);
        let calls = AtomicU32::new(0);

        let result: Result<&str> = retrier
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("done") }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sleeper.count(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_bounds_calls_and_sleeps() {
        for max_retries in 1..=4 {
            let (retrier, sleeper) = retrier(max_retries);
            let calls = AtomicU32::new(0);

            let result: Result<()> = retrier
                .execute(|| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move { Err(DigestError::Llm(format!("failure {}", n))) }
                })
                .await;

            assert_eq!(calls.load(Ordering::SeqCst), max_retries);
            assert_eq!(sleeper.count(), (max_retries - 1) as usize);
            // The error of the final attempt surfaces
            let err = result.unwrap_err();
            assert_eq!(err.to_string(), format!("LLM provider error: failure {}", max_retries - 1));
        }
    }

    #[tokio::test]
    async fn test_recovers_before_budget_is_spent() {
        let (retrier, sleeper) = retrier(3);
        let calls = AtomicU32::new(0);

        let result: Result<u32> = retrier
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(DigestError::Llm("transient".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(sleeper.count(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_errors_use_long_backoff() {
        let (retrier, sleeper) = retrier(2);

        let _: Result<()> = retrier
            .execute(|| async { Err(DigestError::RateLimited("429".into())) })
            .await;

        let sleeps = sleeper.sleeps.lock().unwrap();
        assert_eq!(sleeps.len(), 1);
        assert!(sleeps[0] >= Duration::from_secs(60));
    }
}
