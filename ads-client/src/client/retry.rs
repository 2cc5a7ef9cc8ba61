//! Backoff between attempts to re-open the ADS stream.

use std::time::Duration;

use crate::error::{Error, Result};

/// Exponential backoff policy for re-opening a failed stream.
///
/// # Example
///
/// ```
/// use ads_client::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default()
///     .with_initial_backoff(Duration::from_millis(250)).unwrap()
///     .with_max_backoff(Duration::from_secs(10)).unwrap()
///     .with_max_attempts(Some(5));
/// assert_eq!(policy.backoff_duration(5), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry. Default: 1 second.
    pub initial_backoff: Duration,

    /// Upper bound for any single delay. Default: 30 seconds.
    pub max_backoff: Duration,

    /// Growth factor applied per failed attempt. Default: 2.0.
    pub backoff_multiplier: f64,

    /// Give up after this many consecutive failures. `None` retries forever.
    pub max_attempts: Option<usize>,
}

impl RetryPolicy {
    /// Create a new retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error if `initial_backoff` is zero, `backoff_multiplier` is
    /// below 1.0, or `max_backoff` is below `initial_backoff`.
    ///
    /// # Example
    ///
    /// ```
    /// use ads_client::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(Duration::from_millis(500), Duration::from_secs(60), 1.5)?;
    /// # Ok::<(), ads_client::Error>(())
    /// ```
    pub fn new(
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Result<Self> {
        let policy = Self {
            initial_backoff,
            max_backoff,
            backoff_multiplier,
            max_attempts: None,
        };
        policy.validate()?;
        Ok(policy)
    }

    fn validate(&self) -> Result<()> {
        if self.initial_backoff.is_zero() {
            return Err(Error::Validation(
                "initial_backoff must be greater than zero".into(),
            ));
        }
        if self.backoff_multiplier < 1.0 {
            let multiplier = self.backoff_multiplier;
            return Err(Error::Validation(format!(
                "backoff_multiplier must be >= 1.0, got {multiplier}"
            )));
        }
        if self.max_backoff < self.initial_backoff {
            let (initial, max) = (self.initial_backoff, self.max_backoff);
            return Err(Error::Validation(format!(
                "max_backoff ({max:?}) must be >= initial_backoff ({initial:?})"
            )));
        }
        Ok(())
    }

    /// Set the initial backoff duration.
    ///
    /// # Errors
    ///
    /// Returns an error if `duration` is zero or greater than `max_backoff`.
    pub fn with_initial_backoff(self, duration: Duration) -> Result<Self> {
        let policy = Self {
            initial_backoff: duration,
            ..self
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Set the maximum backoff duration.
    ///
    /// # Errors
    ///
    /// Returns an error if `duration` is less than `initial_backoff`.
    pub fn with_max_backoff(self, duration: Duration) -> Result<Self> {
        let policy = Self {
            max_backoff: duration,
            ..self
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Set the backoff multiplier.
    ///
    /// # Errors
    ///
    /// Returns an error if `multiplier` is less than 1.0.
    pub fn with_backoff_multiplier(self, multiplier: f64) -> Result<Self> {
        let policy = Self {
            backoff_multiplier: multiplier,
            ..self
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Set the maximum number of consecutive attempts. `None` retries forever.
    pub fn with_max_attempts(mut self, max_attempts: Option<usize>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before retry number `attempt` (0-indexed), or `None` once
    /// `max_attempts` is exhausted.
    ///
    /// ```
    /// use ads_client::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff_duration(0), Some(Duration::from_secs(1)));
    /// assert_eq!(policy.backoff_duration(2), Some(Duration::from_secs(4)));
    /// assert_eq!(policy.backoff_duration(10), Some(Duration::from_secs(30)));
    /// ```
    pub fn backoff_duration(&self, attempt: usize) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let backoff = self
            .initial_backoff
            .mul_f64(self.backoff_multiplier.powi(exponent).min(u32::MAX as f64));
        Some(backoff.min(self.max_backoff))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_attempts: None,
        }
    }
}

/// Tracks consecutive failures against a [`RetryPolicy`].
///
/// ```
/// use ads_client::{Backoff, RetryPolicy};
/// use std::time::Duration;
///
/// let mut backoff = Backoff::new(RetryPolicy::default());
/// assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(1)));
/// assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(2)));
/// backoff.reset();
/// assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(1)));
/// ```
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: usize,
}

impl Backoff {
    /// Create a new backoff calculator from a retry policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// The delay before the next attempt, advancing the failure count.
    ///
    /// Returns `None` once the policy's `max_attempts` is exhausted.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        let duration = self.policy.backoff_duration(self.attempt)?;
        self.attempt += 1;
        Some(duration)
    }

    /// Forget past failures, e.g. after a stream was opened successfully.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
