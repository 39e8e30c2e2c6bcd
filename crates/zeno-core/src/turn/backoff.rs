//! Retry pacing between attempts against the same model.

use std::future::Future;
use std::time::Duration;

/// Sleep abstraction so retry timing can be observed in tests.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

impl<T: Sleeper> Sleeper for std::sync::Arc<T> {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        (**self).sleep(duration)
    }
}

/// Real timer-backed sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Exponential backoff: attempt `n` (0-based) waits `base^n` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base_secs: f64,
}

impl Backoff {
    pub const DEFAULT_BASE_SECS: f64 = 1.5;

    /// A non-finite or negative base falls back to the default.
    pub fn new(base_secs: f64) -> Self {
        let base_secs = if base_secs.is_finite() && base_secs >= 0.0 {
            base_secs
        } else {
            Self::DEFAULT_BASE_SECS
        };
        Self { base_secs }
    }

    pub fn base_secs(&self) -> f64 {
        self.base_secs
    }

    /// Delay after the failed attempt with index `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        Duration::try_from_secs_f64(self.base_secs.powi(exponent)).unwrap_or(Duration::MAX)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_exponentially() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_millis(1500));
        assert_eq!(backoff.delay(2), Duration::from_millis(2250));
    }

    #[test]
    fn invalid_base_uses_default() {
        assert_eq!(Backoff::new(f64::NAN), Backoff::default());
        assert_eq!(Backoff::new(-2.0), Backoff::default());
        assert_eq!(Backoff::new(0.0).delay(3), Duration::ZERO);
    }

    #[test]
    fn huge_exponent_saturates() {
        assert_eq!(Backoff::new(10.0).delay(u32::MAX), Duration::MAX);
    }
}
