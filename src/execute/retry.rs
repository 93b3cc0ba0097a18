//! Retry delay calculation

use rand::Rng;
use std::time::Duration;

use crate::config::ClientSettings;

/// Per-request overrides of the client's retry settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryOverrides {
    pub max_attempts: Option<u32>,
    pub min_backoff: Option<Duration>,
    pub max_backoff: Option<Duration>,
}

/// Attempt budget and jittered exponential delay.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    /// Fraction of the delay randomized either way (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl BackoffPolicy {
    pub fn from_settings(settings: &ClientSettings, overrides: RetryOverrides) -> Self {
        let min_backoff = overrides.min_backoff.unwrap_or(settings.min_backoff);
        let max_backoff = overrides.max_backoff.unwrap_or(settings.max_backoff).max(min_backoff);
        Self {
            max_attempts: overrides.max_attempts.unwrap_or(settings.max_attempts).max(1),
            min_backoff,
            max_backoff,
            jitter_factor: settings.jitter_factor.clamp(0.0, 1.0),
        }
    }

    /// Un-jittered delay before retry `attempt` (1-based): `min * 2^(attempt-1)`, capped.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let exp_backoff = self.min_backoff.as_secs_f64() * 2_f64.powi(exponent as i32);
        Duration::from_secs_f64(exp_backoff.min(self.max_backoff.as_secs_f64()))
    }

    /// `base_delay` with jitter, never above `max_backoff`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        let jitter_range = base * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let jittered = (base + jitter).clamp(0.0, self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(jittered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter_factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: 10,
            min_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(8),
            jitter_factor,
        }
    }

    #[test]
    fn test_base_delay_doubles_and_caps() {
        let p = policy(0.0);
        assert_eq!(p.base_delay(1), Duration::from_millis(250));
        assert_eq!(p.base_delay(2), Duration::from_millis(500));
        assert_eq!(p.base_delay(4), Duration::from_secs(2));
        assert_eq!(p.base_delay(6), Duration::from_secs(8));
        assert_eq!(p.base_delay(40), Duration::from_secs(8));
        assert_eq!(p.delay(3), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let p = policy(0.2);
        for _ in 0..100 {
            let d = p.delay(3);
            assert!(d >= Duration::from_millis(800) && d <= Duration::from_millis(1200));
            assert!(p.delay(10) <= Duration::from_secs(8));
        }
    }

    #[test]
    fn test_overrides_take_precedence() {
        let settings = ClientSettings::default();
        let p = BackoffPolicy::from_settings(
            &settings,
            RetryOverrides {
                max_attempts: Some(3),
                min_backoff: Some(Duration::from_millis(10)),
                max_backoff: None,
            },
        );
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.min_backoff, Duration::from_millis(10));
        assert_eq!(p.max_backoff, Duration::from_secs(8));
    }
}
