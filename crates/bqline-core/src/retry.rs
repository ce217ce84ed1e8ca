//! Retry with exponential backoff for remote API calls

use std::time::Duration;

use crate::http::{ApiError, http_config};
use crate::shutdown::is_shutdown_requested;

/// Exponential backoff: 2^attempt seconds (2s, 4s, 8s, ...)
pub const fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// Retry a fallible API call with exponential backoff.
///
/// Rate-limited errors carrying a reset hint sleep for that long instead
/// of the backoff. Retries up to `max_retries` (from global [`HttpConfig`]).
///
/// Returns `Ok(T)` on first success, or the final `Err` on exhaustion / non-retryable error.
///
/// [`HttpConfig`]: crate::http::HttpConfig
pub fn retry_with_backoff<T>(
    label: &str,
    attempt_fn: impl FnMut() -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    retry_with(
        label,
        http_config().max_retries,
        RateLimitWaits::Counted,
        std::thread::sleep,
        attempt_fn,
    )
}

/// Like [`retry_with_backoff`], but a rate limit that names its reset time
/// is waited out without using up a retry. Waiting stops once shutdown is
/// requested.
pub fn retry_through_rate_limits<T>(
    label: &str,
    attempt_fn: impl FnMut() -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    retry_with(
        label,
        http_config().max_retries,
        RateLimitWaits::Free,
        std::thread::sleep,
        attempt_fn,
    )
}

/// Whether hinted rate-limit waits use up retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RateLimitWaits {
    Counted,
    Free,
}

/// Retry loop with injectable sleep (tests pass a no-op)
pub(crate) fn retry_with<T>(
    label: &str,
    max_retries: u32,
    waits: RateLimitWaits,
    mut sleep: impl FnMut(Duration),
    mut attempt_fn: impl FnMut() -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(ApiError::RateLimited {
                retry_after: Some(wait),
            }) if waits == RateLimitWaits::Free && !is_shutdown_requested() => {
                log::warn!("{label}: rate limited, waiting {wait:?} for the window to reset");
                sleep(wait);
            }
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                let delay = match &e {
                    ApiError::RateLimited {
                        retry_after: Some(d),
                    } => *d,
                    _ => backoff_duration(attempt),
                };
                log::warn!("{label}: attempt {attempt}/{max_retries} failed: {e}, retry in {delay:?}");
                sleep(delay);
            }
            Err(e) => {
                log::error!("{label}: failed permanently: {e}");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_exponential() {
        assert_eq!(backoff_duration(1), Duration::from_secs(2));
        assert_eq!(backoff_duration(2), Duration::from_secs(4));
        assert_eq!(backoff_duration(3), Duration::from_secs(8));
    }

    #[test]
    fn retries_until_success() {
        let mut calls = 0;
        let mut slept = Vec::new();
        let result = retry_with(
            "test",
            3,
            RateLimitWaits::Counted,
            |d| slept.push(d),
            || {
                calls += 1;
                if calls < 3 {
                    Err(ApiError::from_status(503, "unavailable"))
                } else {
                    Ok(calls)
                }
            },
        );
        assert_eq!(result.unwrap(), 3);
        assert_eq!(slept, vec![Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[test]
    fn non_retryable_fails_immediately() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with(
            "test",
            3,
            RateLimitWaits::Counted,
            |_| {},
            || {
                calls += 1;
                Err(ApiError::from_status(404, "missing"))
            },
        );
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with(
            "test",
            2,
            RateLimitWaits::Counted,
            |_| {},
            || {
                calls += 1;
                Err(ApiError::from_status(500, "boom"))
            },
        );
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn rate_limit_uses_reset_hint() {
        let mut slept = Vec::new();
        let mut first = true;
        let result = retry_with(
            "test",
            1,
            RateLimitWaits::Counted,
            |d| slept.push(d),
            || {
                if std::mem::take(&mut first) {
                    Err(ApiError::RateLimited {
                        retry_after: Some(Duration::from_secs(42)),
                    })
                } else {
                    Ok(())
                }
            },
        );
        assert!(result.is_ok());
        assert_eq!(slept, vec![Duration::from_secs(42)]);
    }

    #[test]
    fn free_rate_limit_waits_do_not_use_retries() {
        let mut calls = 0;
        let mut slept = Vec::new();
        let result = retry_with(
            "test",
            3,
            RateLimitWaits::Free,
            |d| slept.push(d),
            || {
                calls += 1;
                if calls <= 5 {
                    Err(ApiError::RateLimited {
                        retry_after: Some(Duration::from_secs(60)),
                    })
                } else {
                    Ok(calls)
                }
            },
        );
        assert_eq!(result.unwrap(), 6);
        assert_eq!(slept, vec![Duration::from_secs(60); 5]);
    }

    #[test]
    fn unhinted_rate_limit_still_counts() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with(
            "test",
            2,
            RateLimitWaits::Free,
            |_| {},
            || {
                calls += 1;
                Err(ApiError::RateLimited { retry_after: None })
            },
        );
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn counted_rate_limit_waits_exhaust_retries() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with(
            "test",
            3,
            RateLimitWaits::Counted,
            |_| {},
            || {
                calls += 1;
                Err(ApiError::RateLimited {
                    retry_after: Some(Duration::from_secs(60)),
                })
            },
        );
        assert!(matches!(result, Err(ApiError::RateLimited { .. })));
        assert_eq!(calls, 4);
    }
}
