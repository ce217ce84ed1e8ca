//! Shared HTTP client, tokio runtime and API error classification.
//!
//! Uses async reqwest internally but presents a sync interface: both
//! pipelines are strictly sequential, so every service call is a
//! `block_on` over the shared runtime.

use std::future::Future;
use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

/// Runtime HTTP settings (config file defaults, CLI overrides)
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    /// Whole-request timeout
    pub read_timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Retry attempts for retryable failures (429, 5xx, network)
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install HTTP settings. Only the first call wins; must run before the
/// first request so the shared client picks the timeouts up.
pub fn set_http_config(config: HttpConfig) {
    if HTTP_CONFIG.set(config).is_err() {
        log::debug!("HTTP config already set, ignoring override");
    }
}

/// Current HTTP settings (defaults if never set)
pub fn http_config() -> HttpConfig {
    HTTP_CONFIG.get().copied().unwrap_or_default()
}

/// Error types for remote API calls
#[derive(Debug)]
pub enum ApiError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// 429 with an optional server-provided wait
    RateLimited { retry_after: Option<Duration> },
    /// Response arrived but could not be decoded
    Decode(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::RateLimited {
                retry_after: Some(d),
            } => write!(f, "rate limited (reset in {}s)", d.as_secs()),
            Self::RateLimited { retry_after: None } => write!(f, "rate limited"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    /// Create error from a non-success status and its response body
    pub fn from_status(status: u16, body: &str) -> Self {
        if status == 429 {
            return Self::RateLimited { retry_after: None };
        }
        Self::Http {
            status: Some(status),
            message: summarize_body(body),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            // No status = connect/timeout failure
            Self::Http { status, .. } => {
                matches!(status, None | Some(408) | Some(429) | Some(500..=599))
            }
            Self::RateLimited { .. } => true,
            Self::Decode(_) => false,
        }
    }

    /// HTTP status code, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            Self::RateLimited { .. } => Some(429),
            Self::Decode(_) => None,
        }
    }
}

/// Keep error bodies short enough for a log line
fn summarize_body(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        return trimmed.to_string();
    }
    let mut end = MAX;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    let config = http_config();
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.read_timeout)
        .pool_max_idle_per_host(4)
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Drive a future to completion on the shared runtime.
pub fn block_on<F: Future>(future: F) -> F::Output {
    SHARED_RUNTIME.handle().block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_err(status: u16) -> ApiError {
        ApiError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn http_500_retryable() {
        assert!(http_err(500).is_retryable());
        assert!(http_err(503).is_retryable());
    }

    #[test]
    fn http_4xx_not_retryable() {
        assert!(!http_err(400).is_retryable());
        assert!(!http_err(403).is_retryable());
        assert!(!http_err(404).is_retryable());
    }

    #[test]
    fn http_none_status_retryable() {
        // Network error without status code should be retryable
        let err = ApiError::Http {
            status: None,
            message: "connection refused".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn from_status_429_is_rate_limited() {
        let err = ApiError::from_status(429, "slow down");
        assert!(matches!(err, ApiError::RateLimited { retry_after: None }));
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn decode_not_retryable() {
        assert!(!ApiError::Decode("bad json".into()).is_retryable());
    }

    #[test]
    fn from_status_truncates_long_body() {
        let body = "x".repeat(1000);
        match ApiError::from_status(500, &body) {
            ApiError::Http { message, .. } => {
                assert!(message.len() < 400);
                assert!(message.ends_with("..."));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn display_http_with_status() {
        assert_eq!(format!("{}", http_err(404)), "HTTP 404: test");
    }

    #[test]
    fn display_rate_limited() {
        let err = ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(15)),
        };
        assert_eq!(format!("{err}"), "rate limited (reset in 15s)");
    }

    #[test]
    fn block_on_drives_future_to_completion() {
        assert_eq!(block_on(async { 6 * 7 }), 42);
    }

    #[test]
    fn default_http_config() {
        let c = HttpConfig::default();
        assert_eq!(c.max_retries, 3);
        assert!(c.read_timeout > Duration::ZERO);
    }
}
