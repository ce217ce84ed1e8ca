//! bqline Core - Common infrastructure for the bqline pipelines
//!
//! Shared HTTP client and runtime, retry policy, logging, progress
//! reporting and shutdown handling used by both the tweet relay and
//! the schema generator.

pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;

// Re-exports for convenience
pub use http::{ApiError, HttpConfig, block_on, http_client, http_config, set_http_config};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use retry::{backoff_duration, retry_through_rate_limits, retry_with_backoff};
pub use shutdown::{install_signal_handlers, is_shutdown_requested, request_shutdown};
