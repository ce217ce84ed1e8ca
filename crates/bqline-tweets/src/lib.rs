//! bqline Tweets - hashtag search relay into BigQuery
//!
//! Polls the search API page by page, publishes each page to a Pub/Sub
//! topic and drains the bound subscription into a BigQuery table.
//!
//! # Example
//!
//! ```no_run
//! use bqline_gcp::{BigQueryClient, GoogleAuth, PubSubClient, SecretManagerClient};
//! use bqline_tweets::{Config, run};
//!
//! let config = Config::default();
//! let auth = GoogleAuth::discover(Some(config.key_file.as_path())).unwrap();
//! let secrets = SecretManagerClient::new(&auth, &config.project);
//! let queue = PubSubClient::new(&auth, &config.project);
//! let warehouse = BigQueryClient::new(&auth);
//!
//! let summary = run(&config, &secrets, &queue, &warehouse, &Default::default())
//!     .expect("relay failed");
//! println!("Relayed {} records", summary.poll.records);
//! ```

pub mod config;
pub mod credentials;
pub mod oauth;
pub mod poller;
pub mod record;
pub mod relay;
pub mod runner;
pub mod search;

// Re-exports for convenience
pub use config::Config;
pub use credentials::{Credentials, SecretNames, load_credentials};
pub use poller::{Cursor, PollSummary, StopReason, poll};
pub use record::{Record, Tweet};
pub use relay::{DrainStats, Relay};
pub use runner::{RunSummary, run, run_with_source};
pub use search::{SearchQuery, SearchSource, TwitterClient};
