//! Tweet relay configuration

use std::path::PathBuf;

use serde::Deserialize;

use crate::credentials::SecretNames;

/// Runtime configuration for the tweet relay
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GCP project hosting secrets, topic, subscription and table
    pub project: String,
    /// Service-account key used for every GCP call
    pub key_file: PathBuf,
    /// Search query (hashtag or keyword)
    pub hashtag: String,
    /// Results requested per search page
    pub page_size: u32,
    /// Stop once this many records were fetched
    pub max_records: usize,
    /// Language filter passed to the search API
    pub lang: String,
    pub topic: String,
    pub subscription: String,
    pub dataset: String,
    pub table: String,
    /// Messages requested per pull while draining
    pub pull_batch: usize,
    /// Upper bound on pull rounds per drain
    pub max_drain_rounds: usize,
    pub secrets: SecretNames,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: "docker-build-new".to_string(),
            key_file: PathBuf::from("keys.json"),
            hashtag: "#IKEA".to_string(),
            page_size: 10,
            max_records: 100,
            lang: "en".to_string(),
            topic: "tweet_batch".to_string(),
            subscription: "bq_subscription".to_string(),
            dataset: "us_dataset".to_string(),
            table: "tweets_data".to_string(),
            pull_batch: 10,
            max_drain_rounds: 20,
            secrets: SecretNames::default(),
        }
    }
}
