//! Search API client

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use bqline_core::{ApiError, block_on, http_client, retry_through_rate_limits};
use serde::Deserialize;

use crate::credentials::Credentials;
use crate::oauth::{authorization_header, percent_encode};
use crate::poller::Cursor;
use crate::record::Tweet;

pub const SEARCH_URL: &str = "https://api.twitter.com/1.1/search/tweets.json";

/// Parameters that stay fixed for a whole polling run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub count: u32,
    pub lang: String,
}

impl SearchQuery {
    /// Query parameters for one page, most recent first, untruncated text
    pub fn params(&self, cursor: Cursor) -> Vec<(String, String)> {
        let mut params = vec![
            ("q".to_string(), self.query.clone()),
            ("count".to_string(), self.count.to_string()),
            ("result_type".to_string(), "recent".to_string()),
            ("tweet_mode".to_string(), "extended".to_string()),
            ("lang".to_string(), self.lang.clone()),
        ];
        if let Some(max_id) = cursor.max_id() {
            params.push(("max_id".to_string(), max_id.to_string()));
        }
        params
    }
}

/// A pageable keyword search.
pub trait SearchSource {
    /// One page of results older than `cursor` (newest first). Empty when
    /// the source has nothing more.
    fn search(&self, query: &SearchQuery, cursor: Cursor) -> Result<Vec<Tweet>>;
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    statuses: Vec<Tweet>,
}

/// Seconds until the epoch-seconds reset instant in `x-rate-limit-reset`
fn reset_wait(reset_header: Option<&str>, now: u64) -> Option<Duration> {
    let reset: u64 = reset_header?.trim().parse().ok()?;
    // One extra second so the window has really rolled over
    Some(Duration::from_secs(reset.saturating_sub(now) + 1))
}

/// OAuth 1.0a user-context client for the v1.1 search endpoint
pub struct TwitterClient {
    credentials: Credentials,
    url: String,
}

impl TwitterClient {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            url: SEARCH_URL.to_string(),
        }
    }

    fn fetch_page(&self, params: &[(String, String)]) -> Result<Vec<Tweet>, ApiError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let auth = authorization_header(
            &self.credentials,
            "GET",
            &self.url,
            params,
            &nonce,
            now as i64,
        );
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}?{query}", self.url);

        block_on(async {
            let resp = http_client()
                .get(&url)
                .header(reqwest::header::AUTHORIZATION, auth)
                .send()
                .await
                .map_err(|e| ApiError::from_reqwest(&e))?;
            let status = resp.status();
            if status.as_u16() == 429 {
                let reset = resp
                    .headers()
                    .get("x-rate-limit-reset")
                    .and_then(|v| v.to_str().ok());
                return Err(ApiError::RateLimited {
                    retry_after: reset_wait(reset, now),
                });
            }
            let body = resp.text().await.map_err(|e| ApiError::from_reqwest(&e))?;
            if !status.is_success() {
                return Err(ApiError::from_status(status.as_u16(), &body));
            }
            serde_json::from_str::<SearchResponse>(&body)
                .map(|r| r.statuses)
                .map_err(|e| ApiError::Decode(e.to_string()))
        })
    }
}

impl SearchSource for TwitterClient {
    fn search(&self, query: &SearchQuery, cursor: Cursor) -> Result<Vec<Tweet>> {
        let params = query.params(cursor);
        let label = format!("search {}", query.query);
        // A closed rate-limit window is waited out, however many times
        retry_through_rate_limits(&label, || self.fetch_page(&params))
            .with_context(|| format!("Search for {} failed", query.query))
    }
}
