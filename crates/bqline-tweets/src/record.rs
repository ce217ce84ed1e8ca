//! Search results and the rows relayed to BigQuery

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format of v1.1 search results, e.g. `Wed Oct 10 20:19:24 +0000 2018`
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// One search result as returned by the API (extended mode)
#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: u64,
    pub created_at: String,
    #[serde(alias = "text")]
    pub full_text: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: u64,
}

/// Row shape of the destination table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub hashtag: String,
    pub tweet_id: u64,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub user_id: u64,
}

pub fn parse_created_at(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(raw, CREATED_AT_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Unrecognized created_at timestamp: {raw}"))
}

impl Record {
    /// Normalize a search result, tagging it with the query that found it
    pub fn from_tweet(hashtag: &str, tweet: &Tweet) -> Result<Self> {
        Ok(Self {
            hashtag: hashtag.to_string(),
            tweet_id: tweet.id,
            created_at: parse_created_at(&tweet.created_at)
                .with_context(|| format!("tweet {}", tweet.id))?,
            text: tweet.full_text.clone(),
            user_id: tweet.user.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tweet(id: u64) -> Tweet {
        Tweet {
            id,
            created_at: "Wed Oct 10 20:19:24 +0000 2018".into(),
            full_text: "new shelves #IKEA".into(),
            user: User { id: 42 },
        }
    }

    #[test]
    fn parses_search_timestamp() {
        let dt = parse_created_at("Wed Oct 10 20:19:24 +0000 2018").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap());
    }

    #[test]
    fn rejects_unknown_timestamp() {
        assert!(parse_created_at("2018-10-10").is_err());
    }

    #[test]
    fn record_from_tweet() {
        let rec = Record::from_tweet("#IKEA", &tweet(1050118621198921728)).unwrap();
        assert_eq!(rec.hashtag, "#IKEA");
        assert_eq!(rec.tweet_id, 1050118621198921728);
        assert_eq!(rec.user_id, 42);
        assert_eq!(rec.text, "new shelves #IKEA");
    }

    #[test]
    fn record_serializes_with_table_columns() {
        let rec = Record::from_tweet("#IKEA", &tweet(7)).unwrap();
        let value = serde_json::to_value(&rec).unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["created_at", "hashtag", "text", "tweet_id", "user_id"]);
        assert_eq!(obj["created_at"], "2018-10-10T20:19:24Z");
    }

    #[test]
    fn tweet_accepts_compat_text_field() {
        let raw = r#"{"id": 1, "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                      "text": "short", "user": {"id": 2}}"#;
        let t: Tweet = serde_json::from_str(raw).unwrap();
        assert_eq!(t.full_text, "short");
    }
}
