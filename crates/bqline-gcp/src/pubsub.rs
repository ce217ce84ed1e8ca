//! Pub/Sub client: publish, pull, acknowledge

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::auth::GoogleAuth;
use crate::rest::{Body, send_json};

const PUBSUB_URL: &str = "https://pubsub.googleapis.com/v1";

/// A pulled, not yet acknowledged message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub ack_id: String,
    pub message_id: String,
    pub data: Vec<u8>,
}

/// Topic/subscription operations the relay needs.
pub trait MessageQueue {
    /// Publish one message; returns the server-assigned message id once
    /// the publish is acknowledged.
    fn publish(&self, topic: &str, data: &[u8]) -> Result<String>;

    /// Pull up to `max_messages`; empty when nothing is outstanding.
    fn pull(&self, subscription: &str, max_messages: usize) -> Result<Vec<ReceivedMessage>>;

    fn acknowledge(&self, subscription: &str, ack_ids: &[String]) -> Result<()>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<WireReceived>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceived {
    ack_id: String,
    message: WireMessage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message_id: String,
}

fn decode_pull(resp: PullResponse) -> Result<Vec<ReceivedMessage>> {
    resp.received_messages
        .into_iter()
        .map(|m| {
            let data = match m.message.data {
                Some(b64) => STANDARD
                    .decode(b64)
                    .with_context(|| format!("message {} has invalid base64 data", m.message.message_id))?,
                None => Vec::new(),
            };
            Ok(ReceivedMessage {
                ack_id: m.ack_id,
                message_id: m.message.message_id,
                data,
            })
        })
        .collect()
}

/// Pub/Sub v1 REST client bound to one project
pub struct PubSubClient<'a> {
    auth: &'a GoogleAuth,
    project: String,
}

impl<'a> PubSubClient<'a> {
    pub fn new(auth: &'a GoogleAuth, project: impl Into<String>) -> Self {
        Self {
            auth,
            project: project.into(),
        }
    }

    pub fn topic_path(&self, topic: &str) -> String {
        format!("projects/{}/topics/{topic}", self.project)
    }

    pub fn subscription_path(&self, subscription: &str) -> String {
        format!("projects/{}/subscriptions/{subscription}", self.project)
    }
}

impl MessageQueue for PubSubClient<'_> {
    fn publish(&self, topic: &str, data: &[u8]) -> Result<String> {
        let url = format!("{PUBSUB_URL}/{}:publish", self.topic_path(topic));
        let body = json!({ "messages": [{ "data": STANDARD.encode(data) }] });
        let resp: PublishResponse = send_json(
            self.auth,
            Method::POST,
            &url,
            Body::Json(&body),
            &format!("publish to {topic}"),
        )?;
        resp.message_ids
            .into_iter()
            .next()
            .with_context(|| format!("publish to {topic} returned no message id"))
    }

    fn pull(&self, subscription: &str, max_messages: usize) -> Result<Vec<ReceivedMessage>> {
        let url = format!("{PUBSUB_URL}/{}:pull", self.subscription_path(subscription));
        let body = json!({ "maxMessages": max_messages });
        let resp: PullResponse = send_json(
            self.auth,
            Method::POST,
            &url,
            Body::Json(&body),
            &format!("pull from {subscription}"),
        )?;
        decode_pull(resp)
    }

    fn acknowledge(&self, subscription: &str, ack_ids: &[String]) -> Result<()> {
        if ack_ids.is_empty() {
            return Ok(());
        }
        let url = format!(
            "{PUBSUB_URL}/{}:acknowledge",
            self.subscription_path(subscription)
        );
        let body = json!({ "ackIds": ack_ids });
        let _: serde_json::Value = send_json(
            self.auth,
            Method::POST,
            &url,
            Body::Json(&body),
            &format!("acknowledge on {subscription}"),
        )?;
        Ok(())
    }
}
