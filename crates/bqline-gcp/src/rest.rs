//! Authenticated REST calls with retry

use anyhow::{Context, Result};
use bqline_core::{ApiError, block_on, http_client, retry_with_backoff};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::auth::GoogleAuth;

/// Characters left unescaped in a single URL path segment / query value
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a value for use as one path segment or query value
/// (object names contain `/`, which must be escaped).
pub fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

/// Request body variants
pub enum Body<'a> {
    Empty,
    Json(&'a serde_json::Value),
    Bytes {
        data: Vec<u8>,
        content_type: &'a str,
    },
}

/// Send an authenticated request, retrying retryable failures.
///
/// Returns the raw response body on 2xx.
pub fn send(
    auth: &GoogleAuth,
    method: Method,
    url: &str,
    body: Body<'_>,
    label: &str,
) -> Result<Vec<u8>> {
    let token = auth.token()?;
    let bytes = retry_with_backoff(label, || {
        block_on(async {
            let mut req = http_client()
                .request(method.clone(), url)
                .bearer_auth(&token);
            req = match &body {
                Body::Empty => req,
                Body::Json(value) => req.json(value),
                Body::Bytes { data, content_type } => req
                    .header(reqwest::header::CONTENT_TYPE, *content_type)
                    .body(data.clone()),
            };
            let resp = req.send().await.map_err(|e| ApiError::from_reqwest(&e))?;
            let status = resp.status();
            let bytes = resp.bytes().await.map_err(|e| ApiError::from_reqwest(&e))?;
            if !status.is_success() {
                return Err(ApiError::from_status(
                    status.as_u16(),
                    &String::from_utf8_lossy(&bytes),
                ));
            }
            Ok(bytes.to_vec())
        })
    })
    .with_context(|| format!("{label} failed"))?;
    Ok(bytes)
}

/// Send a request and decode the JSON response.
pub fn send_json<T: DeserializeOwned>(
    auth: &GoogleAuth,
    method: Method,
    url: &str,
    body: Body<'_>,
    label: &str,
) -> Result<T> {
    let bytes = send(auth, method, url, body, label)?;
    // Some endpoints (acknowledge) answer with an empty body
    let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &bytes
    };
    serde_json::from_slice(bytes).with_context(|| format!("{label}: invalid JSON response"))
}
