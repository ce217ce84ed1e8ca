//! Secret Manager client

use anyhow::{Context, Result};
use base64::Engine;
use reqwest::Method;
use serde::Deserialize;

use crate::auth::GoogleAuth;
use crate::rest::{Body, send_json};

const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com/v1";

/// Read access to named secrets.
pub trait SecretStore {
    /// Latest version of `secret`, decoded as UTF-8 text
    fn access_latest(&self, secret: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct AccessResponse {
    payload: Payload,
}

#[derive(Deserialize)]
struct Payload {
    data: String,
}

/// Fully-qualified name of the latest version of a secret
pub fn latest_version_name(project: &str, secret: &str) -> String {
    format!("projects/{project}/secrets/{secret}/versions/latest")
}

/// Decode the base64 payload of an access response as UTF-8
fn decode_payload(data: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .context("Secret payload is not valid base64")?;
    String::from_utf8(bytes).context("Secret payload is not valid UTF-8")
}

/// Secret Manager v1 REST client
pub struct SecretManagerClient<'a> {
    auth: &'a GoogleAuth,
    project: String,
}

impl<'a> SecretManagerClient<'a> {
    pub fn new(auth: &'a GoogleAuth, project: impl Into<String>) -> Self {
        Self {
            auth,
            project: project.into(),
        }
    }
}

impl SecretStore for SecretManagerClient<'_> {
    fn access_latest(&self, secret: &str) -> Result<String> {
        let name = latest_version_name(&self.project, secret);
        let url = format!("{SECRET_MANAGER_URL}/{name}:access");
        let resp: AccessResponse = send_json(
            self.auth,
            Method::GET,
            &url,
            Body::Empty,
            &format!("secret {secret}"),
        )?;
        decode_payload(&resp.payload.data).with_context(|| format!("Cannot decode secret {secret}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_name_uses_latest_alias() {
        assert_eq!(
            latest_version_name("docker-build-new", "consumer_key"),
            "projects/docker-build-new/secrets/consumer_key/versions/latest"
        );
    }

    #[test]
    fn decode_payload_utf8() {
        // "s3cr3t-ü"
        assert_eq!(decode_payload("czNjcjN0LcO8").unwrap(), "s3cr3t-ü");
    }

    #[test]
    fn decode_payload_rejects_invalid_utf8() {
        // 0xff 0xfe
        assert!(decode_payload("//4=").is_err());
    }

    #[test]
    fn decode_payload_rejects_bad_base64() {
        assert!(decode_payload("***").is_err());
    }
}
