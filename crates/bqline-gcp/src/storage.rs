//! Cloud Storage client: media download and upload

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::Method;

use crate::auth::GoogleAuth;
use crate::rest::{Body, encode_segment, send};

const STORAGE_URL: &str = "https://storage.googleapis.com/storage/v1";
const UPLOAD_URL: &str = "https://storage.googleapis.com/upload/storage/v1";

/// Object storage operations the schema generator needs.
pub trait ObjectStorage {
    /// Download `bucket/object` into the local file `dest`
    fn download(&self, bucket: &str, object: &str, dest: &Path) -> Result<()>;

    /// Upload the local file `src` as `bucket/object`
    fn upload_file(&self, bucket: &str, object: &str, src: &Path) -> Result<()> {
        let data =
            std::fs::read(src).with_context(|| format!("Cannot read {}", src.display()))?;
        self.write_object(bucket, object, data, "application/octet-stream")
    }

    /// Write `data` as `bucket/object` in a single request
    fn write_object(
        &self,
        bucket: &str,
        object: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

pub fn object_url(bucket: &str, object: &str) -> String {
    format!(
        "{STORAGE_URL}/b/{}/o/{}?alt=media",
        encode_segment(bucket),
        encode_segment(object)
    )
}

pub fn upload_url(bucket: &str, object: &str) -> String {
    format!(
        "{UPLOAD_URL}/b/{}/o?uploadType=media&name={}",
        encode_segment(bucket),
        encode_segment(object)
    )
}

/// Cloud Storage JSON API client
pub struct GcsClient<'a> {
    auth: &'a GoogleAuth,
}

impl<'a> GcsClient<'a> {
    pub fn new(auth: &'a GoogleAuth) -> Self {
        Self { auth }
    }
}

impl ObjectStorage for GcsClient<'_> {
    fn download(&self, bucket: &str, object: &str, dest: &Path) -> Result<()> {
        let data = send(
            self.auth,
            Method::GET,
            &object_url(bucket, object),
            Body::Empty,
            &format!("download gs://{bucket}/{object}"),
        )?;
        std::fs::write(dest, &data).with_context(|| format!("Cannot write {}", dest.display()))?;
        log::debug!(
            "Downloaded gs://{bucket}/{object} ({} bytes) to {}",
            data.len(),
            dest.display()
        );
        Ok(())
    }

    fn write_object(
        &self,
        bucket: &str,
        object: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let len = data.len();
        send(
            self.auth,
            Method::POST,
            &upload_url(bucket, object),
            Body::Bytes { data, content_type },
            &format!("upload gs://{bucket}/{object}"),
        )?;
        log::debug!("Uploaded gs://{bucket}/{object} ({len} bytes)");
        Ok(())
    }
}
