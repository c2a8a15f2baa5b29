//! Durable storage adapter.
//!
//! Uploads media with a plain HTTP `PUT` to an object-storage endpoint (S3
//! presigned/public-write buckets, R2, MinIO, a CDN origin) and hands back the
//! public URL the object will be served from.

use std::time::Duration;

use async_trait::async_trait;

use attache_core::{errors::Error, ports::DurableUploader, Result};

#[derive(Clone, Debug)]
pub struct HttpUploader {
    upload_base: String,
    public_base: String,
    auth_token: Option<String>,
    http: reqwest::Client,
}

impl HttpUploader {
    pub fn new(
        upload_base: impl Into<String>,
        public_base: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("storage http client: {e}")))?;
        Ok(Self {
            upload_base: trim_base(upload_base.into()),
            public_base: trim_base(public_base.into()),
            auth_token,
            http,
        })
    }

    pub fn upload_url(&self, filename: &str) -> String {
        format!("{}/{}", self.upload_base, filename)
    }

    pub fn public_url(&self, filename: &str) -> String {
        format!("{}/{}", self.public_base, filename)
    }
}

#[async_trait]
impl DurableUploader for HttpUploader {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<String> {
        let content_type = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .to_string();
        let len = bytes.len();

        let mut req = self
            .http
            .put(self.upload_url(filename))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Storage(format!("upload request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Storage(format!(
                "upload failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        tracing::debug!(filename, bytes = len, "uploaded to durable storage");
        Ok(self.public_url(filename))
    }
}

/// Uploader used when no durable storage is configured.
///
/// Every upload fails, so resolved attachments keep their origin URL and the
/// platform's short TTL.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledUploader;

#[async_trait]
impl DurableUploader for DisabledUploader {
    async fn upload(&self, _bytes: Vec<u8>, filename: &str) -> Result<String> {
        Err(Error::Storage(format!(
            "durable storage not configured; {filename} not uploaded"
        )))
    }
}

fn trim_base(s: String) -> String {
    s.trim_end_matches('/').to_string()
}
