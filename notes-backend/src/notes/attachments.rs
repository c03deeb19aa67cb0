//! Attachment store — note images in the managed object-storage service.
//!
//! Every image lives under a single fixed path prefix. Filenames are
//! validated before any storage call so a form upload can never address
//! objects outside the album prefix.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::telemetry::{OpOutcome, OpsSink};

/// The one path prefix used for upload, URL resolution, and removal.
pub const ATTACHMENT_PREFIX: &str = "public/album/2024";

/// Storage path for an attachment filename: `<prefix>/<filename>`.
pub fn object_path(filename: &str) -> String {
    format!("{}/{}", ATTACHMENT_PREFIX, filename)
}

/// Reject filenames that could escape the album prefix or collide with
/// hidden objects.
pub fn validate_filename(filename: &str) -> Result<(), String> {
    if filename.is_empty() {
        return Err("Attachment filename is empty".to_string());
    }
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(format!("Invalid attachment filename: {}", filename));
    }
    if filename.starts_with('.') {
        return Err(format!("Invalid attachment filename: {}", filename));
    }
    Ok(())
}

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store the file bytes at the conventioned path.
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<(), String>;
    /// Produce a time-limited fetchable URL for the stored file.
    async fn resolve_url(&self, filename: &str) -> Result<String, String>;
    /// Delete the stored file.
    async fn remove(&self, filename: &str) -> Result<(), String>;
}

pub struct HttpObjectStore {
    base_url: String,
    client: reqwest::Client,
    ops: Arc<dyn OpsSink>,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, ops: Arc<dyn OpsSink>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            ops,
        }
    }

    /// URL of an object endpoint, with each path segment percent-encoded.
    fn object_url(&self, filename: &str) -> String {
        let encoded: Vec<String> = object_path(filename)
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/objects/{}", self.base_url, encoded.join("/"))
    }

    fn report(&self, op: &str, filename: &str, result: &Result<(), String>) {
        match result {
            Ok(()) => self
                .ops
                .event(op, OpOutcome::Ok, &format!("path={}", object_path(filename))),
            Err(e) => self.ops.event(
                op,
                OpOutcome::Failed,
                &format!("path={} error={}", object_path(filename), e),
            ),
        }
    }
}

#[async_trait]
impl AttachmentStore for HttpObjectStore {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<(), String> {
        validate_filename(filename)?;
        let result = async {
            let resp = self
                .client
                .put(self.object_url(filename))
                .body(bytes)
                .send()
                .await
                .map_err(|e| format!("Upload request failed: {}", e))?;
            if !resp.status().is_success() {
                return Err(format!("Upload HTTP {}", resp.status()));
            }
            Ok(())
        }
        .await;
        self.report("upload_image", filename, &result);
        result
    }

    async fn resolve_url(&self, filename: &str) -> Result<String, String> {
        validate_filename(filename)?;
        let result = async {
            let resp = self
                .client
                .get(format!("{}/url", self.object_url(filename)))
                .send()
                .await
                .map_err(|e| format!("URL resolution request failed: {}", e))?;
            if !resp.status().is_success() {
                return Err(format!("URL resolution HTTP {}", resp.status()));
            }
            let signed: SignedUrlResponse = resp
                .json()
                .await
                .map_err(|e| format!("Parse signed URL response: {}", e))?;
            // The storage service must hand back something fetchable
            url::Url::parse(&signed.url)
                .map_err(|e| format!("Storage returned malformed URL: {}", e))?;
            Ok(signed.url)
        }
        .await;
        match &result {
            Ok(url) => self.ops.event(
                "resolve_image_url",
                OpOutcome::Ok,
                &format!("path={} url={}", object_path(filename), url),
            ),
            Err(e) => self.ops.event(
                "resolve_image_url",
                OpOutcome::Failed,
                &format!("path={} error={}", object_path(filename), e),
            ),
        }
        result
    }

    async fn remove(&self, filename: &str) -> Result<(), String> {
        validate_filename(filename)?;
        let result = async {
            let resp = self
                .client
                .delete(self.object_url(filename))
                .send()
                .await
                .map_err(|e| format!("Remove request failed: {}", e))?;
            if !resp.status().is_success() {
                return Err(format!("Remove HTTP {}", resp.status()));
            }
            Ok(())
        }
        .await;
        self.report("remove_image", filename, &result);
        result
    }
}
