//! # contract: the upload interface the pipeline is written against
//!
//! The pipeline and the metadata dispatcher never talk to the network directly. They
//! hold something implementing [`Uploader`], which is the real
//! [`SecurityAgentClient`](crate::client::SecurityAgentClient) in production and a
//! `mockall` generated `MockUploader` in tests.
//!
//! Request and response types are plain data.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[allow(unused_imports)]
use mockall::{automock, predicate::*};

use crate::error::UploadError;

/// One local file and the storage path it should end up under.
///
/// Ownership moves into the uploader for the duration of a single `put_file` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub source_path: PathBuf,
    pub destination: String,
}

impl UploadRequest {
    pub fn new(source_path: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            destination: destination.into(),
        }
    }
}

/// A one-time writable endpoint handed out by the API.
///
/// Consumed by exactly one PUT and never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUpload {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Uploads files to object storage through presigned URLs.
///
/// The trait is implemented by the real API client and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Exchange a destination path for a presigned upload URL and its expiry.
    async fn presigned_upload_url(&self, destination: &str)
        -> Result<PresignedUpload, UploadError>;

    /// Upload the full content of a local file to the requested destination.
    ///
    /// Implementors obtain their own presigned URL for the destination.
    async fn put_file(&self, request: UploadRequest) -> Result<(), UploadError>;
}
