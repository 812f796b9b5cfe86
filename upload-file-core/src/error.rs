use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Everything that can go wrong while uploading a file or one of its metadata documents.
///
/// A CI provider that is simply not active is not represented here: metadata steps
/// report that as `Ok(None)`.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Missing or invalid required input. Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("file does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The API did not hand out a usable presigned URL.
    #[error("failed to get presigned upload URL: {0}")]
    Presign(String),

    #[error("presigned upload URL expired at {expired_at}")]
    PresignExpired { expired_at: DateTime<Utc> },

    /// The storage backend answered the PUT with a non-2xx status.
    #[error("upload failed with status {status}: {body}")]
    Upload { status: u16, body: String },

    #[error("upload transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Buildkite is active but none of branch, tag or pull request identifies the ref.
    #[error(
        "failed to determine upload path. Please set at least one of \
         BUILDKITE_BRANCH, BUILDKITE_TAG, BUILDKITE_PULL_REQUEST env vars"
    )]
    AmbiguousRef,

    /// A CI provider is active but variables its storage path is built from are empty.
    #[error("{provider} is active but {missing} not set, cannot build the metadata path")]
    IncompleteCiContext {
        provider: &'static str,
        missing: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode metadata: {0}")]
    Json(#[from] serde_json::Error),
}
