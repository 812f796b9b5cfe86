//! Metadata documents: payload shapes, JSON encoding and the scoped upload of one document.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;
use tracing::{debug, info};

use crate::contract::{UploadRequest, Uploader};
use crate::error::UploadError;
use crate::tags::Tags;

/// A serialized metadata payload and the storage path it belongs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDocument {
    pub destination: String,
    /// Short name used for the temp file and in logs, e.g. `buildkite`.
    pub label: &'static str,
    pub body: Vec<u8>,
}

impl MetadataDocument {
    pub fn encode<T: Serialize>(
        label: &'static str,
        destination: impl Into<String>,
        payload: &T,
    ) -> Result<Self, UploadError> {
        Ok(Self {
            destination: destination.into(),
            label,
            body: serde_json::to_vec(payload)?,
        })
    }
}

/// GitHub Actions metadata is a flat map of variable name to value.
pub type GitHubActionsMetadata = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize)]
pub struct BuildkiteMetadata {
    /// Where the primary upload went.
    pub scan_report_path: String,
    pub env: BTreeMap<String, String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceMetadata {
    pub service_name: String,
    pub scm: Scm,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Scm {
    pub repo_url: String,
    pub https_clone_url: String,
    pub ssh_clone_url: String,
    pub source_code_path: String,
    pub dockerfile_path: String,
}

impl Scm {
    /// Fill the clone URLs from an `owner/name` GitHub repository, if there is one.
    pub fn with_github_repository(mut self, repository: &str) -> Self {
        if !repository.is_empty() {
            self.repo_url = format!("https://github.com/{repository}");
            self.https_clone_url = format!("https://github.com/{repository}.git");
            self.ssh_clone_url = format!("git@github.com:{repository}.git");
        }
        self
    }
}

/// Stage `document` in a temporary `.json` file and upload it.
///
/// The temp file is removed when this returns, whether the upload succeeded or not.
pub async fn upload_document<U>(
    uploader: &U,
    document: MetadataDocument,
) -> Result<(), UploadError>
where
    U: Uploader + ?Sized,
{
    let mut staged = tempfile::Builder::new()
        .prefix(&format!("{}-metadata-", document.label))
        .suffix(".json")
        .tempfile()?;
    staged.write_all(&document.body)?;
    staged.flush()?;
    debug!(
        label = document.label,
        path = %staged.path().display(),
        size_bytes = document.body.len(),
        "Staged metadata document"
    );

    info!(label = document.label, destination = %document.destination, "Uploading metadata");
    uploader
        .put_file(UploadRequest::new(staged.path(), document.destination))
        .await?;
    info!(label = document.label, "Metadata upload completed successfully");
    Ok(())
}
