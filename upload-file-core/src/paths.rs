//! Pure mapping functions from files and CI context to storage paths and content types.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::UploadError;

/// Root under which all service scoped metadata lives.
pub const SERVICE_METADATA_ROOT: &str = "metadata/services";

/// Fallback for anything not in the extension table.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Map a file's extension to the MIME type sent with the PUT.
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("tar") => "application/x-tar",
        Some("gz") => "application/gzip",
        _ => OCTET_STREAM,
    }
}

/// Destination for content when the caller did not pick one: `uploads/<sha256>.json`.
pub fn default_destination(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("uploads/{:x}.json", hasher.finalize())
}

/// Same as [`default_destination`], streaming the file through the hasher.
pub async fn default_destination_for_file(path: &Path) -> Result<String, UploadError> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(UploadError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("uploads/{:x}.json", hasher.finalize()))
}

/// `metadata/<repository>/<ref>/<sha>.json`
pub fn github_actions_path(repository: &str, git_ref: &str, sha: &str) -> String {
    format!("metadata/{repository}/{git_ref}/{sha}.json")
}

/// Which kind of ref a Buildkite build was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildkiteRef<'a> {
    Branch(&'a str),
    Tag(&'a str),
    PullRequest(&'a str),
}

impl<'a> BuildkiteRef<'a> {
    /// Pick the ref in priority order branch, tag, pull request.
    ///
    /// Buildkite sets `BUILDKITE_PULL_REQUEST=false` on non-PR builds, so that value
    /// counts as unset.
    pub fn resolve(
        branch: &'a str,
        tag: &'a str,
        pull_request: &'a str,
    ) -> Result<Self, UploadError> {
        if !branch.is_empty() {
            Ok(Self::Branch(branch))
        } else if !tag.is_empty() {
            Ok(Self::Tag(tag))
        } else if !pull_request.is_empty() && pull_request != "false" {
            Ok(Self::PullRequest(pull_request))
        } else {
            Err(UploadError::AmbiguousRef)
        }
    }

    pub fn path(&self, commit: &str) -> String {
        match self {
            Self::Branch(branch) => format!("branches/{branch}/{commit}.json"),
            Self::Tag(tag) => format!("tags/{tag}/{commit}.json"),
            Self::PullRequest(pr) => format!("pull-requests/{pr}/{commit}.json"),
        }
    }
}

/// Full Buildkite metadata path, scoped under the service when one is tagged.
pub fn buildkite_path(
    pipeline_slug: &str,
    git_ref: BuildkiteRef<'_>,
    commit: &str,
    service: Option<&str>,
) -> String {
    let path = format!("buildkite/{pipeline_slug}/{}", git_ref.path(commit));
    match service {
        Some(service) => service_path(service, &path),
        None => path,
    }
}

/// Path relative to the service's metadata directory.
pub fn service_path(service: &str, path: &str) -> String {
    format!("{SERVICE_METADATA_ROOT}/{service}/{path}")
}
