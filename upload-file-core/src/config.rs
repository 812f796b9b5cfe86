use std::path::PathBuf;

use tracing::{debug, info};

use crate::ci::CiEnvironment;
use crate::tags::{self, Tags};

/// What to do when a metadata upload fails after the primary upload succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and report the failure, keep going, exit successfully.
    #[default]
    BestEffort,
    /// Stop at the first failed metadata step and fail the run.
    Strict,
}

/// Everything one run needs, built once at startup.
///
/// Core components never read the process environment; CI state arrives here as a
/// [`CiEnvironment`] snapshot.
#[derive(Clone)]
pub struct UploadConfig {
    pub file_path: PathBuf,
    /// Storage path of the primary upload, already defaulted from the content hash.
    pub destination: String,
    pub api_endpoint: String,
    pub api_key: String,
    pub tags: Tags,
    pub ci: CiEnvironment,
    pub failure_policy: FailurePolicy,
}

impl UploadConfig {
    pub fn trace_loaded(&self) {
        info!(
            file_path = %self.file_path.display(),
            destination = %self.destination,
            api_endpoint = %self.api_endpoint,
            tags_count = self.tags.len(),
            service = tags::service_name(&self.tags).unwrap_or(""),
            github_actions = self.ci.in_github_actions(),
            buildkite = self.ci.in_buildkite(),
            failure_policy = ?self.failure_policy,
            "Loaded UploadConfig"
        );
        debug!(tags = ?self.tags, "Tags loaded (full debug)");
    }
}

impl std::fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadConfig")
            .field("file_path", &self.file_path)
            .field("destination", &self.destination)
            .field("api_endpoint", &self.api_endpoint)
            .field("api_key", &"<redacted>")
            .field("tags", &self.tags)
            .field("failure_policy", &self.failure_policy)
            .finish_non_exhaustive()
    }
}
