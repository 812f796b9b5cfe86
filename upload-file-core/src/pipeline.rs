//! Top-level run: primary upload, then the CI metadata steps.
//!
//! # Responsibilities
//! - Upload the configured file to its destination. Failure here is fatal and no
//!   metadata step runs.
//! - Dispatch every metadata step (service, GitHub Actions, Buildkite). Each one is
//!   independent; a failure never rolls back the primary upload.
//! - Return an [`UploadReport`] with one outcome per step.
//!
//! # Error Handling
//! Whether a failed metadata step fails the run is decided by the configured
//! [`FailurePolicy`](crate::config::FailurePolicy), applied the same way to every step.

use tracing::{error, info};

use crate::config::UploadConfig;
use crate::contract::{UploadRequest, Uploader};
use crate::dispatch::{self, MetadataContext, MetadataStep, StepOutcome};
use crate::error::UploadError;

#[derive(Debug)]
pub struct UploadReport {
    /// Where the primary file went.
    pub destination: String,
    pub steps: Vec<(MetadataStep, StepOutcome)>,
}

impl UploadReport {
    pub fn outcome(&self, step: MetadataStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| outcome)
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = (MetadataStep, &UploadError)> {
        self.steps.iter().filter_map(|(step, outcome)| match outcome {
            StepOutcome::Failed(e) => Some((*step, e)),
            _ => None,
        })
    }
}

pub async fn run<U>(config: &UploadConfig, uploader: &U) -> Result<UploadReport, UploadError>
where
    U: Uploader + ?Sized,
{
    info!(destination = %config.destination, "[UPLOAD] Starting primary upload");
    let request = UploadRequest::new(&config.file_path, config.destination.clone());
    if let Err(e) = uploader.put_file(request).await {
        error!(error = %e, "[UPLOAD][ERROR] Primary upload failed");
        return Err(e);
    }
    info!(destination = %config.destination, "[UPLOAD] File uploaded successfully");

    let ctx = MetadataContext {
        ci: &config.ci,
        tags: &config.tags,
        scan_report_path: &config.destination,
    };
    let steps = dispatch::dispatch(uploader, &ctx, config.failure_policy).await?;

    let report = UploadReport {
        destination: config.destination.clone(),
        steps,
    };
    for (step, e) in report.failed_steps() {
        error!(step = %step, error = %e, "[UPLOAD] Metadata step failed, continuing");
    }
    Ok(report)
}
