//! CI-context dispatch: decide which metadata documents apply to this run and upload them.
//!
//! Every provider is one variant of [`MetadataStep`]. A step either produces a
//! [`MetadataDocument`] or declines with `Ok(None)` when its provider is not active;
//! only malformed context for an active provider is an error. All documents go
//! through the same [`upload_document`] operation.
//!
//! Steps run in the order of [`MetadataStep::ALL`]. The GitHub Actions step comes right
//! after the service step so it doubles as the service step's follow-up, and runs once.

use std::fmt;

use tracing::{error, info, warn};

use crate::ci::{CiEnvironment, BUILDKITE_VARS, GITHUB_ACTIONS_VARS};
use crate::config::FailurePolicy;
use crate::contract::Uploader;
use crate::error::UploadError;
use crate::metadata::{
    upload_document, BuildkiteMetadata, GitHubActionsMetadata, MetadataDocument, Scm,
    ServiceMetadata,
};
use crate::paths::{self, BuildkiteRef};
use crate::tags::{self, Tags, DOCKERFILE_PATH_TAG, SOURCE_CODE_PATH_TAG};

/// What the metadata steps may look at.
#[derive(Debug, Clone, Copy)]
pub struct MetadataContext<'a> {
    pub ci: &'a CiEnvironment,
    pub tags: &'a Tags,
    /// Destination of the primary upload.
    pub scan_report_path: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataStep {
    Service,
    GitHubActions,
    Buildkite,
}

impl MetadataStep {
    pub const ALL: [MetadataStep; 3] = [
        MetadataStep::Service,
        MetadataStep::GitHubActions,
        MetadataStep::Buildkite,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MetadataStep::Service => "service",
            MetadataStep::GitHubActions => "github-actions",
            MetadataStep::Buildkite => "buildkite",
        }
    }

    /// Build this step's document, or `Ok(None)` when the provider is not active.
    pub fn document(
        &self,
        ctx: &MetadataContext<'_>,
    ) -> Result<Option<MetadataDocument>, UploadError> {
        match self {
            MetadataStep::Service => service_document(ctx),
            MetadataStep::GitHubActions => github_actions_document(ctx),
            MetadataStep::Buildkite => buildkite_document(ctx),
        }
    }
}

impl fmt::Display for MetadataStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Variables the GitHub Actions metadata path is built from.
const GITHUB_PATH_VARS: [&str; 3] = ["GITHUB_REPOSITORY", "GITHUB_REF", "GITHUB_SHA"];

fn github_actions_document(
    ctx: &MetadataContext<'_>,
) -> Result<Option<MetadataDocument>, UploadError> {
    let ci = ctx.ci;
    if !ci.in_github_actions() {
        return Ok(None);
    }
    let missing: Vec<&str> = GITHUB_PATH_VARS
        .into_iter()
        .filter(|name| ci.get(name).is_empty())
        .collect();
    if !missing.is_empty() {
        return Err(UploadError::IncompleteCiContext {
            provider: "GitHub Actions",
            missing: missing.join(", "),
        });
    }

    let destination = paths::github_actions_path(
        ci.get("GITHUB_REPOSITORY"),
        ci.get("GITHUB_REF"),
        ci.get("GITHUB_SHA"),
    );
    let payload: GitHubActionsMetadata = ci.select(GITHUB_ACTIONS_VARS);
    MetadataDocument::encode(MetadataStep::GitHubActions.label(), destination, &payload)
        .map(Some)
}

fn buildkite_document(ctx: &MetadataContext<'_>) -> Result<Option<MetadataDocument>, UploadError> {
    let ci = ctx.ci;
    if !ci.in_buildkite() {
        return Ok(None);
    }
    let git_ref = BuildkiteRef::resolve(
        ci.get("BUILDKITE_BRANCH"),
        ci.get("BUILDKITE_TAG"),
        ci.get("BUILDKITE_PULL_REQUEST"),
    )?;
    let destination = paths::buildkite_path(
        ci.get("BUILDKITE_PIPELINE_SLUG"),
        git_ref,
        ci.get("BUILDKITE_COMMIT"),
        tags::service_name(ctx.tags),
    );
    let payload = BuildkiteMetadata {
        scan_report_path: ctx.scan_report_path.to_string(),
        env: ci.select(BUILDKITE_VARS),
        tags: ctx.tags.clone(),
    };
    MetadataDocument::encode(MetadataStep::Buildkite.label(), destination, &payload).map(Some)
}

fn service_document(ctx: &MetadataContext<'_>) -> Result<Option<MetadataDocument>, UploadError> {
    let Some(service) = tags::service_name(ctx.tags) else {
        info!("No service name provided, skipping service metadata upload");
        info!("Add `tags: service=my-service-name` to your workflow to upload service metadata");
        return Ok(None);
    };

    let tag = |name: &str| ctx.tags.get(name).cloned().unwrap_or_default();
    let payload = ServiceMetadata {
        service_name: service.to_string(),
        scm: Scm {
            source_code_path: tag(SOURCE_CODE_PATH_TAG),
            dockerfile_path: tag(DOCKERFILE_PATH_TAG),
            ..Scm::default()
        }
        .with_github_repository(ctx.ci.get("GITHUB_REPOSITORY")),
    };
    let destination = paths::service_path(service, "metadata.json");
    MetadataDocument::encode(MetadataStep::Service.label(), destination, &payload).map(Some)
}

/// How one metadata step ended.
#[derive(Debug)]
pub enum StepOutcome {
    /// The provider is not active in this run, or the step it follows up on failed.
    Skipped,
    Succeeded { destination: String },
    Failed(UploadError),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

/// Build and upload one step's document.
pub async fn run_step<U>(
    uploader: &U,
    step: MetadataStep,
    ctx: &MetadataContext<'_>,
) -> StepOutcome
where
    U: Uploader + ?Sized,
{
    let document = match step.document(ctx) {
        Ok(Some(document)) => document,
        Ok(None) => {
            info!(step = %step, "[METADATA] Provider not detected, skipping");
            return StepOutcome::Skipped;
        }
        Err(e) => {
            error!(
                step = %step,
                error = %e,
                "[METADATA][ERROR] Could not build metadata document"
            );
            return StepOutcome::Failed(e);
        }
    };

    let destination = document.destination.clone();
    match upload_document(uploader, document).await {
        Ok(()) => StepOutcome::Succeeded { destination },
        Err(e) => {
            error!(
                step = %step,
                error = %e,
                destination = %destination,
                "[METADATA][ERROR] Metadata upload failed"
            );
            StepOutcome::Failed(e)
        }
    }
}

/// Run every metadata step in order.
///
/// The GitHub Actions step is the service step's follow-up: when the service upload
/// failed it is not attempted and is reported as skipped.
///
/// Under [`FailurePolicy::Strict`] the first failing step stops the dispatch and its
/// error is returned. Under [`FailurePolicy::BestEffort`] every remaining step runs and
/// failures are only reported.
pub async fn dispatch<U>(
    uploader: &U,
    ctx: &MetadataContext<'_>,
    policy: FailurePolicy,
) -> Result<Vec<(MetadataStep, StepOutcome)>, UploadError>
where
    U: Uploader + ?Sized,
{
    let mut outcomes = Vec::with_capacity(MetadataStep::ALL.len());
    let mut service_failed = false;
    for step in MetadataStep::ALL {
        if step == MetadataStep::GitHubActions && service_failed {
            warn!(
                step = %step,
                "[METADATA] Service metadata upload failed, skipping its follow-up"
            );
            outcomes.push((step, StepOutcome::Skipped));
            continue;
        }
        match run_step(uploader, step, ctx).await {
            StepOutcome::Failed(e) if policy == FailurePolicy::Strict => {
                error!(
                    step = %step,
                    "[METADATA][ERROR] Aborting run, metadata failures are fatal"
                );
                return Err(e);
            }
            outcome => {
                if step == MetadataStep::Service {
                    service_failed = outcome.is_failed();
                }
                outcomes.push((step, outcome));
            }
        }
    }
    Ok(outcomes)
}
