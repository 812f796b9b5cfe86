/// Command-line interface for upload-file: input parsing, the run entrypoint and
/// user-visible output.
///
/// Every flag falls back to the `INPUT_*` environment variable a CI action runner sets
/// for its inputs, so the binary works both as an action step and by hand.
///
/// All protocol and pipeline logic lives in [`upload-file-core`]; this module is glue.
///
/// [`upload-file-core`]: ../../upload-file-core/
use crate::load_config::load_config;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use upload_file_core::ci::CiEnvironment;
use upload_file_core::client::SecurityAgentClient;
use upload_file_core::dispatch::StepOutcome;
use upload_file_core::pipeline::{self, UploadReport};

/// Upload a scan report through a presigned URL, plus CI metadata describing it.
#[derive(Parser, Debug, Default)]
#[clap(
    name = "upload-file",
    version,
    about = "Upload a file and its CI metadata to the security agent through presigned URLs"
)]
pub struct Cli {
    /// Local JSON file to upload
    #[clap(long, env = "INPUT_FILE_PATH")]
    pub file_path: Option<PathBuf>,

    /// Storage path for the file; defaults to uploads/<sha256>.json
    #[clap(long, env = "INPUT_DESTINATION")]
    pub destination: Option<String>,

    /// GraphQL endpoint of the security agent API
    #[clap(long, env = "INPUT_SECURITY_AGENT_API_ENDPOINT")]
    pub security_agent_api_endpoint: Option<String>,

    /// API key, sent as the Authorization header
    #[clap(long, env = "INPUT_SECURITY_AGENT_API_KEY", hide_env_values = true)]
    pub security_agent_api_key: Option<String>,

    /// Newline separated key=value tags
    #[clap(long, env = "INPUT_TAGS")]
    pub tags: Option<String>,

    /// Fail the run when any metadata upload fails
    #[clap(
        long,
        env = "INPUT_FAIL_ON_METADATA_ERROR",
        action = clap::ArgAction::SetTrue,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub fail_on_metadata_error: bool,
}

/// Async entrypoint for integration tests and main().
///
/// `ci` is the snapshot of the CI environment the metadata steps will see.
pub async fn run(cli: Cli, ci: CiEnvironment) -> Result<UploadReport> {
    tracing::info!("trace_initialised");

    let config = load_config(cli, ci).await?;
    config.trace_loaded();

    let client = SecurityAgentClient::new(&config.api_endpoint, &config.api_key)?;
    match pipeline::run(&config, &client).await {
        Ok(report) => {
            print_report(&report);
            tracing::info!(destination = %report.destination, "Upload run complete");
            Ok(report)
        }
        Err(e) => {
            tracing::error!(error = %e, "Upload failed");
            Err(anyhow::Error::new(e).context("Upload failed"))
        }
    }
}

fn print_report(report: &UploadReport) {
    println!("File uploaded to: {}", report.destination);
    for (step, outcome) in &report.steps {
        match outcome {
            StepOutcome::Skipped => println!("  {step} metadata: skipped"),
            StepOutcome::Succeeded { destination } => {
                println!("  {step} metadata: uploaded to {destination}")
            }
            StepOutcome::Failed(e) => println!("  {step} metadata: FAILED ({e})"),
        }
    }
}
