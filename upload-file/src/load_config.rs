/// `load_config` module: turns parsed CLI input and the CI environment snapshot into
/// the core's [`UploadConfig`].
///
/// # Responsibilities
/// - Enforce required inputs (file path, API key) and the `.json` file requirement
/// - Default the endpoint and the destination (`uploads/<sha256>.json`)
/// - Parse the `key=value` tags
///
/// # Errors
/// Missing or invalid input is an [`UploadError::Configuration`], raised before any
/// network call and surfaced at the CLI boundary through `anyhow`.
use anyhow::Result;
use tracing::{error, info};
use upload_file_core::ci::CiEnvironment;
use upload_file_core::client::DEFAULT_API_ENDPOINT;
use upload_file_core::config::{FailurePolicy, UploadConfig};
use upload_file_core::paths::default_destination_for_file;
use upload_file_core::tags::{parse_tags, Tags};
use upload_file_core::UploadError;

use crate::cli::Cli;

/// Treat unset and blank inputs alike, as action runners pass unset inputs as `""`.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn load_config(cli: Cli, ci: CiEnvironment) -> Result<UploadConfig> {
    let Some(file_path) = cli.file_path.filter(|p| !p.as_os_str().is_empty()) else {
        error!("file-path input is missing");
        return Err(UploadError::Configuration("file-path input is required".into()).into());
    };
    if file_path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        error!(file_path = %file_path.display(), "file-path is not a JSON file");
        return Err(UploadError::Configuration(format!(
            "file must be a JSON file, got: {}",
            file_path.display()
        ))
        .into());
    }

    let Some(api_key) = non_empty(cli.security_agent_api_key) else {
        error!("security-agent-api-key input is missing");
        return Err(
            UploadError::Configuration("security-agent-api-key input is required".into()).into(),
        );
    };

    let api_endpoint = non_empty(cli.security_agent_api_endpoint)
        .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());

    let destination = match non_empty(cli.destination) {
        Some(destination) => destination,
        None => {
            let destination = default_destination_for_file(&file_path).await?;
            info!(
                destination = %destination,
                "No destination given, derived it from the file content"
            );
            destination
        }
    };

    let tags: Tags = cli.tags.as_deref().map(parse_tags).unwrap_or_default();

    let failure_policy = if cli.fail_on_metadata_error {
        FailurePolicy::Strict
    } else {
        FailurePolicy::BestEffort
    };

    info!(
        file_path = %file_path.display(),
        destination = %destination,
        api_endpoint = %api_endpoint,
        "Config loaded and merged successfully"
    );

    Ok(UploadConfig {
        file_path,
        destination,
        api_endpoint,
        api_key,
        tags,
        ci,
        failure_policy,
    })
}
