use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::tempdir;
use upload_file_core::ci::CiEnvironment;
use upload_file_core::client::SecurityAgentClient;
use upload_file_core::config::{FailurePolicy, UploadConfig};
use upload_file_core::contract::{MockUploader, UploadRequest};
use upload_file_core::dispatch::{MetadataStep, StepOutcome};
use upload_file_core::paths::default_destination_for_file;
use upload_file_core::pipeline::run;
use upload_file_core::tags::parse_tags;
use upload_file_core::UploadError;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVICE_DESTINATION: &str = "metadata/services/api/metadata.json";
const GITHUB_DESTINATION: &str = "metadata/hasura/engine/refs/heads/main/abc123.json";

/// A GitHub Actions run on `hasura/engine` main, plus `extra` variables.
fn github_actions_ci(extra: &[(&str, &str)]) -> CiEnvironment {
    CiEnvironment::from_vars(
        [
            ("GITHUB_ACTIONS", "true"),
            ("GITHUB_REPOSITORY", "hasura/engine"),
            ("GITHUB_REF", "refs/heads/main"),
            ("GITHUB_SHA", "abc123"),
        ]
        .into_iter()
        .chain(extra.iter().copied()),
    )
}

/// One recorded `put_file` call: destination, staged path and the staged content.
#[derive(Debug, Clone)]
struct Call {
    destination: String,
    source_path: PathBuf,
    content: String,
}

fn config(ci: CiEnvironment, tags: &str, policy: FailurePolicy) -> UploadConfig {
    UploadConfig {
        file_path: PathBuf::from("report.json"),
        destination: "uploads/primary.json".to_string(),
        api_endpoint: "http://localhost/graphql".to_string(),
        api_key: "key".to_string(),
        tags: parse_tags(tags),
        ci,
        failure_policy: policy,
    }
}

/// A mock that records every call and fails the ones `fail_when` picks.
fn recording_uploader(
    fail_when: impl Fn(&str) -> bool + Send + 'static,
) -> (MockUploader, Arc<Mutex<Vec<Call>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = calls.clone();
    let mut uploader = MockUploader::new();
    uploader
        .expect_put_file()
        .returning(move |request: UploadRequest| {
            let content = std::fs::read_to_string(&request.source_path).unwrap_or_default();
            recorded.lock().unwrap().push(Call {
                destination: request.destination.clone(),
                source_path: request.source_path.clone(),
                content,
            });
            if fail_when(&request.destination) {
                Err(UploadError::Upload {
                    status: 500,
                    body: "boom".to_string(),
                })
            } else {
                Ok(())
            }
        });
    (uploader, calls)
}

fn destinations(calls: &Arc<Mutex<Vec<Call>>>) -> Vec<String> {
    calls
        .lock()
        .unwrap()
        .iter()
        .map(|c| c.destination.clone())
        .collect()
}

#[tokio::test]
async fn outside_ci_only_the_primary_file_is_uploaded() {
    let (uploader, calls) = recording_uploader(|_| false);
    let config = config(
        CiEnvironment::from_vars([("GITHUB_ACTIONS", "false")]),
        "",
        FailurePolicy::BestEffort,
    );

    let report = run(&config, &uploader).await.unwrap();

    assert_eq!(destinations(&calls), vec!["uploads/primary.json"]);
    assert_eq!(report.destination, "uploads/primary.json");
    for step in MetadataStep::ALL {
        assert!(matches!(report.outcome(step), Some(StepOutcome::Skipped)), "{step}");
    }
}

#[tokio::test]
async fn primary_failure_is_fatal_and_skips_metadata() {
    let (uploader, calls) = recording_uploader(|dest| dest == "uploads/primary.json");
    let config = config(
        CiEnvironment::from_vars([("GITHUB_ACTIONS", "true")]),
        "service=api",
        FailurePolicy::BestEffort,
    );

    let err = run(&config, &uploader).await.unwrap_err();

    assert!(matches!(err, UploadError::Upload { status: 500, .. }));
    assert_eq!(destinations(&calls).len(), 1);
}

#[tokio::test]
async fn github_actions_with_service_uploads_each_document_once() {
    let (uploader, calls) = recording_uploader(|_| false);
    let config = config(github_actions_ci(&[]), "service=api", FailurePolicy::BestEffort);

    let report = run(&config, &uploader).await.unwrap();

    assert_eq!(
        destinations(&calls),
        vec![
            "uploads/primary.json",
            SERVICE_DESTINATION,
            GITHUB_DESTINATION,
        ]
    );
    assert!(matches!(
        report.outcome(MetadataStep::Buildkite),
        Some(StepOutcome::Skipped)
    ));

    let calls = calls.lock().unwrap();
    let service: serde_json::Value = serde_json::from_str(&calls[1].content).unwrap();
    assert_eq!(service["scm"]["repo_url"], "https://github.com/hasura/engine");
    let github: serde_json::Value = serde_json::from_str(&calls[2].content).unwrap();
    assert_eq!(github["GITHUB_SHA"], "abc123");
}

#[tokio::test]
async fn buildkite_tag_build_uploads_under_tag_path() {
    let (uploader, calls) = recording_uploader(|_| false);
    let ci = CiEnvironment::from_vars([
        ("BUILDKITE", "true"),
        ("BUILDKITE_PIPELINE_SLUG", "security-scan"),
        ("BUILDKITE_COMMIT", "c0ffee"),
        ("BUILDKITE_TAG", "v1.2.3"),
        ("BUILDKITE_PULL_REQUEST", "false"),
    ]);
    let config = config(ci, "team=sec", FailurePolicy::BestEffort);

    let report = run(&config, &uploader).await.unwrap();

    match report.outcome(MetadataStep::Buildkite) {
        Some(StepOutcome::Succeeded { destination }) => {
            assert_eq!(destination, "buildkite/security-scan/tags/v1.2.3/c0ffee.json")
        }
        other => panic!("unexpected buildkite outcome: {other:?}"),
    }
    let calls = calls.lock().unwrap();
    let body: serde_json::Value = serde_json::from_str(&calls[1].content).unwrap();
    assert_eq!(body["scan_report_path"], "uploads/primary.json");
    assert_eq!(body["tags"]["team"], "sec");
}

#[tokio::test]
async fn buildkite_without_ref_fails_the_step_without_uploading() {
    let (uploader, calls) = recording_uploader(|_| false);
    let ci = CiEnvironment::from_vars([
        ("BUILDKITE", "true"),
        ("BUILDKITE_PIPELINE_SLUG", "security-scan"),
        ("BUILDKITE_COMMIT", "c0ffee"),
    ]);
    let config = config(ci, "", FailurePolicy::BestEffort);

    let report = run(&config, &uploader).await.expect("best effort keeps going");

    assert!(matches!(
        report.outcome(MetadataStep::Buildkite),
        Some(StepOutcome::Failed(UploadError::AmbiguousRef))
    ));
    assert_eq!(destinations(&calls), vec!["uploads/primary.json"]);
    assert_eq!(report.failed_steps().count(), 1);
}

#[tokio::test]
async fn strict_policy_aborts_on_first_metadata_failure() {
    let (uploader, calls) = recording_uploader(|dest| dest == SERVICE_DESTINATION);
    let ci = CiEnvironment::from_vars([("GITHUB_ACTIONS", "true")]);
    let config = config(ci, "service=api", FailurePolicy::Strict);

    let err = run(&config, &uploader).await.unwrap_err();

    assert!(matches!(err, UploadError::Upload { .. }));
    // Primary and service only; the GitHub Actions step never ran.
    assert_eq!(destinations(&calls).len(), 2);
}

#[tokio::test]
async fn best_effort_reports_failures_and_runs_remaining_steps() {
    let (uploader, calls) = recording_uploader(|dest| dest == GITHUB_DESTINATION);
    let ci = github_actions_ci(&[("BUILDKITE", "true"), ("BUILDKITE_BRANCH", "main")]);
    let config = config(ci, "service=api", FailurePolicy::BestEffort);

    let report = run(&config, &uploader).await.unwrap();

    assert!(matches!(
        report.outcome(MetadataStep::Service),
        Some(StepOutcome::Succeeded { .. })
    ));
    assert!(report.outcome(MetadataStep::GitHubActions).unwrap().is_failed());
    assert!(matches!(
        report.outcome(MetadataStep::Buildkite),
        Some(StepOutcome::Succeeded { .. })
    ));
    assert_eq!(destinations(&calls).len(), 4);
}

#[tokio::test]
async fn failed_service_upload_skips_its_github_actions_follow_up() {
    let (uploader, calls) = recording_uploader(|dest| dest == SERVICE_DESTINATION);
    let ci = github_actions_ci(&[("BUILDKITE", "true"), ("BUILDKITE_BRANCH", "main")]);
    let config = config(ci, "service=api", FailurePolicy::BestEffort);

    let report = run(&config, &uploader).await.unwrap();

    assert!(report.outcome(MetadataStep::Service).unwrap().is_failed());
    assert!(matches!(
        report.outcome(MetadataStep::GitHubActions),
        Some(StepOutcome::Skipped)
    ));
    assert!(matches!(
        report.outcome(MetadataStep::Buildkite),
        Some(StepOutcome::Succeeded { .. })
    ));
    let destinations = destinations(&calls);
    assert_eq!(destinations.len(), 3);
    assert!(!destinations.iter().any(|d| d == GITHUB_DESTINATION));
}

#[tokio::test]
async fn github_actions_without_commit_context_fails_without_uploading() {
    let (uploader, calls) = recording_uploader(|_| false);
    let ci = CiEnvironment::from_vars([("GITHUB_ACTIONS", "true")]);
    let config = config(ci, "", FailurePolicy::BestEffort);

    let report = run(&config, &uploader).await.unwrap();

    assert!(matches!(
        report.outcome(MetadataStep::GitHubActions),
        Some(StepOutcome::Failed(UploadError::IncompleteCiContext { .. }))
    ));
    assert_eq!(destinations(&calls), vec!["uploads/primary.json"]);
}

#[tokio::test]
async fn staged_metadata_files_are_json_and_removed_afterwards() {
    let (uploader, calls) = recording_uploader(|dest| dest == GITHUB_DESTINATION);
    let config = config(github_actions_ci(&[]), "service=api", FailurePolicy::BestEffort);

    run(&config, &uploader).await.unwrap();

    let calls = calls.lock().unwrap();
    let staged: Vec<_> = calls.iter().skip(1).collect();
    assert_eq!(staged.len(), 2);
    for call in staged {
        assert_eq!(
            call.source_path.extension().and_then(|e| e.to_str()),
            Some("json")
        );
        assert!(!call.content.is_empty());
        assert!(
            !call.source_path.exists(),
            "temp file left behind: {}",
            call.source_path.display()
        );
    }
}

#[tokio::test]
async fn report_json_end_to_end_against_the_api() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let file = dir.path().join("report.json");
    std::fs::write(&file, br#"{"a":1}"#).unwrap();

    let destination = default_destination_for_file(&file).await.unwrap();
    assert_eq!(
        destination,
        "uploads/015abd7f5cc57a2dd94b7590f04ad8084273905ee33ec5cebeae62276a97f862.json"
    );

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "variables": { "name": destination.clone() } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "storage_presigned_upload_url": {
                    "url": format!("{}/bucket/object", server.uri()),
                    "expired_at": (Utc::now() + Duration::hours(1)).to_rfc3339(),
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/bucket/object"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = UploadConfig {
        file_path: file,
        destination: destination.clone(),
        api_endpoint: format!("{}/graphql", server.uri()),
        api_key: "key".to_string(),
        tags: parse_tags(""),
        ci: CiEnvironment::default(),
        failure_policy: FailurePolicy::BestEffort,
    };
    let client = SecurityAgentClient::new(&config.api_endpoint, &config.api_key).unwrap();

    let report = run(&config, &client).await.unwrap();

    assert_eq!(report.destination, destination);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
