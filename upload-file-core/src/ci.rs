use std::collections::BTreeMap;

/// Variables captured into the GitHub Actions metadata document.
pub const GITHUB_ACTIONS_VARS: &[&str] = &[
    "GITHUB_JOB",
    "GITHUB_REF",
    "GITHUB_SHA",
    "GITHUB_REPOSITORY",
    "GITHUB_REPOSITORY_OWNER",
    "GITHUB_REPOSITORY_OWNER_ID",
    "GITHUB_RUN_ID",
    "GITHUB_RUN_NUMBER",
    "GITHUB_RETENTION_DAYS",
    "GITHUB_RUN_ATTEMPT",
    "GITHUB_ACTOR_ID",
    "GITHUB_ACTOR",
    "GITHUB_WORKFLOW",
    "GITHUB_HEAD_REF",
    "GITHUB_BASE_REF",
    "GITHUB_EVENT_NAME",
    "GITHUB_SERVER_URL",
    "GITHUB_API_URL",
    "GITHUB_GRAPHQL_URL",
    "GITHUB_REF_NAME",
    "GITHUB_REF_PROTECTED",
    "GITHUB_REF_TYPE",
    "GITHUB_WORKFLOW_REF",
    "GITHUB_WORKFLOW_SHA",
    "GITHUB_REPOSITORY_ID",
    "GITHUB_TRIGGERING_ACTOR",
    "GITHUB_WORKSPACE",
    "GITHUB_ACTION",
    "GITHUB_EVENT_PATH",
    "GITHUB_ACTION_REPOSITORY",
    "GITHUB_ACTION_REF",
    "GITHUB_PATH",
    "GITHUB_ENV",
    "GITHUB_STEP_SUMMARY",
    "GITHUB_STATE",
    "GITHUB_OUTPUT",
    "RUNNER_OS",
    "RUNNER_ARCH",
    "RUNNER_NAME",
    "RUNNER_ENVIRONMENT",
    "RUNNER_TOOL_CACHE",
    "RUNNER_TEMP",
    "RUNNER_WORKSPACE",
    "ACTIONS_RUNTIME_URL",
    "ACTIONS_RUNTIME_TOKEN",
    "ACTIONS_CACHE_URL",
    "ACTIONS_ID_TOKEN_REQUEST_URL",
    "ACTIONS_ID_TOKEN_REQUEST_TOKEN",
    "ACTIONS_RESULTS_URL",
    "GITHUB_ACTIONS",
    "CI",
];

/// Variables captured into the Buildkite metadata document.
pub const BUILDKITE_VARS: &[&str] = &[
    // build
    "BUILDKITE_BUILD_ID",
    "BUILDKITE_BUILD_NUMBER",
    "BUILDKITE_BUILD_URL",
    "BUILDKITE_BUILD_CREATOR",
    "BUILDKITE_MESSAGE",
    "BUILDKITE_PULL_REQUEST",
    "BUILDKITE_PULL_REQUEST_BASE_BRANCH",
    "BUILDKITE_REBUILT_FROM_BUILD_ID",
    // pipeline and agent
    "BUILDKITE_PIPELINE_ID",
    "BUILDKITE_PIPELINE_SLUG",
    "BUILDKITE_PIPELINE_NAME",
    "BUILDKITE_ORGANIZATION_SLUG",
    "BUILDKITE_AGENT_ID",
    "BUILDKITE_AGENT_NAME",
    // job
    "BUILDKITE_JOB_ID",
    "BUILDKITE_COMMAND",
    "BUILDKITE_COMMAND_EXIT_STATUS",
    "BUILDKITE_JOB_URL",
    "BUILDKITE_STEP_KEY",
    // git
    "BUILDKITE_REPO",
    "BUILDKITE_COMMIT",
    "BUILDKITE_BRANCH",
    "BUILDKITE_TAG",
    "BUILDKITE_CLEAN_CHECKOUT",
    // other
    "BUILDKITE_BUILD_PATH",
    "BUILDKITE_ARTIFACT_UPLOAD_DESTINATION",
    "BUILDKITE_PLUGINS_PATH",
];

/// Snapshot of the CI environment, taken once at startup.
///
/// Lookups of unset variables yield an empty string, matching how CI systems treat
/// absent variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiEnvironment {
    vars: BTreeMap<String, String>,
}

impl CiEnvironment {
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> &str {
        self.vars.get(name).map(String::as_str).unwrap_or("")
    }

    /// True only for the literal string `true`, which is how CI systems flag themselves.
    pub fn is_true(&self, name: &str) -> bool {
        self.get(name) == "true"
    }

    pub fn in_github_actions(&self) -> bool {
        self.is_true("GITHUB_ACTIONS")
    }

    pub fn in_buildkite(&self) -> bool {
        self.is_true("BUILDKITE")
    }

    /// Values of `names`, with unset ones mapped to `""` rather than omitted.
    pub fn select(&self, names: &[&str]) -> BTreeMap<String, String> {
        names
            .iter()
            .map(|name| (name.to_string(), self.get(name).to_string()))
            .collect()
    }
}
