use std::collections::BTreeMap;

/// User supplied `key=value` tags.
pub type Tags = BTreeMap<String, String>;

/// Gates the service metadata upload and scopes Buildkite metadata.
pub const SERVICE_TAG: &str = "service";
pub const SOURCE_CODE_PATH_TAG: &str = "source_code_path";
pub const DOCKERFILE_PATH_TAG: &str = "dockerfile_path";

/// Parse newline separated `key=value` pairs.
///
/// Lines are trimmed, lines without `=` are dropped, only the first `=` splits and the
/// last occurrence of a key wins.
pub fn parse_tags(raw: &str) -> Tags {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// The `service` tag, if set to something non-empty.
pub fn service_name(tags: &Tags) -> Option<&str> {
    tags.get(SERVICE_TAG)
        .map(String::as_str)
        .filter(|name| !name.is_empty())
}
