//! Name and tag grammars accepted by the ingestion API.

use std::sync::OnceLock;

use regex::Regex;

/// Returns whether `name` is a valid metric name.
///
/// Metric names consist of alphanumerics, `.`, `_` and `-` and must not start
/// with a dot.
pub fn is_valid_metric_name(name: &str) -> bool {
    static METRIC_NAME_RE: OnceLock<Regex> = OnceLock::new();
    METRIC_NAME_RE
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_\-][a-zA-Z0-9_\-.]*$").expect("Regex should compile"))
        .is_match(name)
}

/// Returns whether `value` is a valid tag name or tag value.
pub fn is_valid_tag(value: &str) -> bool {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    TAG_RE
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_\-./]+$").expect("Regex should compile"))
        .is_match(value)
}
