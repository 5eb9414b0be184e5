//! Tag filter parsing and matching.

use anyhow::Result;

use super::types::TagFilter;
use crate::error::UpgraderError;

/// Parse a tag filter given as a JSON object of string values,
/// e.g. `{"owner": "dba@example.com", "env": "staging"}`.
pub fn parse_tag_filter(raw: &str) -> Result<TagFilter> {
    let filter: TagFilter = serde_json::from_str(raw)
        .map_err(|e| UpgraderError::InvalidTagFilter(format!("{}: {}", raw, e)))?;

    if filter.is_empty() {
        return Err(UpgraderError::InvalidTagFilter(
            "at least one tag key is required".to_string(),
        )
        .into());
    }

    Ok(filter)
}

/// Every filter key must be present on the instance with an equal value.
/// Extra instance tags do not affect the result.
pub fn matches_filter(filter: &TagFilter, instance_tags: &TagFilter) -> bool {
    filter
        .iter()
        .all(|(key, value)| instance_tags.get(key) == Some(value))
}

/// Render a filter as `key=value` pairs for logs.
pub fn format_filter(filter: &TagFilter) -> String {
    filter
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
