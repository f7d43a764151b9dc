//! CQL/JQL shaping and attachment-list parsing.

use crate::domain::error::ToolError;
use crate::shared::text::split_csv;
use serde_json::Value;

const CQL_OPERATORS: &[&str] = &["=", "~", ">", "<", " AND ", " OR ", "currentUser()"];

const CQL_RESERVED: &[&str] = &[
    "after", "and", "as", "avg", "before", "begin", "by", "commit", "contains", "count",
    "distinct", "else", "empty", "end", "explain", "from", "having", "if", "in", "inner",
    "insert", "into", "is", "isnull", "left", "like", "limit", "max", "min", "not", "null",
    "or", "order", "outer", "right", "select", "sum", "then", "was", "where", "update",
];

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Plain search terms become a full-text `text ~ "…"` clause; anything that
/// already looks like CQL is passed through.
pub fn cql_for_search(query: &str) -> String {
    if CQL_OPERATORS.iter().any(|op| query.contains(op)) {
        query.to_string()
    } else {
        format!("text ~ \"{}\"", escape_quoted(query))
    }
}

/// Quotes a space key when CQL would otherwise misread it: personal spaces
/// (`~user`), reserved words and keys starting with a digit.
pub fn quote_cql_identifier(key: &str) -> String {
    let needs_quotes = key.starts_with('~')
        || key.starts_with(|c: char| c.is_ascii_digit())
        || CQL_RESERVED.contains(&key.to_ascii_lowercase().as_str());
    if needs_quotes {
        format!("\"{}\"", escape_quoted(key))
    } else {
        key.to_string()
    }
}

/// Restricts a CQL query to the comma-separated spaces unless it already
/// filters on space.
pub fn apply_spaces_filter(cql: &str, spaces_filter: &str) -> String {
    let spaces = split_csv(spaces_filter);
    let lowered = cql.to_ascii_lowercase();
    if spaces.is_empty() || lowered.contains("space =") || lowered.contains("space in") {
        return cql.to_string();
    }
    let clause = spaces
        .iter()
        .map(|space| format!("space = {}", quote_cql_identifier(space)))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("({cql}) AND ({clause})")
}

/// Prefixes a `project` restriction to JQL, keeping any trailing `ORDER BY`.
pub fn apply_projects_filter(jql: &str, projects_filter: &str) -> String {
    let projects = split_csv(projects_filter);
    let lowered = jql.to_ascii_lowercase();
    if projects.is_empty() || lowered.contains("project =") || lowered.contains("project in") {
        return jql.to_string();
    }
    let clause = if projects.len() == 1 {
        format!("project = \"{}\"", escape_quoted(&projects[0]))
    } else {
        let quoted = projects
            .iter()
            .map(|key| format!("\"{}\"", escape_quoted(key)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("project IN ({quoted})")
    };

    let trimmed = jql.trim();
    let (body, order) = match lowered.trim().rfind("order by") {
        Some(idx) => (trimmed[..idx].trim(), Some(trimmed[idx..].trim())),
        None => (trimmed, None),
    };
    let filtered = if body.is_empty() {
        clause
    } else {
        format!("{clause} AND ({body})")
    };
    match order {
        Some(order) => format!("{filtered} {order}"),
        None => filtered,
    }
}

/// Normalizes the `attachments` argument into a list of paths.
///
/// Accepted shapes: a JSON array, JSON-encoded array or string, a
/// comma-separated list, or one path.
pub fn parse_attachment_paths(value: &Value) -> Result<Vec<String>, ToolError> {
    match value {
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|item| match item {
                Value::String(path) => Some(path.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|path| !path.is_empty())
            .collect()),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(Vec::new());
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(parsed @ Value::Array(_)) => parse_attachment_paths(&parsed),
                Ok(Value::String(single)) => Ok(vec![single.trim().to_string()]),
                _ if trimmed.contains(',') => Ok(split_csv(trimmed)),
                _ => Ok(vec![trimmed.to_string()]),
            }
        }
        other => Err(ToolError::InvalidArgument(format!(
            "attachments must be a list of paths or a comma-separated string, got {other}"
        ))),
    }
}
