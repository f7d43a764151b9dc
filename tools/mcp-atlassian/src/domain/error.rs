use std::fmt;
use thiserror::Error;

/// Product area owning a catalog and a collaborator handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductArea {
    Jira,
    Confluence,
}

impl ProductArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductArea::Jira => "jira",
            ProductArea::Confluence => "confluence",
        }
    }
}

impl fmt::Display for ProductArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductArea::Jira => f.write_str("Jira"),
            ProductArea::Confluence => f.write_str("Confluence"),
        }
    }
}

/// Faults surfaced by a tool call. Every variant ends as an error result,
/// never as a protocol-level failure.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0} is not configured.")]
    NotConfigured(ProductArea),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Invalid JSON in {field}: {message}")]
    InvalidJson { field: String, message: String },
    #[error("{0:#}")]
    Collaborator(#[from] anyhow::Error),
    #[error("Tool '{0}' has no registered handler")]
    NotImplemented(String),
}

impl ToolError {
    pub fn invalid_json(field: &str, err: &serde_json::Error) -> Self {
        ToolError::InvalidJson {
            field: field.to_string(),
            message: err.to_string(),
        }
    }

    pub fn missing(param: &str) -> Self {
        ToolError::InvalidArgument(format!("Missing required parameter '{param}'"))
    }

    pub fn code(&self) -> &'static str {
        match self {
            ToolError::NotConfigured(_) => "NOT_CONFIGURED",
            ToolError::UnknownTool(_) => "UNKNOWN_TOOL",
            ToolError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ToolError::InvalidJson { .. } => "INVALID_JSON",
            ToolError::Collaborator(_) => "COLLABORATOR_FAILURE",
            ToolError::NotImplemented(_) => "NOT_IMPLEMENTED",
        }
    }

    /// Offending field for input errors the caller can correct.
    pub fn field(&self) -> Option<&str> {
        match self {
            ToolError::InvalidJson { field, .. } => Some(field),
            _ => None,
        }
    }
}
