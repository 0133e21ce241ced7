use std::fmt;

use thiserror::Error;

/// One failing argument path and the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

pub const ISSUE_SEPARATOR: &str = "; ";

fn join_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(Issue::to_string)
        .collect::<Vec<_>>()
        .join(ISSUE_SEPARATOR)
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("AnkiConnect request failed with status {status}: {body}")]
    Transport { status: u16, body: String },

    #[error("Could not reach AnkiConnect: {0}")]
    Connection(String),

    #[error("Failed to parse AnkiConnect response: {body}")]
    Protocol { body: String },

    #[error("AnkiConnect error: {0}")]
    Remote(String),

    #[error("AnkiConnect returned null result for action: {action}")]
    UnexpectedNullResult { action: String },

    #[error(
        "Invalid fields for model \"{model}\": {}. Valid fields are: {}",
        .invalid.join(", "),
        .valid.join(", ")
    )]
    InvalidField {
        model: String,
        invalid: Vec<String>,
        valid: Vec<String>,
    },

    #[error(
        "Field \"{field}\" for Cloze model must contain at least one cloze deletion using {{{{c1::text}}}} syntax. Received: \"{received}\""
    )]
    ClozeSyntax { field: String, received: String },

    #[error("Invalid arguments: {}", join_issues(.0))]
    Validation(Vec<Issue>),

    #[error("Unknown operation: \"{0}\"")]
    UnknownOperation(String),

    #[error("{0}")]
    Operation(String),
}

impl GatewayError {
    /// Whether the failure may be transient and worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport { .. }
                | GatewayError::Connection(_)
                | GatewayError::Protocol { .. }
        )
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        GatewayError::Connection(error.to_string())
    }
}
