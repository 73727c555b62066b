//! Error types for the harness

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Element not found: {selector} (waited {timeout_ms} ms)")]
    ElementNotFound { selector: String, timeout_ms: u64 },

    #[error("Timed out after {timeout_ms} ms: expected {selector} to {expected}, but observed {actual}")]
    PredicateTimeout {
        selector: String,
        expected: String,
        actual: String,
        timeout_ms: u64,
    },

    #[error("Navigation to {url} failed: {reason}")]
    NavigationFailure { url: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Scenario exceeded its time budget of {budget_ms} ms")]
    ScenarioTimeout { budget_ms: u64 },

    #[error("Interaction failed: {action} on {selector} - {reason}")]
    Interaction {
        action: String,
        selector: String,
        reason: String,
    },

    #[error("Target {url} did not respond after {attempts} attempts")]
    TargetUnreachable { url: String, attempts: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Coarse classification used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ElementNotFound,
    PredicateTimeout,
    NavigationFailure,
    Configuration,
    ScenarioTimeout,
    Interaction,
    Internal,
}

impl HarnessError {
    pub fn config(message: impl Into<String>) -> Self {
        HarnessError::Configuration(message.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            HarnessError::ElementNotFound { .. } => FailureKind::ElementNotFound,
            HarnessError::PredicateTimeout { .. } => FailureKind::PredicateTimeout,
            HarnessError::NavigationFailure { .. } => FailureKind::NavigationFailure,
            HarnessError::Configuration(_)
            | HarnessError::Yaml(_)
            | HarnessError::Toml(_)
            | HarnessError::Url(_) => FailureKind::Configuration,
            HarnessError::ScenarioTimeout { .. } => FailureKind::ScenarioTimeout,
            HarnessError::Interaction { .. } => FailureKind::Interaction,
            HarnessError::TargetUnreachable { .. } => FailureKind::NavigationFailure,
            HarnessError::Io(_) | HarnessError::Json(_) | HarnessError::Http(_) => {
                FailureKind::Internal
            }
        }
    }

    /// Errors that must stop the whole run before (or instead of) running scenarios.
    pub fn is_fatal(&self) -> bool {
        self.kind() == FailureKind::Configuration
            || matches!(self, HarnessError::TargetUnreachable { .. })
    }
}
