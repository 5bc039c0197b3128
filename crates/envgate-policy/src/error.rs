// error.rs — Error types for environment loading and policy evaluation.
//
// ConfigError is fatal at startup. PolicyError is the expected, recoverable
// "no" from the evaluator: every variant says why and how risky the refused
// operation was, so the caller can record it in the feedback journal.

use std::path::PathBuf;

use thiserror::Error;

use crate::environment::RiskLevel;

/// Errors raised while loading an environment definition.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read environment config at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid YAML for the expected schema.
    #[error("malformed YAML environment config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The config file is not valid JSON for the expected schema.
    #[error("malformed JSON environment config: {0}")]
    Json(#[from] serde_json::Error),

    /// No environment with the requested name is defined.
    #[error("unknown environment '{name}' (defined: {})", .available.join(", "))]
    UnknownEnvironment {
        name: String,
        available: Vec<String>,
    },

    /// Two environments share a name.
    #[error("environment '{0}' is defined more than once")]
    DuplicateEnvironment(String),

    /// An environment definition is structurally invalid.
    #[error("invalid environment '{environment}': {reason}")]
    Invalid { environment: String, reason: String },

    /// A command pattern is empty or fails to compile as a regex.
    #[error("invalid command pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// A refused operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The process is not running in the environment's working directory.
    #[error("working directory is '{actual}', expected '{}'", .expected.display())]
    WorkingDir { expected: PathBuf, actual: String },

    /// The command matched a block rule or missed the allowlist.
    #[error("command blocked ({risk_level} risk): {reason}")]
    BlockedCommand {
        command: String,
        reason: String,
        risk_level: RiskLevel,
    },

    /// The path is forbidden or outside every permitted root.
    #[error("path '{path}' restricted ({risk_level} risk): {reason}")]
    RestrictedPath {
        path: String,
        reason: String,
        risk_level: RiskLevel,
    },

    /// The path may not be written.
    #[error("write to '{path}' denied ({risk_level} risk): {reason}")]
    WriteDenied {
        path: String,
        reason: String,
        risk_level: RiskLevel,
    },

    /// The path may not be deleted. Always high risk.
    #[error("delete of '{path}' denied (high risk): {reason}")]
    DeleteDenied { path: String, reason: String },

    /// Network access is disabled for the environment.
    #[error("network access denied in environment '{environment}'")]
    NetworkDenied { environment: String },

    /// The file exceeds the environment's size limit.
    #[error("file of {size_bytes} bytes exceeds the {limit_mb} MB limit")]
    FileTooLarge { size_bytes: u64, limit_mb: u64 },
}

impl PolicyError {
    /// Severity of the refused operation.
    pub fn risk_level(&self) -> RiskLevel {
        match self {
            PolicyError::BlockedCommand { risk_level, .. }
            | PolicyError::RestrictedPath { risk_level, .. }
            | PolicyError::WriteDenied { risk_level, .. } => *risk_level,
            PolicyError::DeleteDenied { .. } => RiskLevel::High,
            PolicyError::WorkingDir { .. } | PolicyError::NetworkDenied { .. } => {
                RiskLevel::Medium
            }
            PolicyError::FileTooLarge { .. } => RiskLevel::Low,
        }
    }

    /// The short explanation recorded as the block reason.
    pub fn reason(&self) -> String {
        match self {
            PolicyError::BlockedCommand { reason, .. }
            | PolicyError::RestrictedPath { reason, .. }
            | PolicyError::WriteDenied { reason, .. }
            | PolicyError::DeleteDenied { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_denied_is_always_high_risk() {
        let err = PolicyError::DeleteDenied {
            path: "/tmp/x".to_string(),
            reason: "not under any writable root".to_string(),
        };
        assert_eq!(err.risk_level(), RiskLevel::High);
        assert_eq!(err.reason(), "not under any writable root");
    }

    #[test]
    fn blocked_command_message_names_risk() {
        let err = PolicyError::BlockedCommand {
            command: "sudo rm -rf /".to_string(),
            reason: "matches blocked pattern 'rm -rf /'".to_string(),
            risk_level: RiskLevel::High,
        };
        assert_eq!(
            err.to_string(),
            "command blocked (high risk): matches blocked pattern 'rm -rf /'"
        );
    }

    #[test]
    fn unknown_environment_lists_available_names() {
        let err = ConfigError::UnknownEnvironment {
            name: "qa".to_string(),
            available: vec!["dev".to_string(), "prod".to_string()],
        };
        assert_eq!(err.to_string(), "unknown environment 'qa' (defined: dev, prod)");
    }
}
