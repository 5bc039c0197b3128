// outcome.rs — Outcome data model.
//
// Every validation (and, when the caller executes the action, its result)
// is recorded as an Outcome: one line in the JSONL feedback journal. The
// sequence number is assigned by the store at write time; everything else
// is fixed when the outcome is built.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use envgate_policy::RiskLevel;

/// Task type names used by the bundled callers.
pub mod task_types {
    pub const COMMAND_VALIDATION: &str = "command_validation";
    pub const PATH_VALIDATION: &str = "path_validation";
    pub const WRITE_VALIDATION: &str = "write_validation";
    pub const DELETE_VALIDATION: &str = "delete_validation";
    pub const NETWORK_VALIDATION: &str = "network_validation";
    pub const WORKDIR_VALIDATION: &str = "workdir_validation";
    /// Used by `record_blocked`, which takes no task type.
    pub const BLOCKED_OPERATION: &str = "blocked_operation";
}

/// How an agent action turned out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeResult {
    /// Allowed, and executed successfully when the caller ran it.
    Success,
    /// Allowed, but execution failed.
    Failure,
    /// Refused by policy.
    Blocked,
}

/// A single recorded outcome: one line in the journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outcome {
    /// Position in the journal, starting at 1. Zero until appended.
    #[serde(default)]
    pub sequence: u64,

    pub outcome_id: Uuid,

    /// When the outcome was recorded (UTC).
    pub timestamp: DateTime<Utc>,

    pub agent_name: String,
    pub environment: String,

    /// What kind of check produced this outcome (e.g. "command_validation").
    pub task_type: String,

    /// The command or path being judged.
    pub target: String,

    pub result: OutcomeResult,

    /// Pattern matched, error text, or block reason.
    #[serde(default)]
    pub detail: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,

    #[serde(default)]
    pub duration_nanos: u64,

    /// Caller-supplied context. Omitted from the line when null.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl Outcome {
    /// Build an outcome stamped with the current time and a fresh ID.
    pub fn new(
        agent_name: impl Into<String>,
        environment: impl Into<String>,
        task_type: impl Into<String>,
        target: impl Into<String>,
        result: OutcomeResult,
    ) -> Self {
        Self {
            sequence: 0,
            outcome_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            agent_name: agent_name.into(),
            environment: environment.into(),
            task_type: task_type.into(),
            target: target.into(),
            result,
            detail: String::new(),
            risk_level: None,
            duration_nanos: 0,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }

    /// Durations beyond `u64::MAX` nanoseconds saturate.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// `target: detail`, the form used in blocked-operation listings.
    pub fn target_with_detail(&self) -> String {
        format!("{}: {}", self.target, self.detail)
    }
}
