// tracker.rs — FeedbackTracker: the facade agents record outcomes through.
//
// Wraps one FeedbackStore and adds typed record helpers plus on-demand
// stats and reports. Every record call builds an Outcome stamped with the
// current UTC time; the store assigns the sequence number.

use std::path::Path;
use std::time::Duration;

use envgate_policy::{PolicyError, RiskLevel};

use crate::error::FeedbackError;
use crate::outcome::{task_types, Outcome, OutcomeResult};
use crate::report::ReportGenerator;
use crate::stats::{FeedbackStats, StatsAggregator};
use crate::store::{FeedbackStore, StoreOptions};

/// Records outcomes for one agent in one environment.
///
/// Share it behind an `Arc` to record from several threads. Every record
/// is in the journal once its call returns, so dropping the tracker without
/// [`close`](Self::close) loses nothing.
#[derive(Debug)]
pub struct FeedbackTracker {
    store: FeedbackStore,
}

impl FeedbackTracker {
    pub fn open(
        agent: &str,
        environment: &str,
        data_dir: impl AsRef<Path>,
    ) -> Result<Self, FeedbackError> {
        Self::open_with(agent, environment, data_dir, StoreOptions::default())
    }

    pub fn open_with(
        agent: &str,
        environment: &str,
        data_dir: impl AsRef<Path>,
        options: StoreOptions,
    ) -> Result<Self, FeedbackError> {
        let store = FeedbackStore::open_with(agent, environment, data_dir, options)?;
        Ok(Self { store })
    }

    /// Record an allowed (and, if executed, successful) action.
    /// `pattern` is what the action matched; it drives "top successes".
    pub fn record_success(
        &self,
        task_type: &str,
        target: &str,
        pattern: &str,
        duration: Duration,
        metadata: serde_json::Value,
    ) -> Result<Outcome, FeedbackError> {
        let outcome = self
            .outcome(task_type, target, OutcomeResult::Success)
            .with_detail(pattern)
            .with_duration(duration)
            .with_metadata(metadata);
        self.commit(outcome)
    }

    /// Record an allowed action that failed when executed.
    pub fn record_failure(
        &self,
        task_type: &str,
        target: &str,
        error_detail: &str,
        duration: Duration,
        metadata: serde_json::Value,
    ) -> Result<Outcome, FeedbackError> {
        let outcome = self
            .outcome(task_type, target, OutcomeResult::Failure)
            .with_detail(error_detail)
            .with_duration(duration)
            .with_metadata(metadata);
        self.commit(outcome)
    }

    /// Record an action refused by policy.
    pub fn record_blocked(
        &self,
        target: &str,
        reason: &str,
        risk_level: RiskLevel,
    ) -> Result<Outcome, FeedbackError> {
        let outcome = self
            .outcome(task_types::BLOCKED_OPERATION, target, OutcomeResult::Blocked)
            .with_detail(reason)
            .with_risk_level(risk_level);
        self.commit(outcome)
    }

    /// Record a denial straight from the evaluator's error, keeping the
    /// task type of the check that produced it.
    pub fn record_policy_denial(
        &self,
        task_type: &str,
        target: &str,
        error: &PolicyError,
    ) -> Result<Outcome, FeedbackError> {
        let outcome = self
            .outcome(task_type, target, OutcomeResult::Blocked)
            .with_detail(error.reason())
            .with_risk_level(error.risk_level());
        self.commit(outcome)
    }

    /// Recompute statistics from the journal, including records written
    /// by earlier runs.
    pub fn stats(&self) -> Result<FeedbackStats, FeedbackError> {
        let snapshot = self.store.snapshot()?;
        let mut stats = StatsAggregator::compute(&snapshot.outcomes);
        stats.corrupt_records = snapshot.corrupt_records;
        Ok(stats)
    }

    pub fn generate_report(&self) -> Result<String, FeedbackError> {
        self.generate_report_with(&ReportGenerator::new())
    }

    pub fn generate_report_with(&self, generator: &ReportGenerator) -> Result<String, FeedbackError> {
        Ok(generator.generate(&self.stats()?))
    }

    /// Release the journal. Later records fail with
    /// [`FeedbackError::Closed`].
    pub fn close(&self) -> Result<(), FeedbackError> {
        self.store.close()
    }

    pub fn store(&self) -> &FeedbackStore {
        &self.store
    }

    fn outcome(&self, task_type: &str, target: &str, result: OutcomeResult) -> Outcome {
        Outcome::new(
            self.store.agent(),
            self.store.environment(),
            task_type,
            target,
            result,
        )
    }

    fn commit(&self, mut outcome: Outcome) -> Result<Outcome, FeedbackError> {
        self.store.append(&mut outcome)?;
        tracing::debug!(
            sequence = outcome.sequence,
            task_type = %outcome.task_type,
            result = ?outcome.result,
            "recorded outcome"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn record_methods_fill_outcome_fields() {
        let dir = tempdir().unwrap();
        let tracker = FeedbackTracker::open("agent-1", "dev", dir.path()).unwrap();

        let ok = tracker
            .record_success(
                task_types::COMMAND_VALIDATION,
                "git status",
                "git",
                Duration::from_micros(40),
                json!({ "cwd": "/repo" }),
            )
            .unwrap();
        assert_eq!(ok.sequence, 1);
        assert_eq!(ok.agent_name, "agent-1");
        assert_eq!(ok.environment, "dev");
        assert_eq!(ok.detail, "git");
        assert_eq!(ok.duration_nanos, 40_000);
        assert_eq!(ok.metadata["cwd"], "/repo");

        let failed = tracker
            .record_failure(
                task_types::COMMAND_VALIDATION,
                "make",
                "exit status 2",
                Duration::ZERO,
                serde_json::Value::Null,
            )
            .unwrap();
        assert_eq!(failed.result, OutcomeResult::Failure);
        assert_eq!(failed.sequence, 2);

        let blocked = tracker.record_blocked("sudo ls", "sudo", RiskLevel::High).unwrap();
        assert_eq!(blocked.task_type, "blocked_operation");
        assert_eq!(blocked.risk_level, Some(RiskLevel::High));
    }

    #[test]
    fn policy_denial_carries_reason_and_risk() {
        let dir = tempdir().unwrap();
        let tracker = FeedbackTracker::open("agent-1", "prod", dir.path()).unwrap();
        let error = PolicyError::DeleteDenied {
            path: "/srv/app".into(),
            reason: "deletes are disabled in environment 'prod'".into(),
        };

        let outcome = tracker
            .record_policy_denial(task_types::DELETE_VALIDATION, "/srv/app", &error)
            .unwrap();
        assert_eq!(outcome.result, OutcomeResult::Blocked);
        assert_eq!(outcome.task_type, "delete_validation");
        assert_eq!(outcome.risk_level, Some(RiskLevel::High));
        assert_eq!(outcome.detail, "deletes are disabled in environment 'prod'");

        let stats = tracker.stats().unwrap();
        assert_eq!(
            stats.blocked_operations,
            vec!["/srv/app: deletes are disabled in environment 'prod'".to_string()]
        );
    }

    #[test]
    fn stats_on_empty_journal() {
        let dir = tempdir().unwrap();
        let tracker = FeedbackTracker::open("agent-1", "dev", dir.path()).unwrap();
        let stats = tracker.stats().unwrap();
        assert_eq!(stats.total_outcomes, 0);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn report_reflects_recorded_outcomes() {
        let dir = tempdir().unwrap();
        let tracker = FeedbackTracker::open("agent-1", "dev", dir.path()).unwrap();
        for _ in 0..3 {
            tracker
                .record_success("command_validation", "ls -la", "ls", Duration::ZERO, json!(null))
                .unwrap();
        }
        tracker.record_blocked("rm -rf /", "baseline", RiskLevel::High).unwrap();

        let report = tracker.generate_report().unwrap();
        assert!(report.contains("Total outcomes: 4"));
        assert!(report.contains("1. ls (3)"));
        assert!(report.contains("- rm -rf /: baseline"));

        let bounded = tracker
            .generate_report_with(&ReportGenerator::new().with_top_n(0))
            .unwrap();
        assert!(!bounded.contains("1. ls"));
    }

    #[test]
    fn record_after_close_fails() {
        let dir = tempdir().unwrap();
        let tracker = FeedbackTracker::open("agent-1", "dev", dir.path()).unwrap();
        tracker.close().unwrap();
        let err = tracker.record_blocked("x", "y", RiskLevel::Low).unwrap_err();
        assert!(matches!(err, FeedbackError::Closed { .. }));
        assert!(tracker.store().is_closed());
    }
}
