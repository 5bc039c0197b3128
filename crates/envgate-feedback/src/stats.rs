// stats.rs — Aggregate statistics over a journal snapshot.
//
// Stats are derived, never stored: every call recomputes them from the
// outcomes it is given, in one pass, so they always reflect the journal.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::outcome::{Outcome, OutcomeResult};

/// How many successful outcomes matched one pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternCount {
    pub pattern: String,
    pub count: usize,
}

/// Aggregate statistics for one journal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackStats {
    pub total_outcomes: usize,
    pub successes: usize,
    pub failures: usize,
    pub blocked: usize,

    /// successes / (successes + failures) × 100, one decimal. Blocked
    /// outcomes are not part of the denominator. 0 when nothing was judged.
    pub success_rate: f64,

    /// Task type → count, across every result.
    pub by_task_type: BTreeMap<String, usize>,

    /// Successful patterns, most frequent first; ties keep first-seen order.
    pub top_successes: Vec<PatternCount>,

    /// Distinct `target: reason` strings for blocked outcomes, first-seen order.
    pub blocked_operations: Vec<String>,

    /// Malformed journal lines skipped by the snapshot behind these stats.
    pub corrupt_records: usize,
}

/// Computes [`FeedbackStats`] from a sequence of outcomes.
pub struct StatsAggregator;

impl StatsAggregator {
    pub fn compute(outcomes: &[Outcome]) -> FeedbackStats {
        let mut stats = FeedbackStats {
            total_outcomes: outcomes.len(),
            ..FeedbackStats::default()
        };

        let mut pattern_index: HashMap<&str, usize> = HashMap::new();
        let mut seen_blocked: HashSet<String> = HashSet::new();

        for outcome in outcomes {
            *stats
                .by_task_type
                .entry(outcome.task_type.clone())
                .or_insert(0) += 1;

            match outcome.result {
                OutcomeResult::Success => {
                    stats.successes += 1;
                    match pattern_index.get(outcome.detail.as_str()) {
                        Some(&i) => stats.top_successes[i].count += 1,
                        None => {
                            pattern_index.insert(&outcome.detail, stats.top_successes.len());
                            stats.top_successes.push(PatternCount {
                                pattern: outcome.detail.clone(),
                                count: 1,
                            });
                        }
                    }
                }
                OutcomeResult::Failure => stats.failures += 1,
                OutcomeResult::Blocked => {
                    stats.blocked += 1;
                    let entry = outcome.target_with_detail();
                    if seen_blocked.insert(entry.clone()) {
                        stats.blocked_operations.push(entry);
                    }
                }
            }
        }

        // `sort_by` is stable, so equal counts stay in first-seen order.
        stats.top_successes.sort_by(|a, b| b.count.cmp(&a.count));
        stats.success_rate = success_rate(stats.successes, stats.failures);
        stats
    }
}

fn success_rate(successes: usize, failures: usize) -> f64 {
    let judged = successes + failures;
    if judged == 0 {
        return 0.0;
    }
    (successes as f64 * 1000.0 / judged as f64).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(task: &str, target: &str, result: OutcomeResult, detail: &str) -> Outcome {
        Outcome::new("agent-1", "dev", task, target, result).with_detail(detail)
    }

    #[test]
    fn empty_input_is_all_zero() {
        let stats = StatsAggregator::compute(&[]);
        assert_eq!(stats, FeedbackStats::default());
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn blocked_excluded_from_rate() {
        let mut outcomes = Vec::new();
        for _ in 0..8 {
            outcomes.push(make("command_validation", "ls", OutcomeResult::Success, "ls"));
        }
        for _ in 0..2 {
            outcomes.push(make("command_validation", "make", OutcomeResult::Failure, "exit 2"));
        }
        outcomes.push(make("blocked_operation", "sudo ls", OutcomeResult::Blocked, "sudo"));

        let stats = StatsAggregator::compute(&outcomes);
        assert_eq!(stats.total_outcomes, 11);
        assert_eq!(stats.success_rate, 80.0);
        assert_eq!(stats.blocked, 1);
    }

    #[test]
    fn only_blocked_gives_zero_rate() {
        let outcomes = vec![make("blocked_operation", "rm -rf /", OutcomeResult::Blocked, "baseline")];
        let stats = StatsAggregator::compute(&outcomes);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.total_outcomes, 1);
    }

    #[test]
    fn rate_rounds_to_one_decimal() {
        let outcomes = vec![
            make("t", "a", OutcomeResult::Success, "a"),
            make("t", "b", OutcomeResult::Failure, "x"),
            make("t", "c", OutcomeResult::Failure, "x"),
        ];
        assert_eq!(StatsAggregator::compute(&outcomes).success_rate, 33.3);

        let outcomes = vec![
            make("t", "a", OutcomeResult::Success, "a"),
            make("t", "b", OutcomeResult::Success, "b"),
            make("t", "c", OutcomeResult::Failure, "x"),
        ];
        assert_eq!(StatsAggregator::compute(&outcomes).success_rate, 66.7);
    }

    #[test]
    fn by_task_type_counts_every_result() {
        let outcomes = vec![
            make("command_validation", "ls", OutcomeResult::Success, "ls"),
            make("command_validation", "sudo", OutcomeResult::Blocked, "sudo"),
            make("path_validation", "/tmp", OutcomeResult::Failure, "io"),
        ];
        let stats = StatsAggregator::compute(&outcomes);
        assert_eq!(stats.by_task_type["command_validation"], 2);
        assert_eq!(stats.by_task_type["path_validation"], 1);
    }

    #[test]
    fn top_successes_ties_keep_first_seen_order() {
        let outcomes = vec![
            make("t", "1", OutcomeResult::Success, "git"),
            make("t", "2", OutcomeResult::Success, "ls"),
            make("t", "3", OutcomeResult::Success, "cargo"),
            make("t", "4", OutcomeResult::Success, "cargo"),
            make("t", "5", OutcomeResult::Success, "ls"),
            make("t", "6", OutcomeResult::Failure, "git"),
        ];
        let stats = StatsAggregator::compute(&outcomes);
        let order: Vec<(&str, usize)> = stats
            .top_successes
            .iter()
            .map(|p| (p.pattern.as_str(), p.count))
            .collect();
        assert_eq!(order, vec![("ls", 2), ("cargo", 2), ("git", 1)]);
    }

    #[test]
    fn blocked_operations_are_distinct_in_first_seen_order() {
        let outcomes = vec![
            make("blocked_operation", "sudo ls", OutcomeResult::Blocked, "sudo"),
            make("blocked_operation", "/etc/passwd", OutcomeResult::Blocked, "forbidden"),
            make("blocked_operation", "sudo ls", OutcomeResult::Blocked, "sudo"),
            make("blocked_operation", "sudo ls", OutcomeResult::Blocked, "other reason"),
        ];
        let stats = StatsAggregator::compute(&outcomes);
        assert_eq!(
            stats.blocked_operations,
            vec![
                "sudo ls: sudo".to_string(),
                "/etc/passwd: forbidden".to_string(),
                "sudo ls: other reason".to_string(),
            ]
        );
        assert_eq!(stats.blocked, 4);
    }

    #[test]
    fn compute_is_deterministic() {
        let outcomes = vec![
            make("t", "1", OutcomeResult::Success, "a"),
            make("t", "2", OutcomeResult::Success, "b"),
            make("t", "3", OutcomeResult::Blocked, "c"),
        ];
        assert_eq!(
            StatsAggregator::compute(&outcomes),
            StatsAggregator::compute(&outcomes)
        );
    }
}
