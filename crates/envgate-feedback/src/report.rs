// report.rs — Plain-text feedback report.
//
// Pure formatting over FeedbackStats: no I/O, no colors, so the output can
// be printed, logged, or written to a file unchanged.

use std::fmt::Write;

use crate::stats::FeedbackStats;

const DEFAULT_TITLE: &str = "Feedback Report";

/// Formats [`FeedbackStats`] into a sectioned text report.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    title: String,
    /// `None` lists every successful pattern.
    top_n: Option<usize>,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            top_n: None,
        }
    }

    /// Limit "Top Successful Patterns" to the `n` most frequent.
    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn generate(&self, stats: &FeedbackStats) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_report(&mut out, stats);
        out
    }

    fn write_report(&self, out: &mut String, stats: &FeedbackStats) -> std::fmt::Result {
        writeln!(out, "{}", self.title)?;
        writeln!(out, "{}", "=".repeat(self.title.chars().count()))?;

        section(out, "Summary")?;
        writeln!(out, "  Total outcomes: {}", stats.total_outcomes)?;
        writeln!(
            out,
            "  Successes: {}  Failures: {}  Blocked: {}",
            stats.successes, stats.failures, stats.blocked
        )?;
        writeln!(out, "  Success rate: {:.1}%", stats.success_rate)?;
        if stats.corrupt_records > 0 {
            writeln!(out, "  Corrupt records skipped: {}", stats.corrupt_records)?;
        }

        section(out, "By Task Type")?;
        if stats.by_task_type.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for (task_type, count) in &stats.by_task_type {
            writeln!(out, "  {}: {}", task_type, count)?;
        }

        section(out, "Top Successful Patterns")?;
        let limit = self.top_n.unwrap_or(usize::MAX);
        let shown: Vec<_> = stats.top_successes.iter().take(limit).collect();
        if shown.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for (rank, entry) in shown.iter().enumerate() {
            let pattern = if entry.pattern.is_empty() {
                "(no pattern)"
            } else {
                entry.pattern.as_str()
            };
            writeln!(out, "  {}. {} ({})", rank + 1, pattern, entry.count)?;
        }

        section(out, "Blocked Operations")?;
        if stats.blocked_operations.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for op in &stats.blocked_operations {
            writeln!(out, "  - {}", op)?;
        }
        Ok(())
    }
}

fn section(out: &mut String, name: &str) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "{}:", name)
}
