// mod.rs — Subcommand implementations and the shared invocation context.

pub mod check;
pub mod inspect;
pub mod journal;
pub mod record;

use std::path::PathBuf;

use anyhow::Context as _;
use envgate_feedback::FeedbackTracker;
use envgate_policy::{EnvironmentCatalog, PolicyEvaluator};

/// Global options every subcommand sees.
pub struct Context {
    pub config: PathBuf,
    pub environment: String,
    pub agent: String,
    pub data_dir: PathBuf,
    /// False when `--no-record` was given.
    pub record: bool,
}

impl Context {
    pub fn evaluator(&self) -> anyhow::Result<PolicyEvaluator> {
        let catalog = EnvironmentCatalog::load(&self.config, &self.environment).with_context(|| {
            format!(
                "failed to load environment '{}' from {}",
                self.environment,
                self.config.display()
            )
        })?;
        Ok(catalog.into_evaluator())
    }

    pub fn tracker(&self) -> anyhow::Result<FeedbackTracker> {
        FeedbackTracker::open(&self.agent, &self.environment, &self.data_dir).with_context(|| {
            format!(
                "failed to open feedback journal for agent '{}' in '{}'",
                self.agent, self.environment
            )
        })
    }

    /// Journal path for the current agent/environment, without opening it.
    pub fn journal_path(&self) -> PathBuf {
        self.data_dir
            .join(&self.environment)
            .join(format!("{}.jsonl", self.agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_path_matches_store_layout() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context {
            config: PathBuf::from("unused.yaml"),
            environment: "staging".into(),
            agent: "builder".into(),
            data_dir: dir.path().to_path_buf(),
            record: true,
        };
        let tracker = ctx.tracker().unwrap();
        assert_eq!(tracker.store().path(), ctx.journal_path());
    }
}
