// record.rs — Record subcommands: report the result of an executed action.

use std::time::Duration;

use clap::{Args, Subcommand};
use envgate_policy::FeedbackSettings;

use super::Context;

#[derive(Args)]
pub struct RecordArgs {
    /// Task type the action belongs to (e.g. command_validation).
    #[arg(long)]
    task_type: String,
    /// The command or path that was acted on.
    #[arg(long)]
    target: String,
    /// Pattern for a success, error text for a failure.
    #[arg(long, default_value = "")]
    detail: String,
    /// How long the action took.
    #[arg(long)]
    duration_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// The action ran and succeeded.
    Success(RecordArgs),
    /// The action ran and failed.
    Failure(RecordArgs),
}

pub fn execute(cmd: &RecordCommands, ctx: &Context) -> anyhow::Result<()> {
    let settings = ctx.evaluator()?.environment().feedback;

    let Some(args) = admitted(cmd, ctx, &settings) else {
        println!("Not recorded (disabled for environment '{}').", ctx.environment);
        return Ok(());
    };

    let duration = match args.duration_ms {
        Some(ms) if settings.collect_metrics => Duration::from_millis(ms),
        _ => Duration::ZERO,
    };

    let tracker = ctx.tracker()?;
    let outcome = match cmd {
        RecordCommands::Success(_) => tracker.record_success(
            &args.task_type,
            &args.target,
            &args.detail,
            duration,
            serde_json::Value::Null,
        )?,
        RecordCommands::Failure(_) => tracker.record_failure(
            &args.task_type,
            &args.target,
            &args.detail,
            duration,
            serde_json::Value::Null,
        )?,
    };
    tracker.close()?;

    println!("Recorded outcome #{} ({:?}).", outcome.sequence, outcome.result);
    Ok(())
}

/// The arguments to record, or `None` when settings say to skip it.
fn admitted<'a>(
    cmd: &'a RecordCommands,
    ctx: &Context,
    settings: &FeedbackSettings,
) -> Option<&'a RecordArgs> {
    if !ctx.record || !settings.track_outcomes {
        return None;
    }
    match cmd {
        RecordCommands::Success(args) => Some(args),
        RecordCommands::Failure(args) if settings.auto_report_errors => Some(args),
        RecordCommands::Failure(_) => None,
    }
}
