// check.rs — Check subcommands: validate one intended action.
//
// Each check evaluates the intent, records the verdict in the feedback
// journal (best-effort), prints it, and maps a denial to a non-zero exit.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Subcommand;
use envgate_feedback::task_types;
use envgate_policy::{PolicyError, PolicyEvaluator};

use super::Context;

/// Exit code for a denied action.
const DENIED: u8 = 2;

#[derive(Subcommand)]
pub enum CheckCommands {
    /// Check a shell command line.
    Command {
        /// The command line; pass it quoted or after `--`.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Check that a path may be read.
    Path { path: String },
    /// Check that a path may be written.
    Write {
        path: String,
        /// Size of the content to be written, checked against the size limit.
        #[arg(long)]
        size: Option<u64>,
    },
    /// Check that a path may be deleted.
    Delete { path: String },
    /// Check that network access is allowed.
    Network,
    /// Check that a directory matches the environment's working directory.
    Workdir {
        /// Directory to check (defaults to the current directory).
        #[arg(long)]
        cwd: Option<PathBuf>,
    },
}

/// What a check decided, in journal terms.
struct Decision {
    task_type: &'static str,
    target: String,
    /// On success, the pattern the action is bucketed under.
    verdict: Result<String, PolicyError>,
    elapsed: Duration,
}

pub fn execute(cmd: &CheckCommands, ctx: &Context) -> anyhow::Result<ExitCode> {
    let evaluator = ctx.evaluator()?;
    let decision = evaluate(cmd, &evaluator)?;

    let settings = &evaluator.environment().feedback;
    if ctx.record && settings.track_outcomes {
        let elapsed = if settings.collect_metrics {
            decision.elapsed
        } else {
            Duration::ZERO
        };
        record(ctx, &decision, elapsed);
    }

    match &decision.verdict {
        Ok(pattern) => {
            println!("ALLOWED  {} ({})", decision.target, pattern);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("DENIED   {} [{} risk]", decision.target, e.risk_level());
            println!("  Reason: {}", e.reason());
            Ok(ExitCode::from(DENIED))
        }
    }
}

fn evaluate(cmd: &CheckCommands, evaluator: &PolicyEvaluator) -> anyhow::Result<Decision> {
    let started = Instant::now();
    let (task_type, target, verdict) = match cmd {
        CheckCommands::Command { command } => {
            let line = command.join(" ");
            let verdict = evaluator
                .validate_command(&line)
                .map(|v| v.pattern().to_string());
            (task_types::COMMAND_VALIDATION, line, verdict)
        }
        CheckCommands::Path { path } => (
            task_types::PATH_VALIDATION,
            path.clone(),
            evaluator.validate_path(path).map(|p| p.display().to_string()),
        ),
        CheckCommands::Write { path, size } => {
            let verdict = evaluator.validate_write(path).and_then(|p| {
                if let Some(bytes) = size {
                    evaluator.validate_file_size(*bytes)?;
                }
                Ok(p.display().to_string())
            });
            (task_types::WRITE_VALIDATION, path.clone(), verdict)
        }
        CheckCommands::Delete { path } => (
            task_types::DELETE_VALIDATION,
            path.clone(),
            evaluator.validate_delete(path).map(|p| p.display().to_string()),
        ),
        CheckCommands::Network => (
            task_types::NETWORK_VALIDATION,
            "network".to_string(),
            evaluator.validate_network().map(|()| "network".to_string()),
        ),
        CheckCommands::Workdir { cwd } => {
            let dir = match cwd {
                Some(dir) => dir.clone(),
                None => std::env::current_dir()?,
            };
            let verdict = evaluator
                .validate_working_directory_at(&dir)
                .map(|()| evaluator.environment().working_dir.display().to_string());
            (task_types::WORKDIR_VALIDATION, dir.display().to_string(), verdict)
        }
    };

    Ok(Decision {
        task_type,
        target,
        verdict,
        elapsed: started.elapsed(),
    })
}

/// Journal failures never change the verdict; they are logged and dropped.
fn record(ctx: &Context, decision: &Decision, elapsed: Duration) {
    let tracker = match ctx.tracker() {
        Ok(tracker) => tracker,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "feedback not recorded");
            return;
        }
    };

    let result = match &decision.verdict {
        Ok(pattern) => tracker.record_success(
            decision.task_type,
            &decision.target,
            pattern,
            elapsed,
            serde_json::Value::Null,
        ),
        Err(e) => tracker.record_policy_denial(decision.task_type, &decision.target, e),
    };
    if let Err(e) = result.and_then(|_| tracker.close()) {
        tracing::warn!(error = %e, "feedback not recorded");
    }
}
