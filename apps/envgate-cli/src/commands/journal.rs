// journal.rs — Feedback journal subcommands: stats, report, tail.
//
// These only read. The journal is opened with `read_journal` so a running
// agent can keep appending while an operator looks at it.

use envgate_feedback::{FeedbackStore, ReportGenerator, Snapshot, StatsAggregator};

use super::Context;

fn load(ctx: &Context) -> anyhow::Result<Option<Snapshot>> {
    let path = ctx.journal_path();
    if !path.exists() {
        println!("No feedback journal found at {}", path.display());
        return Ok(None);
    }
    Ok(Some(FeedbackStore::read_journal(&path)?))
}

pub fn stats(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let Some(snapshot) = load(ctx)? else {
        return Ok(());
    };
    let mut stats = StatsAggregator::compute(&snapshot.outcomes);
    stats.corrupt_records = snapshot.corrupt_records;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Agent:          {}", ctx.agent);
    println!("Environment:    {}", ctx.environment);
    println!("Total outcomes: {}", stats.total_outcomes);
    println!(
        "Results:        {} success, {} failure, {} blocked",
        stats.successes, stats.failures, stats.blocked
    );
    println!("Success rate:   {:.1}%", stats.success_rate);
    if stats.corrupt_records > 0 {
        println!("Corrupt lines:  {}", stats.corrupt_records);
    }
    Ok(())
}

pub fn report(ctx: &Context, top: Option<usize>) -> anyhow::Result<()> {
    let Some(snapshot) = load(ctx)? else {
        return Ok(());
    };
    let mut stats = StatsAggregator::compute(&snapshot.outcomes);
    stats.corrupt_records = snapshot.corrupt_records;

    let mut generator = ReportGenerator::new()
        .with_title(format!("Feedback Report: {} in {}", ctx.agent, ctx.environment));
    if let Some(n) = top {
        generator = generator.with_top_n(n);
    }
    print!("{}", generator.generate(&stats));
    Ok(())
}

pub fn tail(ctx: &Context, n: usize) -> anyhow::Result<()> {
    let Some(snapshot) = load(ctx)? else {
        return Ok(());
    };
    let start = snapshot.outcomes.len().saturating_sub(n);
    let recent = &snapshot.outcomes[start..];

    if recent.is_empty() {
        println!("No outcomes recorded.");
        return Ok(());
    }

    println!(
        "{:<6} {:<20} {:<19} {:<8} TARGET",
        "SEQ", "TIMESTAMP", "TASK", "RESULT"
    );
    println!("{}", "-".repeat(80));

    for outcome in recent {
        println!(
            "{:<6} {:<20} {:<19} {:<8} {}",
            outcome.sequence,
            outcome.timestamp.format("%Y-%m-%d %H:%M:%S"),
            outcome.task_type,
            format!("{:?}", outcome.result).to_lowercase(),
            outcome.target,
        );
    }
    Ok(())
}
