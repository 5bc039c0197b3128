// inspect.rs — Configuration inspection: constraints, environments.

use anyhow::Context as _;
use envgate_policy::EnvironmentCatalog;

use super::Context;

pub fn constraints(ctx: &Context) -> anyhow::Result<()> {
    let evaluator = ctx.evaluator()?;
    let summary = serde_json::to_string_pretty(&evaluator.constraints_summary())?;
    println!("{}", summary);
    Ok(())
}

pub fn environments(ctx: &Context) -> anyhow::Result<()> {
    let names = EnvironmentCatalog::names(&ctx.config)
        .with_context(|| format!("failed to read {}", ctx.config.display()))?;

    if names.is_empty() {
        println!("No environments defined in {}", ctx.config.display());
        return Ok(());
    }
    for name in names {
        let marker = if name == ctx.environment { "*" } else { " " };
        println!("{} {}", marker, name);
    }
    Ok(())
}
