//! Log buffer inspection commands.

use anyhow::{Context, Result};

use crate::logbuf::LogLevel;
use crate::notify::Severity;

use super::AppContext;

/// Prints recent log records, newest first.
///
/// # Errors
///
/// Returns an error for an unknown level name or a failed query.
pub async fn run_logs_show(
    ctx: &AppContext,
    level: Option<&str>,
    component: Option<&str>,
    limit: u32,
) -> Result<()> {
    let level = level
        .map(|raw| raw.parse::<LogLevel>().map_err(anyhow::Error::msg))
        .transpose()
        .context("invalid --level value")?;

    let records = ctx.logs.get(level, component, limit).await?;

    if records.is_empty() {
        println!("No log records");
        return Ok(());
    }

    for record in records {
        match record.detail {
            Some(detail) => println!(
                "{} [{}] {}: {} ({detail})",
                record.ts, record.level, record.component, record.message
            ),
            None => println!(
                "{} [{}] {}: {}",
                record.ts, record.level, record.component, record.message
            ),
        }
    }
    Ok(())
}

/// Deletes all log records.
///
/// # Errors
///
/// Returns an error when the delete fails.
pub async fn run_logs_clear(ctx: &AppContext) -> Result<()> {
    let removed = ctx.logs.clear().await?;
    ctx.notifier
        .notify(Severity::Success, &format!("Cleared {removed} log record(s)"));
    Ok(())
}
