//! Submission history commands.

use anyhow::Result;

use crate::notify::Severity;

use super::AppContext;

/// Prints recent submissions, newest first.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn run_history_list(ctx: &AppContext, limit: u32) -> Result<()> {
    let records = ctx.history.recent(limit).await?;

    if records.is_empty() {
        println!("No submissions in history");
        return Ok(());
    }

    for record in records {
        let origin = record.origin.as_deref().unwrap_or("-");
        println!(
            "{} {} {} {}",
            record.submitted_at, record.hash, record.source, origin
        );
    }
    Ok(())
}

/// Deletes the entire submission history.
///
/// # Errors
///
/// Returns an error when the delete fails.
pub async fn run_history_clear(ctx: &AppContext) -> Result<()> {
    let removed = ctx.history.clear().await?;
    ctx.notifier.notify(
        Severity::Success,
        &format!("Cleared {removed} history record(s)"),
    );
    Ok(())
}

/// Removes records older than the retention window.
///
/// # Errors
///
/// Returns an error when the settings read or the delete fails.
pub async fn run_history_sweep(ctx: &AppContext) -> Result<()> {
    let window = ctx.settings.retention_window().await?;
    let removed = ctx.history.sweep_expired(window).await?;
    ctx.notifier.notify(
        Severity::Success,
        &format!("Swept {removed} expired record(s)"),
    );
    Ok(())
}
