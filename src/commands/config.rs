//! Config command handlers: credential, retention, effective settings.

use anyhow::Result;

use crate::notify::Severity;

use super::AppContext;

/// Stores the API token.
///
/// # Errors
///
/// Returns an error when the settings write fails.
pub async fn run_config_set_token(ctx: &AppContext, token: &str) -> Result<()> {
    if token.trim().is_empty() {
        ctx.notifier
            .notify(Severity::Error, "Token must not be empty");
        return Ok(());
    }
    ctx.settings.set_api_token(token).await?;
    ctx.notifier.notify(Severity::Success, "API token stored");
    Ok(())
}

/// Sets the history retention window in days.
///
/// # Errors
///
/// Returns an error when the value is out of range or the write fails.
pub async fn run_config_set_retention(ctx: &AppContext, days: u32) -> Result<()> {
    ctx.settings.set_retention_days(days).await?;
    ctx.notifier
        .notify(Severity::Success, &format!("Retention set to {days} day(s)"));
    Ok(())
}

/// Prints the effective configuration. The token itself is never printed.
///
/// # Errors
///
/// Returns an error when a settings read fails.
pub async fn run_config_show(ctx: &AppContext) -> Result<()> {
    let token = ctx.settings.api_token().await?;
    let retention = ctx.settings.retention_days().await?;
    let list = ctx.settings.allow_list().await?;

    println!(
        "api_token = {}",
        if token.is_some() { "set" } else { "not set" }
    );
    println!("retention_days = {retention}");
    println!("allowed_domains = {}", list.domains().join(", "));
    Ok(())
}
