//! Allow-list management commands.

use anyhow::Result;

use crate::notify::Severity;
use crate::policy::{parse_bulk, AllowList};

use super::AppContext;

/// Prints the current allow-list, one domain per line.
///
/// # Errors
///
/// Returns an error when the settings read fails.
pub async fn run_domains_list(ctx: &AppContext) -> Result<()> {
    let list = ctx.settings.allow_list().await?;
    for domain in list.domains() {
        println!("{domain}");
    }
    Ok(())
}

/// Replaces the allow-list with the given domains.
///
/// Input is bulk-parsed, so pasted comma- or newline-separated lists work.
/// An update that would leave the list empty is rejected.
///
/// # Errors
///
/// Returns an error when a settings read or write fails.
pub async fn run_domains_set(ctx: &AppContext, domains: &[String]) -> Result<()> {
    let parsed = parse_bulk(&domains.join("\n"));

    let mut list = ctx.settings.allow_list().await?;
    if !list.update(&parsed) {
        ctx.notifier.notify(
            Severity::Error,
            "No valid domains in input; allow-list unchanged",
        );
        return Ok(());
    }

    ctx.settings.set_allow_list(&list).await?;
    ctx.notifier.notify(
        Severity::Success,
        &format!("Allow-list replaced ({} domain(s))", list.domains().len()),
    );
    Ok(())
}

/// Adds one domain to the allow-list.
///
/// # Errors
///
/// Returns an error when a settings read or write fails.
pub async fn run_domains_add(ctx: &AppContext, domain: &str) -> Result<()> {
    let Some(host) = crate::policy::normalize(domain).filter(|h| crate::policy::is_valid_format(h))
    else {
        ctx.notifier
            .notify(Severity::Error, &format!("Invalid domain: {domain}"));
        return Ok(());
    };

    let mut list = ctx.settings.allow_list().await?;
    if list.domains().contains(&host) {
        ctx.notifier
            .notify(Severity::Warning, &format!("{host} is already listed"));
        return Ok(());
    }

    let mut domains: Vec<String> = list.domains().to_vec();
    domains.push(host.clone());
    list.update(&domains);

    ctx.settings.set_allow_list(&list).await?;
    ctx.notifier
        .notify(Severity::Success, &format!("Added {host}"));
    Ok(())
}

/// Restores the built-in seed list.
///
/// # Errors
///
/// Returns an error when the settings write fails.
pub async fn run_domains_reset(ctx: &AppContext) -> Result<()> {
    let list = AllowList::default_seed();
    ctx.settings.set_allow_list(&list).await?;
    ctx.notifier.notify(
        Severity::Success,
        &format!("Allow-list reset to {} default(s)", list.domains().len()),
    );
    Ok(())
}
