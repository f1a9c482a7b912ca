//! Submit command: scan input text and relay new magnet links.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::notify::Severity;
use crate::pipeline::Pipeline;
use crate::state::InflightSet;
use crate::transport::{HttpTransport, PageFetcher, DEFAULT_MAX_ATTEMPTS};
use crate::worker::announce;

use super::AppContext;

/// Scans the given inputs (or stdin) for magnet links and submits them.
///
/// Always ends in exactly one notification; pipeline failures surface there
/// rather than as an error return.
///
/// # Errors
///
/// Returns an error only for setup failures (stdin read, HTTP client
/// construction), never for per-link outcomes.
pub async fn run_submit_command(
    ctx: &AppContext,
    inputs: &[String],
    origin: Option<&str>,
) -> Result<()> {
    let text = if inputs.is_empty() {
        if io::stdin().is_terminal() {
            ctx.notifier.notify(
                Severity::Warning,
                "No input provided. Pass links as arguments or pipe text via stdin.",
            );
            return Ok(());
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        inputs.join("\n")
    };

    let Some(token) = ctx.settings.api_token().await? else {
        ctx.notifier.notify(
            Severity::Error,
            "No API token configured. Run: magnet-relay config set-token <token>",
        );
        return Ok(());
    };

    let transport = Arc::new(HttpTransport::new(&token)?);
    let pipeline = Pipeline::new(
        ctx.history.clone(),
        ctx.settings.clone(),
        transport,
        PageFetcher::new()?,
        Arc::new(InflightSet::new()),
        ctx.logs.clone(),
        DEFAULT_MAX_ATTEMPTS,
    );

    debug!(text_len = text.len(), "processing submit input");
    let outcome = pipeline
        .process_selection(&text, crate::history::SubmissionSource::ContextMenu, origin)
        .await;

    announce(ctx.notifier.as_ref(), &outcome);
    Ok(())
}
