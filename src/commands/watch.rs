//! Watch command: stream page text from stdin into the worker queue.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::history::SWEEP_INTERVAL;
use crate::magnet::extract;
use crate::pipeline::Pipeline;
use crate::state::InflightSet;
use crate::transport::{HttpTransport, PageFetcher, DEFAULT_MAX_ATTEMPTS};
use crate::worker::{self, Event};
use crate::notify::Severity;

use super::AppContext;

/// Reads stdin line by line, emitting detection events for every line that
/// holds magnet links. Runs the worker loop and a periodic history sweep
/// until stdin closes.
///
/// # Errors
///
/// Returns an error only for setup failures; per-batch outcomes are
/// reported through notifications.
pub async fn run_watch_command(ctx: &AppContext, origin: Option<&str>) -> Result<()> {
    let Some(token) = ctx.settings.api_token().await? else {
        ctx.notifier.notify(
            Severity::Error,
            "No API token configured. Run: magnet-relay config set-token <token>",
        );
        return Ok(());
    };

    let transport = Arc::new(HttpTransport::new(&token)?);
    let pipeline = Arc::new(Pipeline::new(
        ctx.history.clone(),
        ctx.settings.clone(),
        transport,
        PageFetcher::new()?,
        Arc::new(InflightSet::new()),
        ctx.logs.clone(),
        DEFAULT_MAX_ATTEMPTS,
    ));

    let (tx, rx) = mpsc::channel::<Event>(64);
    let worker = tokio::spawn(worker::run(
        rx,
        pipeline,
        ctx.settings.clone(),
        Arc::clone(&ctx.notifier),
    ));

    // Periodic history sweep; the startup sweep already ran in main
    let sweep_history = ctx.history.clone();
    let sweep_settings = ctx.settings.clone();
    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let window = match sweep_settings.retention_window().await {
                Ok(window) => window,
                Err(e) => {
                    warn!(error = %e, "retention lookup failed, sweep skipped");
                    continue;
                }
            };
            match sweep_history.sweep_expired(window).await {
                Ok(removed) => debug!(removed, "periodic sweep complete"),
                Err(e) => warn!(error = %e, "periodic sweep failed"),
            }
        }
    });

    info!("watching stdin for page text");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let links = extract::all_from_text(&line);
        if links.is_empty() {
            continue;
        }
        let event = Event::LinksDetected {
            links,
            origin: origin.map(ToString::to_string),
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }

    drop(tx);
    sweeper.abort();
    worker.await?;
    info!("watch mode stopped");
    Ok(())
}
