//! Single-consumer event queue with detection debouncing.
//!
//! All inbound surfaces feed one mpsc channel consumed by one task, so
//! pipeline work is serialized by construction. `LinksDetected` events are
//! coalesced inside a 500 ms window before hitting the pipeline: pages that
//! mutate rapidly produce one batch instead of a burst.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::history::SubmissionSource;
use crate::magnet::MagnetLink;
use crate::notify::{Notifier, Severity};
use crate::pipeline::{BatchOutcome, BatchResult, ItemOutcome, Pipeline};
use crate::settings::Settings;
use crate::state::ItemTable;

/// How long detected-link batches are coalesced before processing.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Events consumed by the worker.
#[derive(Debug)]
pub enum Event {
    /// Links detected on a page; coalesced within the debounce window.
    LinksDetected {
        links: Vec<MagnetLink>,
        origin: Option<String>,
    },
    /// A user-selected piece of text to scan and submit.
    Selection { text: String, origin: Option<String> },
    /// The allow-list changed; re-read from settings on next use.
    PolicyUpdated,
}

/// Runs the worker loop until the channel closes.
///
/// Detection events accumulate for [`DEBOUNCE_WINDOW`] after the first one
/// arrives; a non-detection event arriving inside the window is held and
/// handled right after the flush, preserving order without dropping it.
#[instrument(skip_all)]
pub async fn run(
    mut rx: mpsc::Receiver<Event>,
    pipeline: Arc<Pipeline>,
    settings: Settings,
    notifier: Arc<dyn Notifier>,
) {
    info!("worker started");
    let mut table = ItemTable::new();

    while let Some(event) = rx.recv().await {
        let mut queued: Option<Event> = None;

        match event {
            Event::LinksDetected { links, origin } => {
                let (links, origin) = coalesce(&mut rx, links, origin, &mut queued).await;
                dispatch_links(
                    &pipeline,
                    &settings,
                    notifier.as_ref(),
                    &mut table,
                    links,
                    origin,
                )
                .await;
            }
            other => queued = Some(other),
        }

        if let Some(event) = queued {
            handle_immediate(&pipeline, notifier.as_ref(), event).await;
        }

        for transition in table.tick(Instant::now()) {
            debug!(?transition, "item transition applied");
        }
    }

    info!("worker stopped");
}

/// Accumulates further `LinksDetected` events until the window closes or the
/// channel ends. A non-detection event ends accumulation early and is handed
/// back through `queued`.
async fn coalesce(
    rx: &mut mpsc::Receiver<Event>,
    mut links: Vec<MagnetLink>,
    mut origin: Option<String>,
    queued: &mut Option<Event>,
) -> (Vec<MagnetLink>, Option<String>) {
    let window = tokio::time::sleep(DEBOUNCE_WINDOW);
    tokio::pin!(window);

    loop {
        tokio::select! {
            () = &mut window => break,
            maybe = rx.recv() => match maybe {
                Some(Event::LinksDetected { links: more, origin: more_origin }) => {
                    for link in more {
                        if !links.contains(&link) {
                            links.push(link);
                        }
                    }
                    origin = origin.or(more_origin);
                }
                Some(other) => {
                    *queued = Some(other);
                    break;
                }
                None => break,
            },
        }
    }

    debug!(count = links.len(), "detection window closed");
    (links, origin)
}

async fn dispatch_links(
    pipeline: &Pipeline,
    settings: &Settings,
    notifier: &dyn Notifier,
    table: &mut ItemTable,
    links: Vec<MagnetLink>,
    origin: Option<String>,
) {
    // Auto-detected links only submit from allow-listed origins
    if let Some(host) = origin.as_deref() {
        match settings.allow_list().await {
            Ok(list) if !list.matches(host) => {
                debug!(host, "origin not allow-listed, batch skipped");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "allow-list read failed, batch skipped");
                return;
            }
        }
    }

    if links.is_empty() {
        announce(notifier, &BatchOutcome::NothingFound);
        return;
    }

    let mut result = BatchResult {
        total: links.len(),
        ..BatchResult::default()
    };

    for link in links {
        let Some(hash) = link.info_hash() else {
            result.errors += 1;
            continue;
        };
        if table.begin(&hash).is_err() {
            // A submission from an earlier window is still pending
            result.duplicates += 1;
            continue;
        }

        let outcome = pipeline
            .process_one(&link, SubmissionSource::ContentScript, origin.as_deref())
            .await;
        let settled_ok = matches!(outcome, ItemOutcome::Submitted | ItemOutcome::Duplicate);
        table.settle(&hash, settled_ok, Instant::now());

        match outcome {
            ItemOutcome::Submitted => result.success += 1,
            ItemOutcome::Duplicate | ItemOutcome::AlreadyPending => result.duplicates += 1,
            ItemOutcome::Failed(_) => result.errors += 1,
        }
    }

    announce(notifier, &BatchOutcome::Completed(result));
}

async fn handle_immediate(pipeline: &Pipeline, notifier: &dyn Notifier, event: Event) {
    match event {
        Event::Selection { text, origin } => {
            let outcome = pipeline
                .process_selection(&text, SubmissionSource::ContextMenu, origin.as_deref())
                .await;
            announce(notifier, &outcome);
        }
        Event::PolicyUpdated => {
            // Allow-list is re-read from settings per batch; nothing cached
            info!("allow-list updated");
        }
        Event::LinksDetected { .. } => {
            debug!("detection event handled out of band");
        }
    }
}

/// Turns a batch outcome into exactly one notification.
pub fn announce(notifier: &dyn Notifier, outcome: &BatchOutcome) {
    match outcome {
        BatchOutcome::NothingFound => {
            notifier.notify(Severity::Warning, "No magnet links found");
        }
        BatchOutcome::Completed(result) => {
            let severity = if result.errors > 0 {
                Severity::Error
            } else if result.success > 0 {
                Severity::Success
            } else {
                Severity::Warning
            };
            notifier.notify(severity, &result.to_string());
        }
    }
}
