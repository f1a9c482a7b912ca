//! Submission pipeline: validate, deduplicate, submit, record.
//!
//! The pipeline is the single path every candidate link takes regardless of
//! surface (explicit submit, selection, watch mode). Ordering per item:
//! grammar validation, hash derivation (fail closed), in-flight guard,
//! duplicate check (fail open on storage errors), retried submission, and a
//! best-effort history write. The in-flight claim is released on every exit
//! path via its RAII token.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::history::{History, SubmissionSource};
use crate::logbuf::{LogLevel, LogStore};
use crate::magnet::{extract, MagnetLink};
use crate::settings::Settings;
use crate::state::InflightSet;
use crate::transport::{with_retry, PageFetcher, Transport};

/// Outcome of processing a single candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Accepted by the remote queue and recorded in history.
    Submitted,
    /// Already submitted within the retention window.
    Duplicate,
    /// A submission for this hash is already in flight.
    AlreadyPending,
    /// Terminal failure after retry, with the classified reason.
    Failed(String),
}

/// Aggregated counts for a processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub success: usize,
    pub duplicates: usize,
    pub errors: usize,
    /// Number of grammar-valid candidates processed.
    pub total: usize,
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} submitted, {} duplicate(s), {} error(s) of {} link(s)",
            self.success, self.duplicates, self.errors, self.total
        )
    }
}

/// Outcome of a batch, distinguishing "found nothing" from "found links and
/// none succeeded".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// No grammar-valid candidates in the input.
    NothingFound,
    Completed(BatchResult),
}

/// The orchestrator wiring extraction, history, and transport together.
pub struct Pipeline {
    history: History,
    settings: Settings,
    transport: Arc<dyn Transport>,
    fetcher: PageFetcher,
    inflight: Arc<InflightSet>,
    logs: LogStore,
    max_attempts: u32,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        history: History,
        settings: Settings,
        transport: Arc<dyn Transport>,
        fetcher: PageFetcher,
        inflight: Arc<InflightSet>,
        logs: LogStore,
        max_attempts: u32,
    ) -> Self {
        Self {
            history,
            settings,
            transport,
            fetcher,
            inflight,
            logs,
            max_attempts,
        }
    }

    /// Runs one candidate through the full pipeline.
    ///
    /// Storage failures around the duplicate check and the history write are
    /// logged and ignored; they never block or fail a submission. A failed
    /// hash derivation fails the item (fail closed), since dedup would be
    /// impossible.
    #[instrument(skip(self, link), fields(hash = ?link.info_hash()))]
    pub async fn process_one(
        &self,
        link: &MagnetLink,
        source: SubmissionSource,
        origin: Option<&str>,
    ) -> ItemOutcome {
        let Some(hash) = link.info_hash() else {
            warn!("candidate has no derivable info-hash");
            return ItemOutcome::Failed("could not derive info-hash".to_string());
        };

        let Some(_token) = self.inflight.try_acquire(&hash) else {
            debug!(hash = %hash, "submission already in flight");
            return ItemOutcome::AlreadyPending;
        };

        let window = match self.settings.retention_window().await {
            Ok(window) => window,
            Err(e) => {
                warn!(error = %e, "retention lookup failed, using default");
                std::time::Duration::from_secs(7 * 24 * 60 * 60)
            }
        };

        match self.history.is_duplicate(&hash, window).await {
            Ok(true) => {
                debug!(hash = %hash, "duplicate within retention window");
                return ItemOutcome::Duplicate;
            }
            Ok(false) => {}
            Err(e) => {
                // Fail open: a broken history must not block submissions
                warn!(error = %e, "duplicate check failed, proceeding");
            }
        }

        let submitted = with_retry(self.max_attempts, || self.transport.submit(link)).await;

        match submitted {
            Ok(receipt) => {
                info!(hash = %hash, transfer_id = receipt.transfer.id, "transfer queued");
                self.logs
                    .record(
                        LogLevel::Info,
                        "Pipeline",
                        "transfer queued",
                        Some(hash.as_str()),
                    )
                    .await;
                if let Err(e) = self.history.mark_submitted(&hash, source, origin).await {
                    warn!(error = %e, "history write failed after submission");
                }
                ItemOutcome::Submitted
            }
            Err(e) => {
                warn!(hash = %hash, error = %e, "submission failed");
                self.logs
                    .record(
                        LogLevel::Error,
                        "Pipeline",
                        "submission failed",
                        Some(&e.to_string()),
                    )
                    .await;
                ItemOutcome::Failed(e.to_string())
            }
        }
    }

    /// Processes candidates strictly sequentially, aggregating counts.
    ///
    /// `AlreadyPending` counts as a duplicate: the content is being handled,
    /// just not by this batch.
    #[instrument(skip(self, candidates), fields(count = candidates.len()))]
    pub async fn process_batch(
        &self,
        candidates: &[MagnetLink],
        source: SubmissionSource,
        origin: Option<&str>,
    ) -> BatchOutcome {
        if candidates.is_empty() {
            return BatchOutcome::NothingFound;
        }

        let mut result = BatchResult {
            total: candidates.len(),
            ..BatchResult::default()
        };

        for link in candidates {
            match self.process_one(link, source, origin).await {
                ItemOutcome::Submitted => result.success += 1,
                ItemOutcome::Duplicate | ItemOutcome::AlreadyPending => result.duplicates += 1,
                ItemOutcome::Failed(_) => result.errors += 1,
            }
        }

        info!(%result, "batch complete");
        BatchOutcome::Completed(result)
    }

    /// Processes an arbitrary text selection.
    ///
    /// Direct magnet extraction is tried first. When the text holds no
    /// magnets, URL candidates are resolved one by one: a magnet embedded in
    /// the URL itself wins, otherwise the page is fetched and scanned. All
    /// finds aggregate into one batch.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn process_selection(
        &self,
        text: &str,
        source: SubmissionSource,
        origin: Option<&str>,
    ) -> BatchOutcome {
        let mut links = extract::all_from_text(text);

        if links.is_empty() {
            for url in extract::url_candidates(text) {
                if let Some(link) = extract::from_url(url.as_str()) {
                    push_unique(&mut links, link);
                    continue;
                }

                match self.fetcher.fetch(&url).await {
                    Ok(html) => {
                        for link in extract::all_from_html(&html) {
                            push_unique(&mut links, link);
                        }
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "page fetch failed");
                        self.logs
                            .record(
                                LogLevel::Warn,
                                "Pipeline",
                                "page fetch failed",
                                Some(&format!("{url}: {e}")),
                            )
                            .await;
                    }
                }
            }
        }

        self.process_batch(&links, source, origin).await
    }
}

fn push_unique(links: &mut Vec<MagnetLink>, link: MagnetLink) {
    if !links.contains(&link) {
        links.push(link);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::db::Database;
    use crate::transport::TransportError;

    const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    /// Transport fake: counts calls, responds per a fixed plan.
    struct FakeTransport {
        calls: AtomicUsize,
        fail_with: Option<fn() -> TransportError>,
    }

    impl FakeTransport {
        fn succeeding() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_with: None,
            }
        }

        fn failing(f: fn() -> TransportError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_with: Some(f),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn submit(
            &self,
            _link: &MagnetLink,
        ) -> Result<crate::transport::SubmitReceipt, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(make_err) = self.fail_with {
                return Err(make_err());
            }
            Ok(crate::transport::SubmitReceipt {
                transfer: crate::transport::TransferInfo {
                    id: 1,
                    name: None,
                    status: None,
                },
            })
        }
    }

    async fn pipeline_with(transport: Arc<FakeTransport>) -> (Pipeline, History) {
        let db = Database::new_in_memory().await.unwrap();
        let history = History::new(db.clone());
        (
            Pipeline::new(
                history.clone(),
                Settings::new(db.clone()),
                transport,
                PageFetcher::new().unwrap(),
                Arc::new(InflightSet::new()),
                LogStore::new(db),
                2,
            ),
            history,
        )
    }

    fn link(hash: &str) -> MagnetLink {
        MagnetLink::parse(&format!("magnet:?xt=urn:btih:{hash}")).unwrap()
    }

    // ==================== process_one ====================

    #[tokio::test]
    async fn test_process_one_submits_and_records() {
        let transport = Arc::new(FakeTransport::succeeding());
        let (pipeline, history) = pipeline_with(Arc::clone(&transport)).await;

        let outcome = pipeline
            .process_one(&link(HASH_A), SubmissionSource::ContextMenu, None)
            .await;

        assert_eq!(outcome, ItemOutcome::Submitted);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        let window = std::time::Duration::from_secs(7 * 24 * 60 * 60);
        assert!(history
            .is_duplicate(&link(HASH_A).info_hash().unwrap(), window)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_process_one_detects_duplicate_without_network_call() {
        let transport = Arc::new(FakeTransport::succeeding());
        let (pipeline, _) = pipeline_with(Arc::clone(&transport)).await;

        pipeline
            .process_one(&link(HASH_A), SubmissionSource::ContextMenu, None)
            .await;
        let second = pipeline
            .process_one(&link(HASH_A), SubmissionSource::ContextMenu, None)
            .await;

        assert_eq!(second, ItemOutcome::Duplicate);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_process_one_same_hash_different_decoration_is_duplicate() {
        let transport = Arc::new(FakeTransport::succeeding());
        let (pipeline, _) = pipeline_with(Arc::clone(&transport)).await;

        pipeline
            .process_one(&link(HASH_A), SubmissionSource::ContextMenu, None)
            .await;

        let decorated =
            MagnetLink::parse(&format!("magnet:?xt=urn:btih:{HASH_A}&dn=Other")).unwrap();
        let outcome = pipeline
            .process_one(&decorated, SubmissionSource::ContextMenu, None)
            .await;

        assert_eq!(outcome, ItemOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_process_one_terminal_failure_not_recorded() {
        let transport = Arc::new(FakeTransport::failing(|| TransportError::InvalidCredential));
        let (pipeline, history) = pipeline_with(Arc::clone(&transport)).await;

        let outcome = pipeline
            .process_one(&link(HASH_A), SubmissionSource::ContextMenu, None)
            .await;

        assert!(matches!(outcome, ItemOutcome::Failed(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        let window = std::time::Duration::from_secs(7 * 24 * 60 * 60);
        assert!(!history
            .is_duplicate(&link(HASH_A).info_hash().unwrap(), window)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_process_one_retries_transient_failure() {
        let transport = Arc::new(FakeTransport::failing(|| TransportError::Timeout));
        let (pipeline, _) = pipeline_with(Arc::clone(&transport)).await;
        // Pause only after the real sqlite connect is done; the retry sleep
        // then runs on virtual time
        tokio::time::pause();

        let outcome = pipeline
            .process_one(&link(HASH_A), SubmissionSource::ContextMenu, None)
            .await;

        assert!(matches!(outcome, ItemOutcome::Failed(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_process_one_releases_inflight_on_failure() {
        let transport = Arc::new(FakeTransport::failing(|| TransportError::RateLimited));
        let (pipeline, _) = pipeline_with(Arc::clone(&transport)).await;

        pipeline
            .process_one(&link(HASH_A), SubmissionSource::ContextMenu, None)
            .await;

        assert!(!pipeline
            .inflight
            .contains(&link(HASH_A).info_hash().unwrap()));
    }

    // ==================== process_batch ====================

    #[tokio::test]
    async fn test_process_batch_empty_is_nothing_found() {
        let (pipeline, _) = pipeline_with(Arc::new(FakeTransport::succeeding())).await;
        let outcome = pipeline
            .process_batch(&[], SubmissionSource::ContextMenu, None)
            .await;
        assert_eq!(outcome, BatchOutcome::NothingFound);
    }

    #[tokio::test]
    async fn test_process_batch_aggregates_mixed_outcomes() {
        let transport = Arc::new(FakeTransport::succeeding());
        let (pipeline, history) = pipeline_with(Arc::clone(&transport)).await;

        // HASH_A is already in history: the batch sees one duplicate and
        // one fresh submission
        history
            .mark_submitted(
                &link(HASH_A).info_hash().unwrap(),
                SubmissionSource::ContextMenu,
                None,
            )
            .await
            .unwrap();

        let outcome = pipeline
            .process_batch(
                &[link(HASH_A), link(HASH_B)],
                SubmissionSource::ContentScript,
                Some("nyaa.si"),
            )
            .await;

        assert_eq!(
            outcome,
            BatchOutcome::Completed(BatchResult {
                success: 1,
                duplicates: 1,
                errors: 0,
                total: 2,
            })
        );
    }

    // ==================== process_selection ====================

    #[tokio::test]
    async fn test_process_selection_extracts_directly() {
        let transport = Arc::new(FakeTransport::succeeding());
        let (pipeline, _) = pipeline_with(Arc::clone(&transport)).await;

        let text = format!(
            "grab magnet:?xt=urn:btih:{HASH_A} and magnet:?xt=urn:btih:{HASH_B}"
        );
        let outcome = pipeline
            .process_selection(&text, SubmissionSource::ContextMenu, None)
            .await;

        assert_eq!(
            outcome,
            BatchOutcome::Completed(BatchResult {
                success: 2,
                duplicates: 0,
                errors: 0,
                total: 2,
            })
        );
    }

    #[tokio::test]
    async fn test_process_selection_malformed_candidates_excluded_from_total() {
        let transport = Arc::new(FakeTransport::succeeding());
        let (pipeline, history) = pipeline_with(Arc::clone(&transport)).await;

        history
            .mark_submitted(
                &link(HASH_A).info_hash().unwrap(),
                SubmissionSource::ContextMenu,
                None,
            )
            .await
            .unwrap();

        // Two valid links (one duplicate, one new) plus a malformed one
        let text = format!(
            "magnet:?xt=urn:btih:{HASH_A} magnet:?xt=urn:btih:{HASH_B} magnet:?xt=urn:btih:short"
        );
        let outcome = pipeline
            .process_selection(&text, SubmissionSource::ContextMenu, None)
            .await;

        assert_eq!(
            outcome,
            BatchOutcome::Completed(BatchResult {
                success: 1,
                duplicates: 1,
                errors: 0,
                total: 2,
            })
        );
    }

    #[tokio::test]
    async fn test_process_selection_nothing_found() {
        let (pipeline, _) = pipeline_with(Arc::new(FakeTransport::succeeding())).await;
        let outcome = pipeline
            .process_selection("no links at all", SubmissionSource::ContextMenu, None)
            .await;
        assert_eq!(outcome, BatchOutcome::NothingFound);
    }

    // ==================== Re-entrancy ====================

    #[tokio::test]
    async fn test_concurrent_same_hash_one_network_call() {
        let transport = Arc::new(FakeTransport::succeeding());
        let (pipeline, _) = pipeline_with(Arc::clone(&transport)).await;
        let pipeline = Arc::new(pipeline);

        let a = {
            let p = Arc::clone(&pipeline);
            tokio::spawn(async move {
                p.process_one(&link(HASH_A), SubmissionSource::ContextMenu, None)
                    .await
            })
        };
        let b = {
            let p = Arc::clone(&pipeline);
            tokio::spawn(async move {
                p.process_one(&link(HASH_A), SubmissionSource::ContextMenu, None)
                    .await
            })
        };

        let (first, second) = (a.await.unwrap(), b.await.unwrap());
        let outcomes = [first, second];

        // One side wins; the other is rejected as pending or, if it ran
        // strictly after, as a duplicate. Never two submissions.
        assert!(outcomes.contains(&ItemOutcome::Submitted));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
