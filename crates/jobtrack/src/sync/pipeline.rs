//! Ingestion pipeline
//!
//! One run walks every listing page after the owner's watermark, stores each
//! job application it finds, mirrors the page's rows to the spreadsheet and
//! finally appends a checkpoint. Upserts are durable as they happen; only the
//! checkpoint waits for the end of the run, so an interrupted run is simply
//! repeated from the same watermark.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::locks::OwnerLocks;
use super::watermark::resolve_watermark;
use crate::classifier::Classifier;
use crate::config::IngestConfig;
use crate::error::{IngestError, SkipStage, SkippedMessage};
use crate::models::{ApplicationUpdate, Classification, MessageId, SheetRow};
use crate::parser::MessageParser;
use crate::sheets::{MirrorReport, SheetMirror};
use crate::source::MessageSource;
use crate::storage::{ApplicationStore, CheckpointLog};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    FetchingPage,
    ClassifyingBatch,
    MirroringBatch,
    Checkpointing,
    Aborted,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FetchingPage => "fetching page",
            Self::ClassifyingBatch => "classifying batch",
            Self::MirroringBatch => "mirroring batch",
            Self::Checkpointing => "checkpointing",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Cooperative stop signal, checked between messages
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous cancel so the next run can proceed
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Statistics from one pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Lower bound used for the listing
    pub watermark: Option<DateTime<Utc>>,
    /// Listing pages fetched
    pub pages: usize,
    /// Message ids returned across all pages
    pub messages_listed: usize,
    /// Applications created
    pub created: usize,
    /// Existing applications whose status was refreshed
    pub updated: usize,
    /// Messages classified as unrelated to a job application
    pub not_job_related: usize,
    /// Messages dropped at fetch, parse or classify
    pub skipped: Vec<SkippedMessage>,
    /// Spreadsheet writes across all batches
    pub mirror: MirrorReport,
    /// Checkpoint written at the end of the run
    pub checkpoint: Option<DateTime<Utc>>,
    /// Last phase reached
    pub phase: RunPhase,
    pub duration_ms: u64,
}

impl RunReport {
    /// Messages that produced a stored application
    pub fn stored(&self) -> usize {
        self.created + self.updated
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Fetch, classify, store, mirror, checkpoint
///
/// Collaborators are injected as trait objects. The same pipeline may be
/// shared across threads; runs for one owner are serialized through
/// [`OwnerLocks`], runs for different owners proceed in parallel.
pub struct IngestionPipeline {
    source: Arc<dyn MessageSource>,
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn ApplicationStore>,
    checkpoints: Arc<dyn CheckpointLog>,
    mirror: Arc<dyn SheetMirror>,
    parser: MessageParser,
    page_size: usize,
    start_from: DateTime<Utc>,
    locks: Arc<OwnerLocks>,
    cancellation: CancellationFlag,
    clock: Clock,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn MessageSource>,
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn ApplicationStore>,
        checkpoints: Arc<dyn CheckpointLog>,
        mirror: Arc<dyn SheetMirror>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            source,
            classifier,
            store,
            checkpoints,
            mirror,
            parser: MessageParser::new(),
            page_size: config.page_size,
            start_from: config.start_from_utc(),
            locks: Arc::new(OwnerLocks::new()),
            cancellation: CancellationFlag::new(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Share a lock registry with other pipelines over the same store
    pub fn with_locks(mut self, locks: Arc<OwnerLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// Replace the wall clock used for watermarks and checkpoints
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Run one full ingestion cycle for `owner`
    ///
    /// # Arguments
    /// * `owner` - Mailbox owner whose applications and checkpoints are used
    /// * `sheet_name` - Tab receiving the mirrored rows
    ///
    /// # Returns
    /// The run report once the checkpoint is written. Listing failures,
    /// store failures and cancellation end the run without a checkpoint.
    pub fn run(&self, owner: &str, sheet_name: &str) -> Result<RunReport, IngestError> {
        let owner_lock = self.locks.for_owner(owner);
        // Guards no data; a panic in another run leaves nothing inconsistent
        let _guard = owner_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let start = Instant::now();
        let mut report = RunReport::default();

        let result = self.run_locked(owner, sheet_name, &mut report);
        report.duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                info!(
                    "Run for {} complete: {} listed, {} created, {} updated, {} unrelated, {} skipped, {} row(s) mirrored, {} mirror failure(s) in {}ms",
                    owner,
                    report.messages_listed,
                    report.created,
                    report.updated,
                    report.not_job_related,
                    report.skipped.len(),
                    report.mirror.written,
                    report.mirror.failed.len(),
                    report.duration_ms
                );
                Ok(report)
            }
            Err(e) => {
                warn!(
                    "Run for {} stopped in phase '{}' after {} page(s), {} stored: {}",
                    owner,
                    report.phase,
                    report.pages,
                    report.stored(),
                    e
                );
                Err(e)
            }
        }
    }

    fn run_locked(
        &self,
        owner: &str,
        sheet_name: &str,
        report: &mut RunReport,
    ) -> Result<(), IngestError> {
        let latest = self
            .checkpoints
            .latest(owner)
            .map_err(IngestError::Checkpoint)?;
        let watermark = resolve_watermark(latest, (self.clock)(), self.start_from);
        report.watermark = Some(watermark);
        info!("Ingesting mail for {} after {}", owner, watermark);

        let mut page_token: Option<String> = None;
        loop {
            enter(report, RunPhase::FetchingPage);
            let page = match self.source.list_messages(
                watermark.date_naive(),
                page_token.as_deref(),
                self.page_size,
            ) {
                Ok(page) => page,
                Err(e) => {
                    enter(report, RunPhase::Aborted);
                    return Err(IngestError::Listing(e));
                }
            };
            report.pages += 1;
            report.messages_listed += page.message_ids.len();
            debug!(
                "Page {} for {}: {} message(s)",
                report.pages,
                owner,
                page.message_ids.len()
            );

            enter(report, RunPhase::ClassifyingBatch);
            let mut batch: Vec<SheetRow> = Vec::new();
            let mut cancelled = false;
            for id in &page.message_ids {
                if self.cancellation.is_cancelled() {
                    cancelled = true;
                    break;
                }
                if let Some(row) = self.process_message(owner, id, report)? {
                    push_row(&mut batch, row);
                }
            }

            // Positional writes, so a cancelled run still leaves a whole batch
            if !batch.is_empty() {
                enter(report, RunPhase::MirroringBatch);
                let mirrored = self.mirror.place(sheet_name, &batch);
                if !mirrored.is_complete() {
                    warn!(
                        "{} of {} row(s) failed to mirror for {}",
                        mirrored.failed.len(),
                        batch.len(),
                        owner
                    );
                }
                report.mirror.merge(mirrored);
            }

            if cancelled {
                enter(report, RunPhase::Aborted);
                return Err(IngestError::Cancelled);
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        enter(report, RunPhase::Checkpointing);
        let fetched_at = (self.clock)();
        self.checkpoints
            .record(owner, fetched_at)
            .map_err(IngestError::Checkpoint)?;
        report.checkpoint = Some(fetched_at);

        enter(report, RunPhase::Idle);
        Ok(())
    }

    /// Fetch, parse, classify and store one message.
    ///
    /// Returns the row to mirror when an application was stored. Per-message
    /// failures are recorded on the report and yield `Ok(None)`.
    fn process_message(
        &self,
        owner: &str,
        id: &MessageId,
        report: &mut RunReport,
    ) -> Result<Option<SheetRow>, IngestError> {
        let raw = match self.source.fetch_raw(id) {
            Ok(raw) => raw,
            Err(e) => {
                let transient = e.is_transient();
                skip(report, id, SkipStage::Fetch, e.to_string(), transient);
                return Ok(None);
            }
        };

        let email = match self.parser.parse(&raw) {
            Ok(email) => email,
            Err(e) => {
                skip(report, id, SkipStage::Parse, e.reason, false);
                return Ok(None);
            }
        };

        let classification = match self.classifier.classify(&email.subject, &email.body) {
            Ok(classification) => classification,
            Err(e) => {
                let transient = e.is_transient();
                skip(report, id, SkipStage::Classify, e.to_string(), transient);
                return Ok(None);
            }
        };

        let Some((job_title, company)) = application_identity(&classification) else {
            if classification.is_job_application {
                skip(
                    report,
                    id,
                    SkipStage::Classify,
                    "job application without title or company".to_string(),
                    false,
                );
            } else {
                debug!("Message {} is not job related", id);
                report.not_job_related += 1;
            }
            return Ok(None);
        };

        let update = ApplicationUpdate {
            job_title,
            company,
            status: classification.status,
            sender_email: email.sender,
        };
        let (application, created) = self
            .store
            .upsert(owner, update)
            .map_err(IngestError::Store)?;

        if created {
            report.created += 1;
            info!(
                "New application #{}: {} at {} ({})",
                application.row_number,
                application.job_title,
                application.company,
                application.status
            );
        } else {
            report.updated += 1;
            debug!(
                "Updated application #{} to {}",
                application.row_number, application.status
            );
        }

        Ok(Some(application.sheet_row()))
    }
}

fn enter(report: &mut RunReport, phase: RunPhase) {
    debug!("Pipeline phase: {} -> {}", report.phase, phase);
    report.phase = phase;
}

fn skip(report: &mut RunReport, id: &MessageId, stage: SkipStage, reason: String, transient: bool) {
    warn!("Skipping message {} at {}: {}", id, stage, reason);
    report.skipped.push(SkippedMessage {
        message_id: id.clone(),
        stage,
        reason,
        transient,
    });
}

/// Trimmed title and company of a job application classification
fn application_identity(classification: &Classification) -> Option<(String, String)> {
    if !classification.is_job_application {
        return None;
    }
    let title = classification.job_title.as_deref()?.trim();
    let company = classification.company_name.as_deref()?.trim();
    if title.is_empty() || company.is_empty() {
        return None;
    }
    Some((title.to_string(), company.to_string()))
}

/// Add a row to the batch; a later sighting of the same row replaces the earlier one
fn push_row(batch: &mut Vec<SheetRow>, row: SheetRow) {
    match batch.iter_mut().find(|r| r.row_number == row.row_number) {
        Some(existing) => *existing = row,
        None => batch.push(row),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplicationStatus;

    fn make_test_row(row_number: u32, status: ApplicationStatus) -> SheetRow {
        SheetRow {
            job_title: "SRE".to_string(),
            company: "Acme".to_string(),
            status,
            row_number,
        }
    }

    #[test]
    fn test_push_row_keeps_latest_status() {
        let mut batch = Vec::new();
        push_row(&mut batch, make_test_row(1, ApplicationStatus::Applied));
        push_row(&mut batch, make_test_row(2, ApplicationStatus::Applied));
        push_row(&mut batch, make_test_row(1, ApplicationStatus::Interview));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].status, ApplicationStatus::Interview);
        assert_eq!(batch[1].row_number, 2);
    }

    #[test]
    fn test_application_identity() {
        let job = Classification::job(" SRE ", "Acme", ApplicationStatus::Offer);
        assert_eq!(
            application_identity(&job),
            Some(("SRE".to_string(), "Acme".to_string()))
        );

        assert_eq!(application_identity(&Classification::not_job_related()), None);

        let blank = Classification::job("SRE", "  ", ApplicationStatus::Applied);
        assert_eq!(application_identity(&blank), None);
    }

    #[test]
    fn test_cancellation_flag_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
        flag.reset();
        assert!(!clone.is_cancelled());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::MirroringBatch.to_string(), "mirroring batch");
        assert_eq!(RunPhase::default(), RunPhase::Idle);
    }
}
