//! Per-company sync engine: list filings, skip what is on disk, download the
//! rest.
//!
//! This module provides the `DownloadEngine` which drives one company at a
//! time through the filing-history paginator, resolves a filename for every
//! filing in listing order, and downloads the missing ones on Tokio tasks
//! bounded by a semaphore.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use dumpany_core::download::{DownloadEngine, HttpClient, RateGovernor, RetryPolicy};
//! use dumpany_core::registry::{Endpoints, RegistryClient};
//! use dumpany_core::{Entity, EntityId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(RegistryClient::new(
//!     HttpClient::new("my-api-key")?,
//!     Arc::new(RateGovernor::default()),
//!     RetryPolicy::default(),
//!     Endpoints::default(),
//! ));
//! let engine = DownloadEngine::new(client, "dump", 4)?;
//! let entity = Entity::new(EntityId::parse("00445790")?, "TESCO PLC");
//! let summary = engine.sync_entity(&entity, &Arc::new(AtomicBool::new(false))).await;
//! println!("fetched {}, skipped {}, failed {}", summary.fetched, summary.skipped, summary.failed);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument, warn};

use super::constants::DEFAULT_PAGE_SIZE;
use super::filename::{entity_folder_name, resolve_filename};
use super::local_state::existing_documents;
use super::retry::RequestFailure;
use super::DownloadError;
use crate::entity::Entity;
use crate::registry::{FilingPaginator, RegistryClient};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 16;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Error type for download engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Why a company's sync stopped early.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The filing history could not be listed.
    #[error("listing filings failed: {0}")]
    Metadata(#[source] RequestFailure),

    /// The company profile could not be fetched, so the folder name is unknown.
    #[error("company name lookup failed: {0}")]
    Profile(#[source] RequestFailure),

    /// A document could not be written; later writes would fail the same way.
    #[error("cannot write documents: {0}")]
    Filesystem(#[source] DownloadError),
}

/// How a company's sync ended.
#[derive(Debug)]
pub enum EntityOutcome {
    /// Every filing was listed and handled.
    Completed,
    /// Stopped before the listing was exhausted.
    Aborted {
        /// What stopped it.
        reason: SyncError,
    },
    /// Stopped because the run was interrupted.
    Cancelled,
}

impl EntityOutcome {
    /// Returns true for [`EntityOutcome::Completed`].
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Result of syncing one company.
#[derive(Debug)]
pub struct EntitySummary {
    pub entity: Entity,
    /// Folder the documents were written to.
    pub folder: PathBuf,
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcome: EntityOutcome,
}

impl EntitySummary {
    /// True when the company completed and nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.outcome.is_completed()
    }
}

/// Per-filing progress, sent as filings are handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Already on disk.
    Skipped { name: String },
    /// Downloaded.
    Fetched { name: String, bytes: u64 },
    /// Gave up on this filing.
    Failed { name: String, reason: String },
}

/// Counters shared with download tasks.
#[derive(Debug, Default)]
struct SyncStats {
    fetched: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl SyncStats {
    fn increment_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// First filesystem error raised by any download task.
#[derive(Debug, Default)]
struct FatalSlot(Mutex<Option<DownloadError>>);

impl FatalSlot {
    fn record(&self, error: DownloadError) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn is_set(&self) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn take(&self) -> Option<DownloadError> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Sync engine for one run.
///
/// # Concurrency Model
///
/// - Filenames are resolved sequentially in listing order, so collision
///   suffixes are stable across runs
/// - Each download runs in its own Tokio task
/// - A semaphore permit is acquired before starting each download
/// - Permits are released automatically when downloads complete (RAII)
/// - Every task draws from the one shared rate governor
#[derive(Debug)]
pub struct DownloadEngine {
    /// Semaphore for concurrency control.
    semaphore: Arc<Semaphore>,
    /// Configured concurrency limit.
    concurrency: usize,
    client: Arc<RegistryClient>,
    output_root: PathBuf,
    page_size: u32,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl DownloadEngine {
    /// Creates an engine writing under `output_root`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-16).
    #[instrument(level = "debug", skip(client, output_root))]
    pub fn new(
        client: Arc<RegistryClient>,
        output_root: impl Into<PathBuf>,
        concurrency: usize,
    ) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            client,
            output_root: output_root.into(),
            page_size: DEFAULT_PAGE_SIZE,
            progress: None,
        })
    }

    /// Sets the filing-history page size (clamped to 1-100 when paging).
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sends a [`ProgressEvent`] for every filing handled.
    #[must_use]
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the registry client.
    #[must_use]
    pub fn client(&self) -> &Arc<RegistryClient> {
        &self.client
    }

    /// Folder a company's documents are written to.
    #[must_use]
    pub fn entity_folder(&self, entity: &Entity) -> PathBuf {
        self.output_root
            .join(entity_folder_name(&entity.display_name, entity.id.as_str()))
    }

    /// Syncs one company and reports what happened.
    ///
    /// Never fails as a whole: listing errors, filesystem errors and
    /// cancellation show up in [`EntitySummary::outcome`]; per-filing errors
    /// are counted in [`EntitySummary::failed`].
    #[instrument(skip(self, entity, cancel), fields(company = %entity.id))]
    pub async fn sync_entity(&self, entity: &Entity, cancel: &Arc<AtomicBool>) -> EntitySummary {
        let folder = self.entity_folder(entity);
        let stats = Arc::new(SyncStats::default());
        let fatal = Arc::new(FatalSlot::default());

        info!(name = %entity.display_name, folder = %folder.display(), "syncing company");

        let existing = match existing_documents(&folder).await {
            Ok(existing) => existing,
            Err(error) => {
                warn!(error = %error, "cannot read company folder");
                return summarize(
                    entity,
                    folder,
                    &stats,
                    EntityOutcome::Aborted {
                        reason: SyncError::Filesystem(error),
                    },
                );
            }
        };

        let mut used_names: HashSet<String> = HashSet::new();
        let mut folder_ready = false;
        let mut stopped: Option<EntityOutcome> = None;
        let mut handles = Vec::new();
        let mut paginator = FilingPaginator::new(&self.client, entity.id.clone(), self.page_size);

        loop {
            if cancel.load(Ordering::SeqCst) {
                info!("interrupted, not scheduling further filings");
                stopped = Some(EntityOutcome::Cancelled);
                break;
            }
            if fatal.is_set() {
                break;
            }

            let record = match paginator.next_record().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(failure) => {
                    warn!(error = %failure, "filing history unavailable, abandoning company");
                    stopped = Some(EntityOutcome::Aborted {
                        reason: SyncError::Metadata(failure),
                    });
                    break;
                }
            };

            let name = resolve_filename(&record, &entity.display_name, &used_names);
            used_names.insert(name.clone());

            if existing.contains(&name) {
                debug!(name = %name, "already downloaded");
                stats.increment_skipped();
                emit(&self.progress, ProgressEvent::Skipped { name });
                continue;
            }

            let Some(metadata_link) = record.content_url else {
                warn!(
                    name = %name,
                    transaction_id = %record.transaction_id,
                    "filing has no document link"
                );
                stats.increment_failed();
                emit(
                    &self.progress,
                    ProgressEvent::Failed {
                        name,
                        reason: "no document available".to_string(),
                    },
                );
                continue;
            };

            if !folder_ready {
                if let Err(e) = tokio::fs::create_dir_all(&folder).await {
                    stopped = Some(EntityOutcome::Aborted {
                        reason: SyncError::Filesystem(DownloadError::io(&folder, e)),
                    });
                    break;
                }
                folder_ready = true;
            }

            // Acquire semaphore permit (blocks if at concurrency limit)
            let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
                break;
            };

            // The permit wait can outlast a quota pause in a running task
            if cancel.load(Ordering::SeqCst) {
                drop(permit);
                info!("interrupted while waiting for a download slot");
                stopped = Some(EntityOutcome::Cancelled);
                break;
            }
            if fatal.is_set() {
                drop(permit);
                break;
            }

            let client = Arc::clone(&self.client);
            let stats = Arc::clone(&stats);
            let fatal = Arc::clone(&fatal);
            let cancel = Arc::clone(cancel);
            let progress = self.progress.clone();
            let dest = folder.join(&name);
            let transaction_id = record.transaction_id;

            handles.push(tokio::spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = permit;

                if cancel.load(Ordering::SeqCst) {
                    debug!(name = %name, "interrupted before download started");
                    return false;
                }

                let result = match client.document_content_link(&metadata_link).await {
                    Ok(content_link) => client.download_document(&content_link, &dest).await,
                    Err(failure) => Err(failure),
                };

                match result {
                    Ok(bytes) => {
                        stats.increment_fetched();
                        emit(&progress, ProgressEvent::Fetched { name, bytes });
                    }
                    Err(failure) => {
                        warn!(
                            name = %name,
                            transaction_id = %transaction_id,
                            attempts = failure.attempts,
                            error = %failure.error,
                            "download failed"
                        );
                        stats.increment_failed();
                        emit(
                            &progress,
                            ProgressEvent::Failed {
                                name,
                                reason: failure.error.to_string(),
                            },
                        );
                        if failure.error.is_filesystem() {
                            fatal.record(failure.error);
                        }
                    }
                }
                true
            }));
        }

        debug!(task_count = handles.len(), "waiting for downloads to complete");
        let mut abandoned = false;
        for handle in handles {
            // Ignore JoinError - task panics are logged but don't fail the company
            match handle.await {
                Ok(started) => abandoned |= !started,
                Err(e) => warn!(error = %e, "download task panicked"),
            }
        }

        let outcome = match (fatal.take(), stopped) {
            (Some(error), _) => EntityOutcome::Aborted {
                reason: SyncError::Filesystem(error),
            },
            (None, Some(outcome)) => outcome,
            (None, None) if abandoned => EntityOutcome::Cancelled,
            (None, None) => EntityOutcome::Completed,
        };

        let summary = summarize(entity, folder, &stats, outcome);
        info!(
            fetched = summary.fetched,
            skipped = summary.skipped,
            failed = summary.failed,
            pages = paginator.pages_fetched(),
            completed = summary.outcome.is_completed(),
            "company sync finished"
        );
        summary
    }
}

fn summarize(
    entity: &Entity,
    folder: PathBuf,
    stats: &SyncStats,
    outcome: EntityOutcome,
) -> EntitySummary {
    EntitySummary {
        entity: entity.clone(),
        folder,
        fetched: stats.fetched.load(Ordering::SeqCst),
        skipped: stats.skipped.load(Ordering::SeqCst),
        failed: stats.failed.load(Ordering::SeqCst),
        outcome,
    }
}

fn emit(progress: &Option<UnboundedSender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(sender) = progress {
        // A closed receiver only means nobody is rendering progress.
        let _ = sender.send(event);
    }
}
