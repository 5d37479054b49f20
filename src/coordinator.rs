//! Runs the sync engine over every requested company.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, instrument, warn};

use crate::download::{
    DownloadEngine, DownloadError, EntityOutcome, EntitySummary, RequestFailure, SyncError,
};
use crate::entity::{Entity, EntityId};
use crate::registry::RegistryClient;

/// A company after its name lookup.
#[derive(Debug)]
pub enum ResolvedEntity {
    /// Ready to sync, under its registered name or, when the registry has
    /// none, its company number.
    Ready(Entity),
    /// The profile could not be fetched. The company is reported as aborted
    /// instead of being synced under a stand-in folder.
    Unavailable {
        entity: Entity,
        failure: RequestFailure,
    },
}

impl ResolvedEntity {
    #[must_use]
    pub fn entity(&self) -> &Entity {
        match self {
            Self::Ready(entity) | Self::Unavailable { entity, .. } => entity,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl From<Entity> for ResolvedEntity {
    fn from(entity: Entity) -> Self {
        Self::Ready(entity)
    }
}

/// Aggregated result of one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// One entry per company that was started, in run order.
    pub entities: Vec<EntitySummary>,
    /// True when the run stopped early because of an interrupt.
    pub cancelled: bool,
}

impl RunSummary {
    #[must_use]
    pub fn total_fetched(&self) -> usize {
        self.entities.iter().map(|e| e.fetched).sum()
    }

    #[must_use]
    pub fn total_skipped(&self) -> usize {
        self.entities.iter().map(|e| e.skipped).sum()
    }

    #[must_use]
    pub fn total_failed(&self) -> usize {
        self.entities.iter().map(|e| e.failed).sum()
    }

    /// Companies that stopped before their listing was exhausted.
    #[must_use]
    pub fn aborted_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|e| matches!(e.outcome, EntityOutcome::Aborted { .. }))
            .count()
    }

    /// True when every company completed without a failed document.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.cancelled && self.entities.iter().all(EntitySummary::is_clean)
    }
}

/// Drives one [`DownloadEngine`] across a list of companies, one at a time.
#[derive(Debug)]
pub struct RunCoordinator {
    engine: DownloadEngine,
    cancel: Arc<AtomicBool>,
}

impl RunCoordinator {
    /// `cancel` is polled between companies and between filings.
    #[must_use]
    pub fn new(engine: DownloadEngine, cancel: Arc<AtomicBool>) -> Self {
        Self { engine, cancel }
    }

    #[must_use]
    pub fn engine(&self) -> &DownloadEngine {
        &self.engine
    }

    fn client(&self) -> &RegistryClient {
        self.engine.client()
    }

    /// Looks up display names for `ids`.
    ///
    /// A profile without a name, or a 404, falls back to the company number.
    /// Any other failure leaves the company [`ResolvedEntity::Unavailable`]
    /// so a transient outage never moves it into a second folder.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn resolve_entities(&self, ids: &[EntityId]) -> Vec<ResolvedEntity> {
        let mut entities = Vec::with_capacity(ids.len());
        for id in ids {
            if self.cancel.load(Ordering::SeqCst) {
                entities.push(ResolvedEntity::Ready(Entity::unnamed(id.clone())));
                continue;
            }
            let resolved = match self.client().company_name(id).await {
                Ok(Some(name)) => ResolvedEntity::Ready(Entity::new(id.clone(), name)),
                Ok(None) => {
                    warn!(company = %id, "company profile has no name, using company number");
                    ResolvedEntity::Ready(Entity::unnamed(id.clone()))
                }
                Err(failure) if is_not_found(&failure) => {
                    warn!(company = %id, "company profile not found, using company number");
                    ResolvedEntity::Ready(Entity::unnamed(id.clone()))
                }
                Err(failure) => {
                    warn!(
                        company = %id,
                        error = %failure,
                        "company name lookup failed, company will not be synced"
                    );
                    ResolvedEntity::Unavailable {
                        entity: Entity::unnamed(id.clone()),
                        failure,
                    }
                }
            };
            entities.push(resolved);
        }
        entities
    }

    /// Syncs every company in order.
    ///
    /// An aborted company never stops the next one; an interrupt stops new
    /// companies from starting.
    #[instrument(skip(self, entities), fields(count = entities.len()))]
    pub async fn run(&self, entities: Vec<ResolvedEntity>) -> RunSummary {
        let mut summary = RunSummary::default();

        for resolved in entities {
            if self.cancel.load(Ordering::SeqCst) {
                info!(company = %resolved.entity().id, "interrupted, not starting company");
                summary.cancelled = true;
                break;
            }

            let entity_summary = match resolved {
                ResolvedEntity::Ready(entity) => {
                    self.engine.sync_entity(&entity, &self.cancel).await
                }
                ResolvedEntity::Unavailable { entity, failure } => {
                    warn!(company = %entity.id, "skipping company without a known name");
                    EntitySummary {
                        folder: self.engine.entity_folder(&entity),
                        entity,
                        fetched: 0,
                        skipped: 0,
                        failed: 0,
                        outcome: EntityOutcome::Aborted {
                            reason: SyncError::Profile(failure),
                        },
                    }
                }
            };
            if matches!(entity_summary.outcome, EntityOutcome::Cancelled) {
                summary.cancelled = true;
            }
            summary.entities.push(entity_summary);
        }

        info!(
            fetched = summary.total_fetched(),
            skipped = summary.total_skipped(),
            failed = summary.total_failed(),
            aborted = summary.aborted_count(),
            cancelled = summary.cancelled,
            requests = self.client().governor().total_requests(),
            "run finished"
        );
        summary
    }
}

fn is_not_found(failure: &RequestFailure) -> bool {
    matches!(failure.error, DownloadError::HttpStatus { status: 404, .. })
}
