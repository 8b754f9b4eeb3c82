//! Sync orchestrator: drives upserts over a fetched batch in dependency
//! order, one operation per kind.

use super::batch::{Fetch, FetchState, KindOutcome, SkipReason, SyncBatch, SyncReport};
use super::deps::{prerequisites, stages};
use crate::error::SyncError;
use crate::sync_store::{validation, EntityKind, OperationStatus, SqliteSyncStore, ValidationError};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{info, warn};

pub struct SyncOrchestrator {
    store: SqliteSyncStore,
}

impl SyncOrchestrator {
    pub fn new(store: SqliteSyncStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SqliteSyncStore {
        &self.store
    }

    /// Reconcile one fetched batch against the store.
    ///
    /// Kinds whose upstream fetch failed are skipped together with their
    /// dependents and reported as a partial sync; a malformed candidate is
    /// skipped alone. Only a storage failure aborts the call, and stages
    /// already committed by then stay committed.
    pub fn sync(&self, batch: &SyncBatch) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        mark_skips(batch, &mut report.skipped);

        for stage in stages() {
            let runnable: Vec<EntityKind> = stage
                .into_iter()
                .filter(|kind| {
                    batch.fetch_state(*kind) == FetchState::Present
                        && !report.skipped.contains_key(kind)
                })
                .collect();
            if runnable.is_empty() {
                continue;
            }

            // Kinds within a stage share no write rows; the stage boundary
            // is the ordering barrier for dependents.
            let outcomes: Vec<Result<(EntityKind, KindOutcome), SyncError>> = runnable
                .par_iter()
                .map(|&kind| self.run_kind(kind, batch).map(|outcome| (kind, outcome)))
                .collect();

            for outcome in outcomes {
                let (kind, outcome) = outcome?;
                info!(
                    "Synced {}: op={} inserted={} known={} skipped={}",
                    kind.as_str(),
                    outcome.operation_id,
                    outcome.inserted,
                    outcome.already_known,
                    outcome.skipped_records
                );
                report.outcomes.insert(kind, outcome);
            }
        }

        if report.is_partial() {
            warn!(
                "Partial sync: {} kind(s) skipped",
                report.skipped.len()
            );
        }
        Ok(report)
    }

    fn run_kind(&self, kind: EntityKind, batch: &SyncBatch) -> Result<KindOutcome, SyncError> {
        match kind {
            EntityKind::Artist => self.run_records(
                kind,
                records(&batch.artists),
                validation::validate_artist,
                |store, record, op| store.upsert_artist(record, op),
            ),
            EntityKind::Album => self.run_records(
                kind,
                records(&batch.albums),
                validation::validate_album,
                |store, record, op| store.upsert_album(record, op),
            ),
            EntityKind::AlbumArtist => self.run_records(
                kind,
                records(&batch.album_artists),
                validation::validate_album_artist,
                |store, record, op| store.upsert_album_artist(record, op),
            ),
            EntityKind::Track => self.run_records(
                kind,
                records(&batch.tracks),
                validation::validate_track,
                |store, record, op| store.upsert_track(record, op),
            ),
            EntityKind::AudioFeatures => self.run_records(
                kind,
                records(&batch.audio_features),
                validation::validate_audio_features,
                |store, record, op| store.upsert_audio_features(record, op),
            ),
            EntityKind::Genre => self.run_records(
                kind,
                records(&batch.genres),
                validation::validate_genre,
                |store, record, op| store.upsert_genre(record, op),
            ),
            EntityKind::RelatedArtist => self.run_records(
                kind,
                records(&batch.related_artists),
                validation::validate_related_artist,
                |store, record, op| store.upsert_related_artist(record, op),
            ),
            EntityKind::Collection => self.run_records(
                kind,
                records(&batch.collection_members),
                validation::validate_collection_member,
                |store, record, op| store.upsert_collection_member(record, Some(op)),
            ),
        }
    }

    /// Open one operation for the kind, upsert every candidate with it, and
    /// record the operation's terminal state.
    fn run_records<T>(
        &self,
        kind: EntityKind,
        candidates: &[T],
        validate: impl Fn(&T) -> Result<(), ValidationError>,
        upsert: impl Fn(&SqliteSyncStore, &T, i64) -> anyhow::Result<bool>,
    ) -> Result<KindOutcome, SyncError> {
        let operation_id = self.store.open_operation(kind.operation_kind())?;
        let mut outcome = KindOutcome {
            operation_id,
            ..Default::default()
        };

        for candidate in candidates {
            if let Err(validation_err) = validate(candidate) {
                warn!(
                    "Skipping malformed {} record: {}",
                    kind.as_str(),
                    validation_err
                );
                outcome.skipped_records += 1;
                continue;
            }
            match upsert(&self.store, candidate, operation_id) {
                Ok(true) => outcome.inserted += 1,
                Ok(false) => outcome.already_known += 1,
                Err(storage_err) => {
                    // Best effort; the store may already be gone
                    let _ = self
                        .store
                        .mark_operation(operation_id, OperationStatus::Failed);
                    return Err(SyncError::StorageUnavailable(storage_err));
                }
            }
        }

        self.store
            .mark_operation(operation_id, OperationStatus::Committed)?;
        Ok(outcome)
    }
}

fn records<T>(fetch: &Fetch<T>) -> &[T] {
    match fetch {
        Fetch::Records(records) => records,
        Fetch::Absent | Fetch::Failed(_) => &[],
    }
}

/// Record upstream fetch failures and propagate them to dependents that
/// actually have candidates in this batch. An absent prerequisite skips
/// nothing: its entities may already be stored from earlier runs.
fn mark_skips(batch: &SyncBatch, skipped: &mut HashMap<EntityKind, SkipReason>) {
    for kind in EntityKind::ALL {
        if let FetchState::Failed(reason) = batch.fetch_state(kind) {
            warn!("Upstream fetch failed for {}: {}", kind.as_str(), reason);
            skipped.insert(kind, SkipReason::UpstreamFetchFailed { reason });
        }
    }
    // Stages are topologically ordered, so one pass propagates transitively
    for stage in stages() {
        for kind in stage {
            if skipped.contains_key(&kind) || batch.fetch_state(kind) != FetchState::Present {
                continue;
            }
            if let Some(&prerequisite) = prerequisites(kind)
                .iter()
                .find(|dep| skipped.contains_key(*dep))
            {
                warn!(
                    "Skipping {}: prerequisite {} was skipped",
                    kind.as_str(),
                    prerequisite.as_str()
                );
                skipped.insert(kind, SkipReason::PrerequisiteSkipped { prerequisite });
            }
        }
    }
}
