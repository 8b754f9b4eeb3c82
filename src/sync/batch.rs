//! Inbound batch types and the per-run sync report.

use crate::sync_store::{
    AlbumArtistRecord, AlbumRecord, ArtistRecord, AudioFeaturesRecord, CollectionMemberRecord,
    EntityKind, GenreRecord, RelatedArtistRecord, TrackRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-kind result of the upstream fetch collaborator.
///
/// `Failed` carries the collaborator's reason and causes the kind (and its
/// dependents) to be skipped for the run; `Absent` means the kind was simply
/// not part of this batch, which skips nothing downstream.
#[derive(Clone, Debug, Default)]
pub enum Fetch<T> {
    #[default]
    Absent,
    Records(Vec<T>),
    Failed(String),
}

impl<T> Fetch<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Fetch::Failed(_))
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Fetch::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// A freshly fetched batch of catalog entities, grouped by kind.
///
/// All contents are fully materialized inputs by the time `sync` is called;
/// the engine never waits on the network.
#[derive(Clone, Debug, Default)]
pub struct SyncBatch {
    pub artists: Fetch<ArtistRecord>,
    pub albums: Fetch<AlbumRecord>,
    pub album_artists: Fetch<AlbumArtistRecord>,
    pub tracks: Fetch<TrackRecord>,
    pub audio_features: Fetch<AudioFeaturesRecord>,
    pub genres: Fetch<GenreRecord>,
    pub related_artists: Fetch<RelatedArtistRecord>,
    pub collection_members: Fetch<CollectionMemberRecord>,
}

impl SyncBatch {
    pub(crate) fn fetch_state(&self, kind: EntityKind) -> FetchState {
        match kind {
            EntityKind::Artist => state_of(&self.artists),
            EntityKind::Album => state_of(&self.albums),
            EntityKind::AlbumArtist => state_of(&self.album_artists),
            EntityKind::Track => state_of(&self.tracks),
            EntityKind::AudioFeatures => state_of(&self.audio_features),
            EntityKind::Genre => state_of(&self.genres),
            EntityKind::RelatedArtist => state_of(&self.related_artists),
            EntityKind::Collection => state_of(&self.collection_members),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FetchState {
    Absent,
    Present,
    Failed(String),
}

fn state_of<T>(fetch: &Fetch<T>) -> FetchState {
    match fetch {
        Fetch::Absent => FetchState::Absent,
        Fetch::Records(_) => FetchState::Present,
        Fetch::Failed(reason) => FetchState::Failed(reason.clone()),
    }
}

/// Why a kind was not processed in a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The collaborator failed to fetch this kind.
    UpstreamFetchFailed { reason: String },
    /// A prerequisite kind was skipped, so this kind cannot safely run.
    PrerequisiteSkipped { prerequisite: EntityKind },
}

/// Counters for one processed kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindOutcome {
    /// The operation stamped onto every row this stage inserted.
    pub operation_id: i64,
    /// Rows actually written.
    pub inserted: usize,
    /// Candidates whose natural key was already present.
    pub already_known: usize,
    /// Malformed candidates skipped and logged.
    pub skipped_records: usize,
}

/// Observable result of one `sync` call.
///
/// A run with skipped kinds is a partial sync, not a failure.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub outcomes: HashMap<EntityKind, KindOutcome>,
    pub skipped: HashMap<EntityKind, SkipReason>,
}

impl SyncReport {
    /// The set of operation ids created by this run.
    pub fn operation_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.outcomes.values().map(|o| o.operation_id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }

    pub fn total_inserted(&self) -> usize {
        self.outcomes.values().map(|o| o.inserted).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_batch_is_all_absent() {
        let batch = SyncBatch::default();
        for kind in EntityKind::ALL {
            assert_eq!(batch.fetch_state(kind), FetchState::Absent);
        }
    }

    #[test]
    fn test_fetch_state_reflects_contents() {
        let batch = SyncBatch {
            artists: Fetch::Records(vec![]),
            tracks: Fetch::Failed("HTTP 503".to_string()),
            ..Default::default()
        };
        assert_eq!(batch.fetch_state(EntityKind::Artist), FetchState::Present);
        assert_eq!(
            batch.fetch_state(EntityKind::Track),
            FetchState::Failed("HTTP 503".to_string())
        );
        assert_eq!(batch.fetch_state(EntityKind::Album), FetchState::Absent);
    }

    #[test]
    fn test_report_operation_ids_sorted() {
        let mut report = SyncReport::default();
        report.outcomes.insert(
            EntityKind::Track,
            KindOutcome {
                operation_id: 7,
                ..Default::default()
            },
        );
        report.outcomes.insert(
            EntityKind::Artist,
            KindOutcome {
                operation_id: 3,
                ..Default::default()
            },
        );
        assert_eq!(report.operation_ids(), vec![3, 7]);
        assert!(!report.is_partial());
    }
}
