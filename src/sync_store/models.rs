//! Models for the operation-indexed sync store.
//!
//! Records mirror what the fetch collaborator delivers: the natural key plus
//! the catalog fields persisted for each entity kind. Every stored row except
//! collection membership is stamped with the operation that first wrote it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// =============================================================================
// Enumerations
// =============================================================================

/// The entity kinds the sync engine knows how to upsert.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Artist,
    Album,
    AlbumArtist,
    Track,
    AudioFeatures,
    Genre,
    RelatedArtist,
    Collection,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Artist,
        EntityKind::Album,
        EntityKind::AlbumArtist,
        EntityKind::Track,
        EntityKind::AudioFeatures,
        EntityKind::Genre,
        EntityKind::RelatedArtist,
        EntityKind::Collection,
    ];

    /// The operation type a sync run of this kind is tagged with.
    ///
    /// Album-artist edges carry no dedicated operation type and are tagged
    /// as part of the album sync.
    pub fn operation_kind(&self) -> OperationKind {
        match self {
            EntityKind::Artist => OperationKind::ArtistSync,
            EntityKind::Album | EntityKind::AlbumArtist => OperationKind::AlbumSync,
            EntityKind::Track => OperationKind::TrackSync,
            EntityKind::AudioFeatures => OperationKind::FeatureSync,
            EntityKind::Genre => OperationKind::GenreSync,
            EntityKind::RelatedArtist => OperationKind::RelationSync,
            EntityKind::Collection => OperationKind::CollectionSync,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
            EntityKind::AlbumArtist => "album_artist",
            EntityKind::Track => "track",
            EntityKind::AudioFeatures => "audio_features",
            EntityKind::Genre => "genre",
            EntityKind::RelatedArtist => "related_artist",
            EntityKind::Collection => "collection",
        }
    }
}

/// Operation type recorded in the ledger for each ingestion run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    ArtistSync,
    AlbumSync,
    TrackSync,
    FeatureSync,
    GenreSync,
    RelationSync,
    CollectionSync,
}

impl OperationKind {
    /// Convert from database string representation
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "artist_sync" => OperationKind::ArtistSync,
            "album_sync" => OperationKind::AlbumSync,
            "track_sync" => OperationKind::TrackSync,
            "feature_sync" => OperationKind::FeatureSync,
            "genre_sync" => OperationKind::GenreSync,
            "relation_sync" => OperationKind::RelationSync,
            "collection_sync" => OperationKind::CollectionSync,
            _ => OperationKind::ArtistSync, // Default fallback
        }
    }

    /// Convert to database string representation
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OperationKind::ArtistSync => "artist_sync",
            OperationKind::AlbumSync => "album_sync",
            OperationKind::TrackSync => "track_sync",
            OperationKind::FeatureSync => "feature_sync",
            OperationKind::GenreSync => "genre_sync",
            OperationKind::RelationSync => "relation_sync",
            OperationKind::CollectionSync => "collection_sync",
        }
    }
}

/// Terminal state of an operation.
///
/// `Pending` is what a crashed run leaves behind; re-running is safe because
/// upserts are insert-if-absent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum OperationStatus {
    Pending,
    Committed,
    Failed,
}

impl OperationStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "pending" => OperationStatus::Pending,
            "committed" => OperationStatus::Committed,
            "failed" => OperationStatus::Failed,
            _ => OperationStatus::Pending, // Default fallback
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Committed => "committed",
            OperationStatus::Failed => "failed",
        }
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// One row of the operation ledger: a dated, kind-tagged record of an
/// ingestion run. The causality anchor for every row it produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub id: i64,
    pub date: NaiveDate,
    pub op_type: OperationKind,
    pub status: OperationStatus,
}

// =============================================================================
// Entity records
// =============================================================================

/// Artist as delivered by the fetch collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub id: String,
    pub name: String,
    pub popularity: i32,
}

/// Album as delivered by the fetch collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub id: String,
    pub name: String,
    pub release_date: Option<String>,
}

/// Many-to-many album/artist join candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlbumArtistRecord {
    pub artist_id: String,
    pub album_id: String,
}

/// Track as delivered by the fetch collaborator.
///
/// `album_id` may reference an album not yet stored; that is legal mid-sync
/// and adjudicated by the consistency checker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub name: String,
    pub popularity: i32,
    pub album_id: String,
    pub duration_ms: i64,
}

/// Acoustic descriptors, one-to-one with a track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioFeaturesRecord {
    pub track_id: String,
    pub danceability: f64,
    pub energy: f64,
    pub loudness: f64,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
}

/// Genre tag for an artist (many-to-many).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenreRecord {
    pub artist_id: String,
    pub genre: String,
}

/// Directed related-artist graph edge. Self-loops and reverse duplicates
/// are tolerated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelatedArtistRecord {
    pub artist_id: String,
    pub related_artist_id: String,
}

/// Membership of a track in a user-defined collection (e.g. a playlist).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionMemberRecord {
    pub collection_id: String,
    pub track_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_kind_db_str_round_trip() {
        for kind in [
            OperationKind::ArtistSync,
            OperationKind::AlbumSync,
            OperationKind::TrackSync,
            OperationKind::FeatureSync,
            OperationKind::GenreSync,
            OperationKind::RelationSync,
            OperationKind::CollectionSync,
        ] {
            assert_eq!(OperationKind::from_db_str(kind.to_db_str()), kind);
        }
    }

    #[test]
    fn test_operation_status_db_str_round_trip() {
        for status in [
            OperationStatus::Pending,
            OperationStatus::Committed,
            OperationStatus::Failed,
        ] {
            assert_eq!(OperationStatus::from_db_str(status.to_db_str()), status);
        }
    }

    #[test]
    fn test_album_artist_edges_are_tagged_as_album_sync() {
        assert_eq!(
            EntityKind::AlbumArtist.operation_kind(),
            OperationKind::AlbumSync
        );
        assert_eq!(EntityKind::Album.operation_kind(), OperationKind::AlbumSync);
    }

    #[test]
    fn test_every_kind_has_an_operation_kind() {
        for kind in EntityKind::ALL {
            // Must not panic and must round-trip through the db string
            let op = kind.operation_kind();
            assert_eq!(OperationKind::from_db_str(op.to_db_str()), op);
        }
    }
}
