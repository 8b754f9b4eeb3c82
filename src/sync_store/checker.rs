//! Post-sync consistency checker.
//!
//! Read-only scan for dangling references: every foreign-key-like value in
//! the store must resolve to a row in the referenced table once a sync run
//! has completed. Returns findings as data; it never mutates and a dangling
//! reference is not an error here.

use super::store::SqliteSyncStore;
use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// What kind of dangling reference was found.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    AlbumArtistMissingArtist,
    AlbumArtistMissingAlbum,
    TrackMissingAlbum,
    AudioFeaturesMissingTrack,
    GenreMissingArtist,
    RelatedMissingArtist,
    RelatedMissingRelatedArtist,
}

/// One dangling reference: the referencing row and the id it failed to
/// resolve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Identifying value of the row holding the dangling reference.
    pub referencing_id: String,
    /// The id that does not resolve to any stored row.
    pub missing_id: String,
}

struct RefScan {
    kind: ViolationKind,
    sql: &'static str,
}

// Each scan selects (referencing_id, missing_id) for rows whose reference
// does not resolve. Collection membership is deliberately not scanned:
// membership is observed directly, not derived from a sync run.
const REF_SCANS: &[RefScan] = &[
    RefScan {
        kind: ViolationKind::AlbumArtistMissingArtist,
        sql: "SELECT aa.album_id, aa.artist_id FROM album_artists aa
              LEFT JOIN artists a ON a.id = aa.artist_id WHERE a.id IS NULL",
    },
    RefScan {
        kind: ViolationKind::AlbumArtistMissingAlbum,
        sql: "SELECT aa.artist_id, aa.album_id FROM album_artists aa
              LEFT JOIN albums al ON al.id = aa.album_id WHERE al.id IS NULL",
    },
    RefScan {
        kind: ViolationKind::TrackMissingAlbum,
        sql: "SELECT t.id, t.album_id FROM tracks t
              LEFT JOIN albums al ON al.id = t.album_id WHERE al.id IS NULL",
    },
    RefScan {
        kind: ViolationKind::AudioFeaturesMissingTrack,
        sql: "SELECT af.track_id, af.track_id FROM audio_features af
              LEFT JOIN tracks t ON t.id = af.track_id WHERE t.id IS NULL",
    },
    RefScan {
        kind: ViolationKind::GenreMissingArtist,
        sql: "SELECT ag.genre, ag.artist_id FROM artist_genres ag
              LEFT JOIN artists a ON a.id = ag.artist_id WHERE a.id IS NULL",
    },
    RefScan {
        kind: ViolationKind::RelatedMissingArtist,
        sql: "SELECT ra.related_artist_id, ra.artist_id FROM related_artists ra
              LEFT JOIN artists a ON a.id = ra.artist_id WHERE a.id IS NULL",
    },
    RefScan {
        kind: ViolationKind::RelatedMissingRelatedArtist,
        sql: "SELECT ra.artist_id, ra.related_artist_id FROM related_artists ra
              LEFT JOIN artists a ON a.id = ra.related_artist_id WHERE a.id IS NULL",
    },
];

fn run_scan(conn: &Connection, scan: &RefScan) -> Result<Vec<Violation>> {
    let mut stmt = conn.prepare(scan.sql)?;
    let violations = stmt
        .query_map([], |row| {
            Ok(Violation {
                kind: scan.kind,
                referencing_id: row.get(0)?,
                missing_id: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(violations)
}

/// Scan the whole store for dangling references.
///
/// The returned list is empty when every reference resolves. The caller
/// decides what to do about findings (typically: re-fetch the prerequisite
/// kind); this function only reports.
pub fn check_consistency(store: &SqliteSyncStore) -> Result<Vec<Violation>> {
    let read_conn = store.read_conn();
    let conn = read_conn.lock().unwrap();

    let mut violations = Vec::new();
    for scan in REF_SCANS {
        violations.extend(run_scan(&conn, scan)?);
    }
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_store::models::*;
    use tempfile::TempDir;

    fn make_store() -> (TempDir, SqliteSyncStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteSyncStore::new(dir.path().join("sync.db"), 2).unwrap();
        (dir, store)
    }

    fn seed_artist(store: &SqliteSyncStore, id: &str) -> i64 {
        let op = store.open_operation(OperationKind::ArtistSync).unwrap();
        store
            .upsert_artist(
                &ArtistRecord {
                    id: id.to_string(),
                    name: format!("Artist {}", id),
                    popularity: 10,
                },
                op,
            )
            .unwrap();
        op
    }

    #[test]
    fn test_empty_store_has_no_violations() {
        let (_dir, store) = make_store();
        assert!(check_consistency(&store).unwrap().is_empty());
    }

    #[test]
    fn test_dangling_track_album_reported_exactly_once() {
        let (_dir, store) = make_store();
        let op = store.open_operation(OperationKind::TrackSync).unwrap();
        store
            .upsert_track(
                &TrackRecord {
                    id: "t1".to_string(),
                    name: "Sinnerman".to_string(),
                    popularity: 60,
                    album_id: "X".to_string(),
                    duration_ms: 618_000,
                },
                op,
            )
            .unwrap();

        let violations = check_consistency(&store).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::TrackMissingAlbum);
        assert_eq!(violations[0].referencing_id, "t1");
        assert_eq!(violations[0].missing_id, "X");
    }

    #[test]
    fn test_violation_resolves_once_album_arrives() {
        let (_dir, store) = make_store();
        let track_op = store.open_operation(OperationKind::TrackSync).unwrap();
        store
            .upsert_track(
                &TrackRecord {
                    id: "t1".to_string(),
                    name: "Sinnerman".to_string(),
                    popularity: 60,
                    album_id: "al1".to_string(),
                    duration_ms: 618_000,
                },
                track_op,
            )
            .unwrap();
        assert_eq!(check_consistency(&store).unwrap().len(), 1);

        let album_op = store.open_operation(OperationKind::AlbumSync).unwrap();
        store
            .upsert_album(
                &AlbumRecord {
                    id: "al1".to_string(),
                    name: "Pastel Blues".to_string(),
                    release_date: Some("1965-10-01".to_string()),
                },
                album_op,
            )
            .unwrap();
        assert!(check_consistency(&store).unwrap().is_empty());
    }

    #[test]
    fn test_related_edge_reports_each_missing_endpoint() {
        let (_dir, store) = make_store();
        seed_artist(&store, "a1");
        let op = store.open_operation(OperationKind::RelationSync).unwrap();
        store
            .upsert_related_artist(
                &RelatedArtistRecord {
                    artist_id: "a1".to_string(),
                    related_artist_id: "ghost".to_string(),
                },
                op,
            )
            .unwrap();
        store
            .upsert_related_artist(
                &RelatedArtistRecord {
                    artist_id: "phantom".to_string(),
                    related_artist_id: "a1".to_string(),
                },
                op,
            )
            .unwrap();

        let violations = check_consistency(&store).unwrap();
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| {
            v.kind == ViolationKind::RelatedMissingRelatedArtist && v.missing_id == "ghost"
        }));
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::RelatedMissingArtist && v.missing_id == "phantom"));
    }

    #[test]
    fn test_features_and_genre_and_edge_scans() {
        let (_dir, store) = make_store();
        let op = store.open_operation(OperationKind::FeatureSync).unwrap();
        store
            .upsert_audio_features(
                &AudioFeaturesRecord {
                    track_id: "ghost-track".to_string(),
                    danceability: 0.5,
                    energy: 0.5,
                    loudness: -7.0,
                    speechiness: 0.05,
                    acousticness: 0.2,
                    instrumentalness: 0.0,
                    liveness: 0.1,
                    valence: 0.4,
                    tempo: 120.0,
                },
                op,
            )
            .unwrap();
        store
            .upsert_genre(
                &GenreRecord {
                    artist_id: "ghost-artist".to_string(),
                    genre: "jazz".to_string(),
                },
                op,
            )
            .unwrap();
        store
            .upsert_album_artist(
                &AlbumArtistRecord {
                    artist_id: "ghost-artist".to_string(),
                    album_id: "ghost-album".to_string(),
                },
                op,
            )
            .unwrap();

        let violations = check_consistency(&store).unwrap();
        let kinds: Vec<ViolationKind> = violations.iter().map(|v| v.kind).collect();
        assert!(kinds.contains(&ViolationKind::AudioFeaturesMissingTrack));
        assert!(kinds.contains(&ViolationKind::GenreMissingArtist));
        assert!(kinds.contains(&ViolationKind::AlbumArtistMissingArtist));
        assert!(kinds.contains(&ViolationKind::AlbumArtistMissingAlbum));
    }

    #[test]
    fn test_collection_membership_is_not_scanned() {
        let (_dir, store) = make_store();
        store
            .upsert_collection_member(
                &CollectionMemberRecord {
                    collection_id: "playlist1".to_string(),
                    track_id: "nonexistent-track".to_string(),
                },
                None,
            )
            .unwrap();
        assert!(check_consistency(&store).unwrap().is_empty());
    }

    #[test]
    fn test_violation_serializes_for_reporting() {
        let violation = Violation {
            kind: ViolationKind::TrackMissingAlbum,
            referencing_id: "t1".to_string(),
            missing_id: "X".to_string(),
        };
        let json = serde_json::to_string(&violation).unwrap();
        assert!(json.contains("TrackMissingAlbum"));
        assert!(json.contains("\"missing_id\":\"X\""));
    }
}
