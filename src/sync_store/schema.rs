//! SQLite schema definitions for the sync database.
//!
//! Natural keys are the provider-assigned text identifiers. Every table but
//! `collection_tracks` carries a non-null `op_index` pointing at the
//! operation that first wrote the row. Entity-to-entity references are not
//! declared as SQL foreign keys: they may dangle transiently mid-sync and
//! the consistency checker is the authority on final correctness. Only
//! `op_index` gets a declared foreign key, since an operation always exists
//! before any row stamped with it.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema};

const OPERATION_FK: ForeignKey = ForeignKey {
    foreign_table: "operations",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Restrict,
};

/// Operation ledger - one row per ingestion run per kind.
///
/// `id` is the SQLite rowid: strictly increasing, never reused, allocated
/// atomically under the single write connection.
const OPERATIONS_TABLE: Table = Table {
    name: "operations",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("date", &SqlType::Text, non_null = true), // 'YYYY-MM-DD'
        sqlite_column!("op_type", &SqlType::Text, non_null = true),
        sqlite_column!(
            "status",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'pending'")
        ), // 'pending', 'committed', 'failed'
    ],
    indices: &[("idx_operations_type", "op_type")],
    unique_constraints: &[],
};

/// Artists table - first known state, never overwritten
const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("popularity", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "op_index",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&OPERATION_FK)
        ),
    ],
    indices: &[("idx_artists_op", "op_index")],
    unique_constraints: &[],
};

/// Albums table
const ALBUMS_TABLE: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("release_date", &SqlType::Text), // '2023-05-15', '2023-05', '2023'
        sqlite_column!(
            "op_index",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&OPERATION_FK)
        ),
    ],
    indices: &[("idx_albums_op", "op_index")],
    unique_constraints: &[],
};

/// Artist <-> Album relationship, deduplicated on the full edge tuple
const ALBUM_ARTISTS_TABLE: Table = Table {
    name: "album_artists",
    columns: &[
        sqlite_column!("artist_id", &SqlType::Text, non_null = true),
        sqlite_column!("album_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "op_index",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&OPERATION_FK)
        ),
    ],
    indices: &[
        ("idx_album_artists_artist", "artist_id"),
        ("idx_album_artists_album", "album_id"),
    ],
    unique_constraints: &[&["artist_id", "album_id"]],
};

/// Tracks table - catalog tracks, distinct from collection membership
const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("popularity", &SqlType::Integer, non_null = true),
        sqlite_column!("album_id", &SqlType::Text, non_null = true),
        sqlite_column!("duration_ms", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "op_index",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&OPERATION_FK)
        ),
    ],
    indices: &[("idx_tracks_album", "album_id")],
    unique_constraints: &[],
};

/// Audio features - one-to-one with tracks
const AUDIO_FEATURES_TABLE: Table = Table {
    name: "audio_features",
    columns: &[
        sqlite_column!("track_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("danceability", &SqlType::Real, non_null = true),
        sqlite_column!("energy", &SqlType::Real, non_null = true),
        sqlite_column!("loudness", &SqlType::Real, non_null = true),
        sqlite_column!("speechiness", &SqlType::Real, non_null = true),
        sqlite_column!("acousticness", &SqlType::Real, non_null = true),
        sqlite_column!("instrumentalness", &SqlType::Real, non_null = true),
        sqlite_column!("liveness", &SqlType::Real, non_null = true),
        sqlite_column!("valence", &SqlType::Real, non_null = true),
        sqlite_column!("tempo", &SqlType::Real, non_null = true),
        sqlite_column!(
            "op_index",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&OPERATION_FK)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

/// Artist <-> Genre relationship
const ARTIST_GENRES_TABLE: Table = Table {
    name: "artist_genres",
    columns: &[
        sqlite_column!("artist_id", &SqlType::Text, non_null = true),
        sqlite_column!("genre", &SqlType::Text, non_null = true),
        sqlite_column!(
            "op_index",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&OPERATION_FK)
        ),
    ],
    indices: &[("idx_artist_genres_artist", "artist_id")],
    unique_constraints: &[&["artist_id", "genre"]],
};

/// Directed related-artist graph edges
const RELATED_ARTISTS_TABLE: Table = Table {
    name: "related_artists",
    columns: &[
        sqlite_column!("artist_id", &SqlType::Text, non_null = true),
        sqlite_column!("related_artist_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "op_index",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&OPERATION_FK)
        ),
    ],
    indices: &[
        ("idx_related_artists_artist", "artist_id"),
        ("idx_related_artists_related", "related_artist_id"),
    ],
    unique_constraints: &[&["artist_id", "related_artist_id"]],
};

/// Collection membership - the only table with a nullable op_index, since
/// membership is observed directly rather than derived from a sync run.
const COLLECTION_TRACKS_TABLE: Table = Table {
    name: "collection_tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("track_id", &SqlType::Text, non_null = true),
        sqlite_column!("op_index", &SqlType::Integer, foreign_key = Some(&OPERATION_FK)),
    ],
    indices: &[("idx_collection_tracks_id", "id")],
    unique_constraints: &[&["id", "track_id"]],
};

/// Sync database schema.
pub const SYNC_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        OPERATIONS_TABLE,
        ARTISTS_TABLE,
        ALBUMS_TABLE,
        ALBUM_ARTISTS_TABLE,
        TRACKS_TABLE,
        AUDIO_FEATURES_TABLE,
        ARTIST_GENRES_TABLE,
        RELATED_ARTISTS_TABLE,
        COLLECTION_TRACKS_TABLE,
    ],
    migration: None,
}];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::{params, Connection};

    #[test]
    fn test_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = &SYNC_VERSIONED_SCHEMAS[0];
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn test_op_index_requires_existing_operation() {
        let conn = Connection::open_in_memory().unwrap();
        SYNC_VERSIONED_SCHEMAS[0].create(&conn).unwrap();

        // No operation row yet: the op_index FK must reject the insert
        let result = conn.execute(
            "INSERT INTO artists (id, name, popularity, op_index) VALUES ('a1', 'Nina Simone', 71, 1)",
            [],
        );
        assert!(result.is_err());

        conn.execute(
            "INSERT INTO operations (date, op_type) VALUES ('2024-03-01', 'artist_sync')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO artists (id, name, popularity, op_index) VALUES ('a1', 'Nina Simone', 71, 1)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_dangling_track_album_reference_is_accepted() {
        let conn = Connection::open_in_memory().unwrap();
        SYNC_VERSIONED_SCHEMAS[0].create(&conn).unwrap();

        conn.execute(
            "INSERT INTO operations (date, op_type) VALUES ('2024-03-01', 'track_sync')",
            [],
        )
        .unwrap();

        // album 'missing' does not exist; allowed transiently by design
        conn.execute(
            "INSERT INTO tracks (id, name, popularity, album_id, duration_ms, op_index)
             VALUES ('t1', 'Sinnerman', 60, 'missing', 618000, 1)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_edge_tables_deduplicate_on_full_tuple() {
        let conn = Connection::open_in_memory().unwrap();
        SYNC_VERSIONED_SCHEMAS[0].create(&conn).unwrap();

        conn.execute(
            "INSERT INTO operations (date, op_type) VALUES ('2024-03-01', 'relation_sync')",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO related_artists (artist_id, related_artist_id, op_index) VALUES ('a1', 'a2', 1)",
            [],
        )
        .unwrap();
        // Same tuple again is ignored, the reverse edge is a distinct row
        conn.execute(
            "INSERT OR IGNORE INTO related_artists (artist_id, related_artist_id, op_index) VALUES ('a1', 'a2', 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO related_artists (artist_id, related_artist_id, op_index) VALUES ('a2', 'a1', 1)",
            [],
        )
        .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM related_artists", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_collection_tracks_op_index_is_nullable() {
        let conn = Connection::open_in_memory().unwrap();
        SYNC_VERSIONED_SCHEMAS[0].create(&conn).unwrap();

        conn.execute(
            "INSERT INTO collection_tracks (id, track_id, op_index) VALUES ('playlist1', 't1', NULL)",
            params![],
        )
        .unwrap();
    }
}
