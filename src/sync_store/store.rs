//! SQLite-backed sync store.
//!
//! Owns the database connections, the operation ledger and the entity upsert
//! layer. All writes go through a single mutex-held write connection, which
//! also makes operation-id allocation atomic within the process; reads are
//! served from a small round-robin pool.

use super::models::*;
use super::schema::SYNC_VERSIONED_SCHEMAS;
use crate::config::SyncConfig;
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// SQLite-backed store for the operation-indexed catalog.
#[derive(Clone)]
pub struct SqliteSyncStore {
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Vec<Arc<Mutex<Connection>>>,
    read_index: Arc<AtomicUsize>,
}

/// Create the schema on a fresh database, or validate it on an existing one.
/// Idempotent; never drops or alters existing tables.
fn ensure_schema(conn: &mut Connection) -> Result<()> {
    let latest_schema = &SYNC_VERSIONED_SCHEMAS[SYNC_VERSIONED_SCHEMAS.len() - 1];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!(
            "Creating sync db schema at version {}",
            latest_schema.version
        );
        latest_schema.create(conn)?;
        return Ok(());
    }

    conn.execute("PRAGMA foreign_keys = ON;", params![])?;
    latest_schema
        .validate(conn)
        .context("Existing database does not match the sync schema")
}

impl SqliteSyncStore {
    /// Open (or create) the sync database.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `read_pool_size` - Number of connections for concurrent read operations
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open sync database")?;

        ensure_schema(&mut write_conn)?;

        write_conn.pragma_update(None, "journal_mode", "WAL")?;

        let artist_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM artists", [], |r| r.get(0))
            .unwrap_or(0);
        let track_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))
            .unwrap_or(0);
        let opcount: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM operations", [], |r| r.get(0))
            .unwrap_or(0);

        info!(
            "Opened sync catalog: {} artists, {} tracks, {} operations",
            artist_count, track_count, opcount
        );

        let mut read_pool = Vec::with_capacity(read_pool_size.max(1));
        for _ in 0..read_pool_size.max(1) {
            let read_conn = Connection::open_with_flags(
                db_path_ref,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_conn.pragma_update(None, "journal_mode", "WAL")?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(SqliteSyncStore {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Open the store from a resolved configuration.
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::new(&config.db_path, config.read_pool_size)
    }

    pub(crate) fn read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    // =========================================================================
    // Operation Ledger
    // =========================================================================

    /// Insert a new operation stamped with today's date and the given kind,
    /// returning its identifier. Identifiers are strictly increasing and
    /// never reused.
    pub fn open_operation(&self, kind: OperationKind) -> Result<i64> {
        self.open_operation_on(kind, Utc::now().date_naive())
    }

    /// Like [`open_operation`](Self::open_operation) with an explicit date.
    pub fn open_operation_on(&self, kind: OperationKind, date: NaiveDate) -> Result<i64> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO operations (date, op_type, status) VALUES (?1, ?2, ?3)",
            params![
                date.format("%Y-%m-%d").to_string(),
                kind.to_db_str(),
                OperationStatus::Pending.to_db_str()
            ],
        )
        .context("Failed to open operation")?;
        Ok(conn.last_insert_rowid())
    }

    /// Record the terminal state of an operation. Returns whether a ledger
    /// row was actually updated; marking an id the ledger never allocated
    /// is a caller bug, logged and reported rather than silently absorbed.
    pub fn mark_operation(&self, operation_id: i64, status: OperationStatus) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE operations SET status = ?1 WHERE id = ?2",
            params![status.to_db_str(), operation_id],
        )?;
        if updated == 0 {
            warn!(
                "No operation {} in the ledger to mark as {}",
                operation_id,
                status.to_db_str()
            );
        }
        Ok(updated > 0)
    }

    /// Get an operation by id.
    pub fn get_operation(&self, operation_id: i64) -> Result<Option<Operation>> {
        let read_conn = self.read_conn();
        let conn = read_conn.lock().unwrap();

        let mut stmt = conn
            .prepare_cached("SELECT id, date, op_type, status FROM operations WHERE id = ?1")?;
        match stmt.query_row(params![operation_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        }) {
            Ok((id, date, op_type, status)) => Ok(Some(Operation {
                id,
                date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .with_context(|| format!("Invalid operation date '{}'", date))?,
                op_type: OperationKind::from_db_str(&op_type),
                status: OperationStatus::from_db_str(&status),
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn operation_count(&self) -> Result<i64> {
        let read_conn = self.read_conn();
        let conn = read_conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM operations", [], |r| r.get(0))?)
    }

    // =========================================================================
    // Entity Upsert Layer
    // =========================================================================
    //
    // Every upsert is insert-if-absent on the natural key: existing rows are
    // never overwritten or merged, and re-sighting a known entity is the
    // expected common case, not an error. Returns whether a row was actually
    // inserted.

    pub fn upsert_artist(&self, artist: &ArtistRecord, op_index: i64) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO artists (id, name, popularity, op_index) VALUES (?1, ?2, ?3, ?4)",
            params![artist.id, artist.name, artist.popularity, op_index],
        )?;
        Ok(inserted > 0)
    }

    pub fn upsert_album(&self, album: &AlbumRecord, op_index: i64) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO albums (id, name, release_date, op_index) VALUES (?1, ?2, ?3, ?4)",
            params![album.id, album.name, album.release_date, op_index],
        )?;
        Ok(inserted > 0)
    }

    pub fn upsert_album_artist(&self, edge: &AlbumArtistRecord, op_index: i64) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO album_artists (artist_id, album_id, op_index) VALUES (?1, ?2, ?3)",
            params![edge.artist_id, edge.album_id, op_index],
        )?;
        Ok(inserted > 0)
    }

    pub fn upsert_track(&self, track: &TrackRecord, op_index: i64) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO tracks (id, name, popularity, album_id, duration_ms, op_index)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                track.id,
                track.name,
                track.popularity,
                track.album_id,
                track.duration_ms,
                op_index
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn upsert_audio_features(
        &self,
        features: &AudioFeaturesRecord,
        op_index: i64,
    ) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO audio_features
             (track_id, danceability, energy, loudness, speechiness, acousticness,
              instrumentalness, liveness, valence, tempo, op_index)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                features.track_id,
                features.danceability,
                features.energy,
                features.loudness,
                features.speechiness,
                features.acousticness,
                features.instrumentalness,
                features.liveness,
                features.valence,
                features.tempo,
                op_index
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn upsert_genre(&self, genre: &GenreRecord, op_index: i64) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO artist_genres (artist_id, genre, op_index) VALUES (?1, ?2, ?3)",
            params![genre.artist_id, genre.genre, op_index],
        )?;
        Ok(inserted > 0)
    }

    pub fn upsert_related_artist(&self, edge: &RelatedArtistRecord, op_index: i64) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO related_artists (artist_id, related_artist_id, op_index)
             VALUES (?1, ?2, ?3)",
            params![edge.artist_id, edge.related_artist_id, op_index],
        )?;
        Ok(inserted > 0)
    }

    /// Collection membership is observed directly; `op_index` is optional
    /// and stamped only when the membership arrives through a sync run.
    pub fn upsert_collection_member(
        &self,
        member: &CollectionMemberRecord,
        op_index: Option<i64>,
    ) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO collection_tracks (id, track_id, op_index) VALUES (?1, ?2, ?3)",
            params![member.collection_id, member.track_id, op_index],
        )?;
        Ok(inserted > 0)
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    pub fn get_artist(&self, id: &str) -> Result<Option<(ArtistRecord, i64)>> {
        let read_conn = self.read_conn();
        let conn = read_conn.lock().unwrap();

        let mut stmt = conn
            .prepare_cached("SELECT id, name, popularity, op_index FROM artists WHERE id = ?1")?;
        match stmt.query_row(params![id], |row| {
            Ok((
                ArtistRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    popularity: row.get(2)?,
                },
                row.get::<_, i64>(3)?,
            ))
        }) {
            Ok(found) => Ok(Some(found)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_album(&self, id: &str) -> Result<Option<(AlbumRecord, i64)>> {
        let read_conn = self.read_conn();
        let conn = read_conn.lock().unwrap();

        let mut stmt = conn
            .prepare_cached("SELECT id, name, release_date, op_index FROM albums WHERE id = ?1")?;
        match stmt.query_row(params![id], |row| {
            Ok((
                AlbumRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    release_date: row.get(2)?,
                },
                row.get::<_, i64>(3)?,
            ))
        }) {
            Ok(found) => Ok(Some(found)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_track(&self, id: &str) -> Result<Option<(TrackRecord, i64)>> {
        let read_conn = self.read_conn();
        let conn = read_conn.lock().unwrap();

        let mut stmt = conn.prepare_cached(
            "SELECT id, name, popularity, album_id, duration_ms, op_index FROM tracks WHERE id = ?1",
        )?;
        match stmt.query_row(params![id], |row| {
            Ok((
                TrackRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    popularity: row.get(2)?,
                    album_id: row.get(3)?,
                    duration_ms: row.get(4)?,
                },
                row.get::<_, i64>(5)?,
            ))
        }) {
            Ok(found) => Ok(Some(found)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_artist_genres(&self, artist_id: &str) -> Result<Vec<String>> {
        let read_conn = self.read_conn();
        let conn = read_conn.lock().unwrap();

        let mut stmt =
            conn.prepare_cached("SELECT genre FROM artist_genres WHERE artist_id = ?1")?;
        let genres = stmt
            .query_map(params![artist_id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(genres)
    }

    pub fn get_related_artist_ids(&self, artist_id: &str) -> Result<Vec<String>> {
        let read_conn = self.read_conn();
        let conn = read_conn.lock().unwrap();

        let mut stmt = conn
            .prepare_cached("SELECT related_artist_id FROM related_artists WHERE artist_id = ?1")?;
        let related = stmt
            .query_map(params![artist_id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(related)
    }

    /// Row count for one of the sync tables. Rejects unknown table names so
    /// no caller-supplied string ever reaches the SQL text.
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let sql = match table {
            "operations" => "SELECT COUNT(*) FROM operations",
            "artists" => "SELECT COUNT(*) FROM artists",
            "albums" => "SELECT COUNT(*) FROM albums",
            "album_artists" => "SELECT COUNT(*) FROM album_artists",
            "tracks" => "SELECT COUNT(*) FROM tracks",
            "audio_features" => "SELECT COUNT(*) FROM audio_features",
            "artist_genres" => "SELECT COUNT(*) FROM artist_genres",
            "related_artists" => "SELECT COUNT(*) FROM related_artists",
            "collection_tracks" => "SELECT COUNT(*) FROM collection_tracks",
            other => bail!("Unknown table '{}'", other),
        };
        let read_conn = self.read_conn();
        let conn = read_conn.lock().unwrap();
        Ok(conn.query_row(sql, [], |r| r.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_store() -> (TempDir, SqliteSyncStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteSyncStore::new(dir.path().join("sync.db"), 2).unwrap();
        (dir, store)
    }

    fn artist(id: &str, name: &str, popularity: i32) -> ArtistRecord {
        ArtistRecord {
            id: id.to_string(),
            name: name.to_string(),
            popularity,
        }
    }

    #[test]
    fn test_reopen_validates_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync.db");
        {
            let store = SqliteSyncStore::new(&path, 1).unwrap();
            store.open_operation(OperationKind::ArtistSync).unwrap();
        }
        // Second open must validate, not recreate, and keep existing rows
        let store = SqliteSyncStore::new(&path, 1).unwrap();
        assert_eq!(store.operation_count().unwrap(), 1);
    }

    #[test]
    fn test_operation_ids_strictly_increase() {
        let (_dir, store) = make_store();
        let first = store.open_operation(OperationKind::ArtistSync).unwrap();
        let second = store.open_operation(OperationKind::AlbumSync).unwrap();
        let third = store.open_operation(OperationKind::ArtistSync).unwrap();
        assert!(first < second);
        assert!(second < third);
    }

    #[test]
    fn test_open_operation_records_date_kind_and_pending_status() {
        let (_dir, store) = make_store();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let op_id = store
            .open_operation_on(OperationKind::GenreSync, date)
            .unwrap();

        let op = store.get_operation(op_id).unwrap().unwrap();
        assert_eq!(op.date, date);
        assert_eq!(op.op_type, OperationKind::GenreSync);
        assert_eq!(op.status, OperationStatus::Pending);
    }

    #[test]
    fn test_mark_operation_committed() {
        let (_dir, store) = make_store();
        let op_id = store.open_operation(OperationKind::TrackSync).unwrap();
        assert!(store
            .mark_operation(op_id, OperationStatus::Committed)
            .unwrap());
        let op = store.get_operation(op_id).unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Committed);
    }

    #[test]
    fn test_mark_unknown_operation_reports_no_update() {
        let (_dir, store) = make_store();
        assert!(!store
            .mark_operation(999, OperationStatus::Committed)
            .unwrap());
        assert_eq!(store.operation_count().unwrap(), 0);
    }

    #[test]
    fn test_count_rows_rejects_unknown_table() {
        let (_dir, store) = make_store();
        let err = store.count_rows("sqlite_master").unwrap_err().to_string();
        assert!(err.contains("Unknown table"));
        assert_eq!(store.count_rows("operations").unwrap(), 0);
    }

    #[test]
    fn test_upsert_artist_insert_then_ignore() {
        let (_dir, store) = make_store();
        let first_op = store.open_operation(OperationKind::ArtistSync).unwrap();

        assert!(store
            .upsert_artist(&artist("a1", "Nina Simone", 71), first_op)
            .unwrap());

        let second_op = store.open_operation(OperationKind::ArtistSync).unwrap();
        // Different field values for the same key: existing data wins
        assert!(!store
            .upsert_artist(&artist("a1", "Not Nina", 0), second_op)
            .unwrap());

        let (stored, op_index) = store.get_artist("a1").unwrap().unwrap();
        assert_eq!(stored.name, "Nina Simone");
        assert_eq!(stored.popularity, 71);
        assert_eq!(op_index, first_op);
    }

    #[test]
    fn test_upsert_track_with_unseen_album_is_not_an_error() {
        let (_dir, store) = make_store();
        let op = store.open_operation(OperationKind::TrackSync).unwrap();
        let track = TrackRecord {
            id: "t1".to_string(),
            name: "Sinnerman".to_string(),
            popularity: 60,
            album_id: "unseen-album".to_string(),
            duration_ms: 618_000,
        };
        assert!(store.upsert_track(&track, op).unwrap());
    }

    #[test]
    fn test_edge_upserts_deduplicate_but_keep_direction() {
        let (_dir, store) = make_store();
        let op = store.open_operation(OperationKind::RelationSync).unwrap();

        let forward = RelatedArtistRecord {
            artist_id: "a1".to_string(),
            related_artist_id: "a2".to_string(),
        };
        let reverse = RelatedArtistRecord {
            artist_id: "a2".to_string(),
            related_artist_id: "a1".to_string(),
        };

        assert!(store.upsert_related_artist(&forward, op).unwrap());
        assert!(!store.upsert_related_artist(&forward, op).unwrap());
        assert!(store.upsert_related_artist(&reverse, op).unwrap());
        assert_eq!(store.count_rows("related_artists").unwrap(), 2);
    }

    #[test]
    fn test_genre_tags_deduplicate_per_artist() {
        let (_dir, store) = make_store();
        let op = store.open_operation(OperationKind::GenreSync).unwrap();

        let jazz = GenreRecord {
            artist_id: "a1".to_string(),
            genre: "jazz".to_string(),
        };
        assert!(store.upsert_genre(&jazz, op).unwrap());
        assert!(!store.upsert_genre(&jazz, op).unwrap());
        // Same genre on another artist is a distinct tag
        let other = GenreRecord {
            artist_id: "a2".to_string(),
            genre: "jazz".to_string(),
        };
        assert!(store.upsert_genre(&other, op).unwrap());

        assert_eq!(store.get_artist_genres("a1").unwrap(), vec!["jazz"]);
    }

    #[test]
    fn test_collection_member_without_operation() {
        let (_dir, store) = make_store();
        let member = CollectionMemberRecord {
            collection_id: "playlist1".to_string(),
            track_id: "t1".to_string(),
        };
        assert!(store.upsert_collection_member(&member, None).unwrap());
        assert!(!store.upsert_collection_member(&member, None).unwrap());
        assert_eq!(store.count_rows("collection_tracks").unwrap(), 1);
    }
}
