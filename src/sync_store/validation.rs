//! Validation for sync candidates.
//!
//! A candidate that fails validation is a malformed record: it is skipped
//! and logged by the orchestrator, never persisted, and never aborts the
//! rest of its kind.

use super::models::{
    AlbumArtistRecord, AlbumRecord, ArtistRecord, AudioFeaturesRecord, CollectionMemberRecord,
    GenreRecord, RelatedArtistRecord, TrackRecord,
};
use std::fmt;

/// Validation error types
#[derive(Debug)]
pub enum ValidationError {
    EmptyField { field: &'static str },
    NegativeValue { field: &'static str, value: i64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField { field } => {
                write!(f, "Field '{}' is required but was empty", field)
            }
            ValidationError::NegativeValue { field, value } => {
                write!(f, "Field '{}' must be non-negative, got {}", field, value)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

fn require(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField { field })
    } else {
        Ok(())
    }
}

pub fn validate_artist(artist: &ArtistRecord) -> ValidationResult {
    require("id", &artist.id)?;
    require("name", &artist.name)
}

pub fn validate_album(album: &AlbumRecord) -> ValidationResult {
    require("id", &album.id)?;
    require("name", &album.name)
}

pub fn validate_album_artist(edge: &AlbumArtistRecord) -> ValidationResult {
    require("artist_id", &edge.artist_id)?;
    require("album_id", &edge.album_id)
}

pub fn validate_track(track: &TrackRecord) -> ValidationResult {
    require("id", &track.id)?;
    require("name", &track.name)?;
    require("album_id", &track.album_id)?;
    if track.duration_ms < 0 {
        return Err(ValidationError::NegativeValue {
            field: "duration_ms",
            value: track.duration_ms,
        });
    }
    Ok(())
}

pub fn validate_audio_features(features: &AudioFeaturesRecord) -> ValidationResult {
    require("track_id", &features.track_id)
}

pub fn validate_genre(genre: &GenreRecord) -> ValidationResult {
    require("artist_id", &genre.artist_id)?;
    require("genre", &genre.genre)
}

pub fn validate_related_artist(edge: &RelatedArtistRecord) -> ValidationResult {
    require("artist_id", &edge.artist_id)?;
    require("related_artist_id", &edge.related_artist_id)
}

pub fn validate_collection_member(member: &CollectionMemberRecord) -> ValidationResult {
    require("collection_id", &member.collection_id)?;
    require("track_id", &member.track_id)
}
