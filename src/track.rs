//! Track model and whole-document persistence.
//!
//! A [`Track`] is a chronological sequence of admitted fixes; a
//! [`TrackDocument`] is the ordered collection of named tracks the host keeps
//! on disk. The document is persisted as a unit (load-modify-save) — there is
//! no incremental append to storage.
//!
//! The on-disk schema is JSON shaped like a GPX file: ordered tracks, each with
//! a name, a free-text description and an ordered point list. Round-tripping
//! preserves point order and track metadata.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentryError};
use crate::geo_utils::fix_distance;
use crate::GpsFix;

/// A track needs at least two points to form a path.
pub const MIN_SAVEABLE_POINTS: usize = 2;

/// A recorded chronological sequence of admitted fixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Display name; defaulted from the recording start time when unset.
    pub name: Option<String>,
    /// Free-text description; defaulted like the name.
    pub description: Option<String>,
    /// Points in insertion (chronological) order.
    pub points: Vec<GpsFix>,
}

impl Track {
    pub fn new() -> Self {
        Self {
            name: None,
            description: None,
            points: Vec::new(),
        }
    }

    /// Append a fix, keeping chronological order (callers feed fixes in order).
    pub fn push(&mut self, fix: GpsFix) {
        self.points.push(fix);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// A single point cannot form a path.
    pub fn is_saveable(&self) -> bool {
        self.points.len() >= MIN_SAVEABLE_POINTS
    }

    /// Total great-circle length of the track in meters.
    pub fn total_distance(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| fix_distance(&w[0], &w[1]))
            .sum()
    }

    /// Fill in name and description from the recording start time when unset.
    pub fn ensure_metadata(&mut self, started: DateTime<Utc>) {
        if self.name.is_none() {
            self.name = Some(format!("Track {}", started.format("%Y-%m-%d %H:%M")));
        }
        if self.description.is_none() {
            self.description = Some(format!(
                "Recorded starting {}",
                started.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered collection of named tracks, persisted as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackDocument {
    pub tracks: Vec<Track>,
}

impl TrackDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Track at `index`, or `None` when out of range.
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Append a track at the end of the document.
    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Remove and return the track at `index`; `None` when out of range.
    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        if index < self.tracks.len() {
            Some(self.tracks.remove(index))
        } else {
            None
        }
    }
}

/// File-backed storage for one [`TrackDocument`].
///
/// `save` performs blocking file I/O; production hosts should call it off the
/// callback delivery thread.
#[derive(Debug, Clone)]
pub struct TrackStore {
    path: PathBuf,
}

impl TrackStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, or an empty one when no file exists yet.
    ///
    /// A file that exists but cannot be read or parsed is an error — silently
    /// starting over would drop the user's saved tracks on the next save.
    pub fn load(&self) -> Result<TrackDocument> {
        if !self.path.exists() {
            return Ok(TrackDocument::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| SentryError::Persistence {
            message: format!("read {}: {}", self.path.display(), e),
        })?;
        serde_json::from_str(&raw).map_err(|e| SentryError::Persistence {
            message: format!("parse {}: {}", self.path.display(), e),
        })
    }

    /// Persist the whole document.
    pub fn save(&self, document: &TrackDocument) -> Result<()> {
        let raw = serde_json::to_string_pretty(document).map_err(|e| SentryError::Persistence {
            message: format!("serialize track document: {}", e),
        })?;
        fs::write(&self.path, raw).map_err(|e| SentryError::Persistence {
            message: format!("write {}: {}", self.path.display(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn fix(lat: f64, lon: f64) -> GpsFix {
        GpsFix::new(lat, lon, Utc::now()).with_accuracy(5.0)
    }

    fn two_point_track(name: &str) -> Track {
        let mut track = Track::new();
        track.name = Some(name.to_string());
        track.push(fix(52.5, 13.4));
        track.push(fix(52.501, 13.401));
        track
    }

    #[test]
    fn test_saveable_needs_two_points() {
        let mut track = Track::new();
        assert!(!track.is_saveable());
        track.push(fix(52.5, 13.4));
        assert!(!track.is_saveable());
        track.push(fix(52.501, 13.401));
        assert!(track.is_saveable());
    }

    #[test]
    fn test_metadata_defaults_from_start_time() {
        let started = "2024-06-01T09:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut track = Track::new();
        track.ensure_metadata(started);
        assert_eq!(track.name.as_deref(), Some("Track 2024-06-01 09:30"));
        assert!(track.description.as_deref().unwrap().contains("2024-06-01"));

        // Explicit metadata is never overwritten.
        let mut named = two_point_track("Morning ride");
        named.ensure_metadata(started);
        assert_eq!(named.name.as_deref(), Some("Morning ride"));
    }

    #[test]
    fn test_total_distance_is_positive_for_real_movement() {
        let track = two_point_track("t");
        let d = track.total_distance();
        assert!(d > 100.0 && d < 200.0, "got {}", d);
    }

    #[test]
    fn test_document_index_operations_fail_softly() {
        let mut doc = TrackDocument::new();
        assert!(doc.track(0).is_none());
        assert!(doc.remove_track(0).is_none());

        doc.add_track(two_point_track("a"));
        doc.add_track(two_point_track("b"));
        assert_eq!(doc.track(1).unwrap().name.as_deref(), Some("b"));
        assert!(doc.track(2).is_none());

        let removed = doc.remove_track(0).unwrap();
        assert_eq!(removed.name.as_deref(), Some("a"));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_load_missing_file_gives_empty_document() {
        let dir = TempDir::new("track_store").unwrap();
        let store = TrackStore::new(dir.path().join("tracks.json"));
        let doc = store.load().unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_round_trip_preserves_order_and_metadata() {
        let dir = TempDir::new("track_store").unwrap();
        let store = TrackStore::new(dir.path().join("tracks.json"));

        let mut doc = TrackDocument::new();
        doc.add_track(two_point_track("first"));
        doc.add_track(two_point_track("second"));
        doc.tracks[1].description = Some("evening loop".to_string());
        store.save(&doc).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(loaded.track(0).unwrap().name.as_deref(), Some("first"));
        assert_eq!(
            loaded.track(1).unwrap().description.as_deref(),
            Some("evening loop")
        );
    }

    #[test]
    fn test_corrupt_file_is_an_error_not_a_reset() {
        let dir = TempDir::new("track_store").unwrap();
        let path = dir.path().join("tracks.json");
        fs::write(&path, "not json").unwrap();

        let store = TrackStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(SentryError::Persistence { .. })
        ));
    }
}
