//! Filtered track recording.
//!
//! The recorder feeds every raw fix through the configured
//! [`LocationFilter`](crate::filter::LocationFilter) and appends only admitted
//! fixes to the in-memory track. Saving appends the track to the
//! [`TrackDocument`](crate::track::TrackDocument) and persists the whole
//! document; all failures are soft (`bool`/`Option`), never panics.

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::filter::{FilterConfig, FilterState, LocationFilter};
use crate::track::{Track, TrackDocument, TrackStore};
use crate::{GpsFix, Result};

/// Records admitted fixes into the current track and manages the persisted
/// track document.
pub struct TrackRecorder {
    store: TrackStore,
    document: TrackDocument,
    filter: Box<dyn LocationFilter>,
    filter_state: FilterState,
    current: Track,
    recording: bool,
    started: Option<DateTime<Utc>>,
    /// Document index the current track was last saved at, if any.
    saved_at: Option<usize>,
    /// Whether the current track changed since its last successful save.
    dirty: bool,
}

impl TrackRecorder {
    /// Create a recorder, loading the existing track document (or starting an
    /// empty one when no file exists yet).
    pub fn new(store: TrackStore, filter_config: &FilterConfig) -> Result<Self> {
        let document = store.load()?;
        Ok(Self {
            store,
            document,
            filter: filter_config.build(),
            filter_state: FilterState::new(),
            current: Track::new(),
            recording: false,
            started: None,
            saved_at: None,
            dirty: false,
        })
    }

    /// Begin a new recording session with a fresh track and filter state.
    pub fn start_recording(&mut self) {
        self.current = Track::new();
        self.filter_state.reset();
        self.recording = true;
        self.started = Some(Utc::now());
        self.saved_at = None;
        self.dirty = false;
    }

    /// Stop recording. Fixes arriving after this call are ignored; the current
    /// track stays available for saving.
    pub fn stop_recording(&mut self) {
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Feed a raw fix. Returns `true` when the fix was admitted and appended.
    pub fn record(&mut self, fix: GpsFix) -> bool {
        if !self.recording {
            return false;
        }
        if !fix.is_valid() {
            debug!("[recorder] dropping fix with out-of-range coordinates");
            return false;
        }
        if !self.filter.accept(&mut self.filter_state, &fix) {
            return false;
        }
        self.current.push(fix);
        self.dirty = true;
        true
    }

    /// The track currently being recorded.
    pub fn current_track(&self) -> &Track {
        &self.current
    }

    /// Name the current track (otherwise defaulted from the start time on save).
    pub fn set_track_name(&mut self, name: String) {
        self.current.name = Some(name);
        self.dirty = true;
    }

    /// Describe the current track (otherwise defaulted on save).
    pub fn set_track_description(&mut self, description: String) {
        self.current.description = Some(description);
        self.dirty = true;
    }

    /// Save the current track into the document and persist it.
    ///
    /// Returns `false` (a no-op) when the track has fewer than two points or
    /// when persistence fails; the in-memory document is rolled back on a
    /// persistence failure. Saving an unmodified, already-saved track is
    /// idempotent: it returns `true` without duplicating the document entry.
    pub fn save_recording(&mut self) -> bool {
        if !self.current.is_saveable() {
            debug!(
                "[recorder] not saving: track has {} point(s)",
                self.current.len()
            );
            return false;
        }

        if self.saved_at.is_some() && !self.dirty {
            return true;
        }

        self.current
            .ensure_metadata(self.started.unwrap_or_else(Utc::now));

        let previous = self.document.clone();
        let index = match self.saved_at {
            // Track changed since its last save: replace the saved entry.
            Some(index) => {
                self.document.tracks[index] = self.current.clone();
                index
            }
            None => {
                self.document.add_track(self.current.clone());
                self.document.len() - 1
            }
        };

        match self.store.save(&self.document) {
            Ok(()) => {
                self.saved_at = Some(index);
                self.dirty = false;
                true
            }
            Err(e) => {
                warn!("[recorder] failed to persist track document: {}", e);
                self.document = previous;
                false
            }
        }
    }

    /// The persisted document as currently loaded in memory.
    pub fn document(&self) -> &TrackDocument {
        &self.document
    }

    /// Track at `index` in the document, or `None` when out of range.
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.document.track(index)
    }

    /// Delete the track at `index` and persist the document.
    ///
    /// Returns `false` on an out-of-range index or a persistence failure (the
    /// in-memory document is restored in the latter case).
    pub fn delete_track(&mut self, index: usize) -> bool {
        let Some(removed) = self.document.remove_track(index) else {
            return false;
        };
        match self.store.save(&self.document) {
            Ok(()) => {
                // The saved slot of the current track may have shifted.
                if let Some(saved) = self.saved_at {
                    if saved == index {
                        self.saved_at = None;
                    } else if saved > index {
                        self.saved_at = Some(saved - 1);
                    }
                }
                true
            }
            Err(e) => {
                warn!("[recorder] failed to persist after delete: {}", e);
                self.document.tracks.insert(index, removed);
                false
            }
        }
    }
}
