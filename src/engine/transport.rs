//! Transport bookkeeping for one player
//!
//! Tracks the playback state, the playhead, the duration once known, a seek
//! queued before metadata arrived, and when the next time update is due.
//! The transport never talks to the media element; the controller does.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Playback states of a review player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Not started, or returned here after a failure
    #[default]
    Idle,
    /// Audible (or about to be, once the host allows output)
    Playing,
    /// Stopped mid-recording, position kept
    Paused,
    /// Reached the end of the recording
    Ended,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Paused => write!(f, "Paused"),
            PlaybackState::Ended => write!(f, "Ended"),
        }
    }
}

/// Result of a seek request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekOutcome {
    /// Position moved to the clamped value
    Applied(f64),
    /// Duration unknown; the seek waits for metadata
    Queued,
}

/// Playhead and state of one player
#[derive(Debug, Clone)]
pub struct Transport {
    state: PlaybackState,

    /// Playhead in seconds
    position: f64,

    /// Total length, once metadata arrived
    duration: Option<f64>,

    /// Seek requested before the duration was known (last one wins)
    pending_seek: Option<f64>,

    /// Playhead at the last time update
    last_time_update: Option<f64>,

    /// Seconds of playback between time updates
    time_update_interval: f64,
}

impl Transport {
    /// Create an idle transport emitting time updates every `interval` seconds
    pub fn new(time_update_interval: f64) -> Self {
        Self {
            state: PlaybackState::Idle,
            position: 0.0,
            duration: None,
            pending_seek: None,
            last_time_update: None,
            time_update_interval: time_update_interval.max(0.0),
        }
    }

    /// Current state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Move to `state`; returns false when already there
    pub fn transition(&mut self, state: PlaybackState) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        true
    }

    /// Playhead in seconds
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Total length, if known
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Whether a seek is waiting for metadata
    pub fn pending_seek(&self) -> Option<f64> {
        self.pending_seek
    }

    /// Record the duration and apply any queued seek
    ///
    /// Returns the position the queued seek landed on, if there was one.
    pub fn set_duration(&mut self, duration: f64) -> Option<f64> {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        self.duration = Some(duration);
        self.position = self.position.min(duration);
        self.pending_seek.take().map(|target| {
            self.position = target.clamp(0.0, duration);
            self.position
        })
    }

    /// Seek to `position`, clamped to `[0, duration]`
    ///
    /// Non-finite positions are ignored and report the current playhead.
    pub fn seek(&mut self, position: f64) -> SeekOutcome {
        if !position.is_finite() {
            return SeekOutcome::Applied(self.position);
        }
        match self.duration {
            Some(duration) => {
                self.position = position.clamp(0.0, duration);
                self.last_time_update = None;
                SeekOutcome::Applied(self.position)
            }
            None => {
                self.pending_seek = Some(position);
                SeekOutcome::Queued
            }
        }
    }

    /// Sync the playhead to the media element's position
    pub fn sync_position(&mut self, position: f64) {
        self.position = match self.duration {
            Some(duration) => position.clamp(0.0, duration),
            None => position.max(0.0),
        };
    }

    /// Whether a time update is due at the current playhead
    ///
    /// The first update after a start or seek is always due.
    pub fn time_update_due(&self) -> bool {
        match self.last_time_update {
            None => true,
            Some(last) => self.position - last >= self.time_update_interval,
        }
    }

    /// Note that a time update was just emitted
    pub fn mark_time_update(&mut self) {
        self.last_time_update = Some(self.position);
    }

    /// Forget the last time update so the next one is due immediately
    pub fn reset_time_update(&mut self) {
        self.last_time_update = None;
    }

    /// Whether the playhead sits at the end of a known duration
    pub fn at_end(&self) -> bool {
        matches!(self.duration, Some(d) if self.position >= d)
    }

    /// Move the playhead back to the start
    pub fn rewind(&mut self) {
        self.position = 0.0;
        self.last_time_update = None;
    }

    /// Forget the loaded metadata, e.g. before reloading after a failure
    pub fn clear_metadata(&mut self) {
        self.duration = None;
        self.position = 0.0;
        self.last_time_update = None;
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(0.25)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
