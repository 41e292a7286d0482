//! Player events
//!
//! Controllers push events into a crossbeam channel in the order things
//! happen. The UI side drains the receiver; a dropped receiver only means
//! nobody is listening any more.

use crossbeam::channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;
use uuid::Uuid;

use crate::engine::transport::PlaybackState;

/// Identity of one player on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Fresh random identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form is enough to tell players apart in logs
        let id = self.0.simple().to_string();
        f.write_str(&id[..8])
    }
}

/// Why a player could not play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum PlaybackFailure {
    /// The recording could not be fetched
    SourceLoadFailed(String),
    /// The recording could not be decoded
    SourceDecodeFailed(String),
    /// The host refused to start output
    StartRejected(String),
}

impl fmt::Display for PlaybackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackFailure::SourceLoadFailed(r) => write!(f, "could not load recording: {}", r),
            PlaybackFailure::SourceDecodeFailed(r) => {
                write!(f, "could not decode recording: {}", r)
            }
            PlaybackFailure::StartRejected(r) => write!(f, "playback was not allowed: {}", r),
        }
    }
}

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEventKind {
    /// Every playback state transition
    StateChanged { state: PlaybackState },
    /// Playback position, on a regular cadence while playing
    TimeUpdated { position: f64 },
    /// Total length, once per load
    MetadataLoaded { duration: f64 },
    /// Load, decode or start failure; the player is back to idle
    PlaybackFailed { failure: PlaybackFailure },
}

/// One event from one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEvent {
    /// Player that emitted the event
    pub player: PlayerId,
    /// Event payload
    #[serde(flatten)]
    pub kind: PlayerEventKind,
}

/// Sending half handed to controllers
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<PlayerEvent>,
}

impl EventSink {
    /// Wrap an existing sender
    pub fn new(tx: Sender<PlayerEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver the UI reads from
    pub fn channel() -> (Self, Receiver<PlayerEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    /// A sink nobody listens to
    pub fn discard() -> Self {
        Self::channel().0
    }

    pub(crate) fn emit(&self, player: PlayerId, kind: PlayerEventKind) {
        if self.tx.send(PlayerEvent { player, kind }).is_err() {
            trace!(%player, "event receiver dropped");
        }
    }
}
