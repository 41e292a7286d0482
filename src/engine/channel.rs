//! Parameter channel
//!
//! Records the reviewer's four filter settings for one player and forwards
//! them to the live graph. Settings made before the graph exists are kept
//! and used when it is built.

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::trace;

use crate::dsp::{FilterParameters, ParameterKind, SignalGraph};

/// A single slider movement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterChange {
    /// Which parameter moved
    pub kind: ParameterKind,
    /// Raw value from the control, clamped on arrival
    pub value: f64,
}

/// Cloneable handle UI controls use to push changes
#[derive(Debug, Clone)]
pub struct ParameterSender {
    tx: Sender<ParameterChange>,
}

impl ParameterSender {
    /// Queue a change; returns false if the player is gone
    pub fn send(&self, kind: ParameterKind, value: f64) -> bool {
        self.tx.send(ParameterChange { kind, value }).is_ok()
    }
}

/// Recorded parameters plus the queue of pushed changes
#[derive(Debug)]
pub struct ParameterChannel {
    params: FilterParameters,
    tx: Sender<ParameterChange>,
    rx: Receiver<ParameterChange>,
}

impl ParameterChannel {
    /// Create a channel starting from `initial` (clamped)
    pub fn new(initial: FilterParameters) -> Self {
        let (tx, rx) = unbounded();
        Self {
            params: initial.sanitized(),
            tx,
            rx,
        }
    }

    /// Handle for pushing changes from elsewhere
    pub fn sender(&self) -> ParameterSender {
        ParameterSender {
            tx: self.tx.clone(),
        }
    }

    /// Record a value and apply it to `graph` if there is one
    ///
    /// Returns the clamped value now recorded.
    pub fn set(&mut self, kind: ParameterKind, value: f64, graph: Option<&mut SignalGraph>) -> f64 {
        let recorded = self.params.set(kind, value);
        if let Some(graph) = graph {
            graph.set_parameter(kind, recorded);
        }
        trace!(%kind, recorded, "parameter recorded");
        recorded
    }

    /// Apply every queued change, oldest first
    ///
    /// Returns how many changes were applied.
    pub fn drain(&mut self, mut graph: Option<&mut SignalGraph>) -> usize {
        let mut applied = 0;
        while let Ok(change) = self.rx.try_recv() {
            self.set(change.kind, change.value, graph.as_deref_mut());
            applied += 1;
        }
        applied
    }

    /// Current value of one parameter
    pub fn get(&self, kind: ParameterKind) -> f64 {
        self.params.get(kind)
    }

    /// All recorded values
    pub fn current(&self) -> FilterParameters {
        self.params
    }
}

impl Default for ParameterChannel {
    fn default() -> Self {
        Self::new(FilterParameters::default())
    }
}
