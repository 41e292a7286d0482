//! Signal graph for the review player
//!
//! The chain is fixed: high-pass -> low-pass -> gain -> volume -> output.
//! A graph is bound to one source for its whole life and is never rewired;
//! parameter changes retune the live stages instead.

use tracing::debug;

use super::params::{FilterParameters, ParameterKind};
use super::stage::{FilterStage, LinearStage, Stage};
use crate::engine::buffer::MIN_SAMPLE_RATE;
use crate::engine::{AudioBuffer, AudioSource};
use crate::error::{ChirpError, Result};

/// Host-side real-time processing context
///
/// A host that cannot run real-time processing reports itself unavailable;
/// players then fall back to unfiltered passthrough.
pub trait ProcessingContext {
    /// Whether stages can be attached to a source at all
    fn is_available(&self) -> bool;

    /// Rate the stages run at
    fn sample_rate(&self) -> f64;
}

/// Plain context description, usually built from configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealtimeContext {
    /// Whether real-time processing is offered
    pub available: bool,
    /// Processing sample rate in Hz
    pub sample_rate: f64,
}

impl RealtimeContext {
    /// A working context at `sample_rate`
    pub fn new(sample_rate: f64) -> Self {
        Self {
            available: true,
            sample_rate,
        }
    }

    /// A host without real-time processing
    pub fn unavailable() -> Self {
        Self {
            available: false,
            sample_rate: 0.0,
        }
    }
}

impl ProcessingContext for RealtimeContext {
    fn is_available(&self) -> bool {
        self.available && self.sample_rate > 0.0
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

/// The four connected stages
#[derive(Debug)]
struct Stages {
    high_pass: FilterStage,
    low_pass: FilterStage,
    gain: LinearStage,
    volume: LinearStage,
}

impl Stages {
    fn stage_mut(&mut self, kind: ParameterKind) -> &mut dyn Stage {
        match kind {
            ParameterKind::HighPassHz => &mut self.high_pass,
            ParameterKind::LowPassHz => &mut self.low_pass,
            ParameterKind::Gain => &mut self.gain,
            ParameterKind::Volume => &mut self.volume,
        }
    }

    /// Stages in signal-flow order
    fn in_order(&mut self) -> [&mut dyn Stage; 4] {
        [
            &mut self.high_pass,
            &mut self.low_pass,
            &mut self.gain,
            &mut self.volume,
        ]
    }
}

/// Fixed four-stage chain bound to one source
#[derive(Debug)]
pub struct SignalGraph {
    source: AudioSource,
    sample_rate: f64,
    params: FilterParameters,
    /// `None` once released
    stages: Option<Stages>,
}

impl SignalGraph {
    /// Build and connect the chain for `source`
    ///
    /// `params` are applied (clamped) before the first block is processed.
    ///
    /// # Errors
    /// * `GraphUnavailable` - the context cannot run real-time processing, or
    ///   reports a rate below `MIN_SAMPLE_RATE`
    pub fn build(
        source: &AudioSource,
        context: &dyn ProcessingContext,
        params: &FilterParameters,
    ) -> Result<Self> {
        let sample_rate = context.sample_rate();
        if !context.is_available()
            || !sample_rate.is_finite()
            || sample_rate < MIN_SAMPLE_RATE as f64
        {
            return Err(ChirpError::GraphUnavailable);
        }

        let params = params.sanitized();
        let stages = Stages {
            high_pass: FilterStage::high_pass(params.high_pass_hz, sample_rate),
            low_pass: FilterStage::low_pass(params.low_pass_hz, sample_rate),
            gain: LinearStage::gain(params.gain),
            volume: LinearStage::volume(params.volume),
        };

        debug!(
            source = %source.url(),
            sample_rate,
            "signal graph connected"
        );

        Ok(Self {
            source: source.clone(),
            sample_rate,
            params,
            stages: Some(stages),
        })
    }

    /// Apply one parameter to its stage without interrupting audio
    ///
    /// The value is clamped into range first; non-finite input is ignored.
    /// Returns the value now in effect. A released graph only records it.
    pub fn set_parameter(&mut self, kind: ParameterKind, value: f64) -> f64 {
        let applied = self.params.set(kind, value);
        if let Some(stages) = self.stages.as_mut() {
            stages.stage_mut(kind).set_value(applied);
        }
        applied
    }

    /// Current value of one parameter
    pub fn parameter(&self, kind: ParameterKind) -> f64 {
        self.params.get(kind)
    }

    /// All parameters as applied to the stages
    pub fn parameters(&self) -> FilterParameters {
        self.params
    }

    /// Run one block through the chain, in order
    ///
    /// A released graph leaves the block untouched.
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        if let Some(stages) = self.stages.as_mut() {
            for stage in stages.in_order() {
                stage.process(buffer);
            }
        }
    }

    /// Clear filter history, e.g. after a seek
    pub fn reset(&mut self) {
        if let Some(stages) = self.stages.as_mut() {
            for stage in stages.in_order() {
                stage.reset();
            }
        }
    }

    /// Disconnect every stage and the source binding
    ///
    /// Safe to call any number of times.
    pub fn release(&mut self) {
        if self.stages.take().is_some() {
            debug!(source = %self.source.url(), "signal graph released");
        }
    }

    /// Whether the stages are still connected
    pub fn is_connected(&self) -> bool {
        self.stages.is_some()
    }

    /// Source this graph is bound to
    pub fn source(&self) -> &AudioSource {
        &self.source
    }

    /// Processing sample rate
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

impl Drop for SignalGraph {
    fn drop(&mut self) {
        self.release();
    }
}
