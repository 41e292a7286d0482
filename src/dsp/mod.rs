//! Signal conditioning for review playback
//!
//! A fixed chain of stages: high-pass, low-pass, make-up gain, volume.
//! Every stage implements the `Stage` trait for uniform processing.

mod biquad;
mod graph;
mod params;
mod stage;

pub use biquad::{BiquadCoeffs, BiquadState, PassType};
pub use graph::{ProcessingContext, RealtimeContext, SignalGraph};
pub use params::{
    FilterParameters, ParameterKind, GAIN_RANGE, HIGH_PASS_RANGE, LOW_PASS_RANGE, VOLUME_RANGE,
};
pub use stage::{FilterStage, LinearStage, Stage};
