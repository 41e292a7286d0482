//! Processing stages of the review chain
//!
//! Every stage owns exactly one adjustable value. Stages process blocks in
//! place and can be retuned between blocks without losing state.

use super::biquad::{BiquadCoeffs, BiquadState, PassType};
use super::params::ParameterKind;
use crate::engine::AudioBuffer;

/// Common interface of the four stages
pub trait Stage: Send {
    /// Process a block in place
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Called when the processing sample rate is known or changes
    fn prepare(&mut self, sample_rate: f64);

    /// Clear internal history (filter delay lines)
    fn reset(&mut self);

    /// Which parameter drives this stage
    fn kind(&self) -> ParameterKind;

    /// Current value of the stage's parameter
    fn value(&self) -> f64;

    /// Apply a new value; takes effect on the next processed sample
    fn set_value(&mut self, value: f64);
}

// ============================================================================
// Filter Stage
// ============================================================================

/// High-pass or low-pass biquad with per-channel history
#[derive(Debug, Clone)]
pub struct FilterStage {
    pass: PassType,
    corner_hz: f64,
    sample_rate: f64,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
}

impl FilterStage {
    /// Create a filter stage at the given corner frequency
    pub fn new(pass: PassType, corner_hz: f64, sample_rate: f64) -> Self {
        Self {
            pass,
            corner_hz,
            sample_rate,
            coeffs: BiquadCoeffs::pass(pass, sample_rate, corner_hz),
            states: Vec::new(),
        }
    }

    /// Create the high-pass stage
    pub fn high_pass(corner_hz: f64, sample_rate: f64) -> Self {
        Self::new(PassType::HighPass, corner_hz, sample_rate)
    }

    /// Create the low-pass stage
    pub fn low_pass(corner_hz: f64, sample_rate: f64) -> Self {
        Self::new(PassType::LowPass, corner_hz, sample_rate)
    }

    fn update_coefficients(&mut self) {
        self.coeffs = BiquadCoeffs::pass(self.pass, self.sample_rate, self.corner_hz);
    }
}

impl Stage for FilterStage {
    fn process(&mut self, buffer: &mut AudioBuffer) {
        if self.states.len() < buffer.channels() {
            self.states
                .resize_with(buffer.channels(), BiquadState::default);
        }

        for (channel, state) in buffer.samples.iter_mut().zip(self.states.iter_mut()) {
            for sample in channel.iter_mut() {
                *sample = state.process(*sample as f64, &self.coeffs) as f32;
            }
        }
    }

    fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    fn reset(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
    }

    fn kind(&self) -> ParameterKind {
        match self.pass {
            PassType::HighPass => ParameterKind::HighPassHz,
            PassType::LowPass => ParameterKind::LowPassHz,
        }
    }

    fn value(&self) -> f64 {
        self.corner_hz
    }

    fn set_value(&mut self, value: f64) {
        self.corner_hz = value;
        self.update_coefficients();
    }
}

// ============================================================================
// Linear Stage
// ============================================================================

/// Plain multiplier, used for both make-up gain and output volume
#[derive(Debug, Clone)]
pub struct LinearStage {
    kind: ParameterKind,
    factor: f64,
}

impl LinearStage {
    /// Create the make-up gain stage
    pub fn gain(factor: f64) -> Self {
        Self {
            kind: ParameterKind::Gain,
            factor,
        }
    }

    /// Create the output volume stage
    pub fn volume(factor: f64) -> Self {
        Self {
            kind: ParameterKind::Volume,
            factor,
        }
    }
}

impl Stage for LinearStage {
    fn process(&mut self, buffer: &mut AudioBuffer) {
        // Unity gain optimization
        if (self.factor - 1.0).abs() < f64::EPSILON {
            return;
        }

        let factor = self.factor as f32;
        for channel in &mut buffer.samples {
            for sample in channel.iter_mut() {
                *sample *= factor;
            }
        }
    }

    fn prepare(&mut self, _sample_rate: f64) {}

    fn reset(&mut self) {
        // No history
    }

    fn kind(&self) -> ParameterKind {
        self.kind
    }

    fn value(&self) -> f64 {
        self.factor
    }

    fn set_value(&mut self, value: f64) {
        self.factor = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelLayout;
    use approx::assert_relative_eq;

    fn constant_block(value: f32) -> AudioBuffer {
        AudioBuffer::from_interleaved(&[value; 64], ChannelLayout::Stereo, 48000).unwrap()
    }

    #[test]
    fn test_linear_stage_scales_every_channel() {
        let mut stage = LinearStage::gain(2.5);
        let mut block = constant_block(0.2);
        stage.process(&mut block);
        assert_relative_eq!(block.channel(0)[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(block.channel(1)[31], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_volume_mutes() {
        let mut stage = LinearStage::volume(0.0);
        let mut block = constant_block(0.8);
        stage.process(&mut block);
        assert_eq!(block.peak(), 0.0);
    }

    #[test]
    fn test_filter_stage_reports_kind() {
        assert_eq!(
            FilterStage::high_pass(200.0, 48000.0).kind(),
            ParameterKind::HighPassHz
        );
        assert_eq!(
            FilterStage::low_pass(8000.0, 48000.0).kind(),
            ParameterKind::LowPassHz
        );
    }

    #[test]
    fn test_high_pass_removes_dc() {
        let mut stage = FilterStage::high_pass(100.0, 48000.0);
        let mut block = AudioBuffer::from_interleaved(&[0.5; 48000], ChannelLayout::Mono, 48000)
            .unwrap();
        stage.process(&mut block);
        let tail = &block.channel(0)[47000..];
        assert!(tail.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn test_retune_keeps_history() {
        let mut stage = FilterStage::low_pass(1000.0, 48000.0);
        let mut block = constant_block(1.0);
        stage.process(&mut block);
        let last_before = block.channel(0)[63];

        stage.set_value(2000.0);
        let mut next = constant_block(1.0);
        stage.process(&mut next);

        // a reset filter would restart from zero
        assert!(next.channel(0)[0] > last_before * 0.5);
        assert_eq!(stage.value(), 2000.0);
    }
}
