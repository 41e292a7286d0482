//! Second-order pass filters
//!
//! Butterworth-style high-pass and low-pass biquads from the Audio EQ
//! Cookbook. Coefficients can be swapped while audio is flowing: the delay
//! line is kept, so a corner change never restarts the filter.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Pass direction of a filter stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassType {
    /// Remove below the corner frequency
    HighPass,
    /// Remove above the corner frequency
    LowPass,
}

/// Biquad filter coefficients, normalized by a0
///
/// H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Calculate coefficients for a pass filter
    ///
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    pub fn pass(pass: PassType, sample_rate: f64, frequency: f64) -> Self {
        // No usable band: leave the signal untouched
        if !sample_rate.is_finite() || sample_rate <= 4.0 {
            return Self::passthrough();
        }

        // Keep the corner strictly inside (0, Nyquist)
        let nyquist = sample_rate / 2.0;
        let max = (nyquist * 0.999).max(1.0);
        let freq = if frequency.is_finite() {
            frequency.clamp(1.0, max)
        } else {
            max
        };

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * FRAC_1_SQRT_2);

        let (b0, b1, b2) = match pass {
            PassType::LowPass => ((1.0 - cos_w0) / 2.0, 1.0 - cos_w0, (1.0 - cos_w0) / 2.0),
            PassType::HighPass => ((1.0 + cos_w0) / 2.0, -(1.0 + cos_w0), (1.0 + cos_w0) / 2.0),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Coefficients that pass the input through unchanged
    pub fn passthrough() -> Self {
        BiquadCoeffs {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

/// Filter history for one channel
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Process a single sample (Direct Form I)
    #[inline]
    pub fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Clear filter history
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
