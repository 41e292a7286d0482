//! Filter parameters exposed to the reviewer
//!
//! Four independent scalars, one per stage of the signal graph. Values
//! outside a parameter's range are clamped to the nearest bound; non-finite
//! values are dropped and the previous value kept.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ChirpError;

/// High-pass corner frequency range in Hz
pub const HIGH_PASS_RANGE: (f64, f64) = (20.0, 5000.0);

/// Low-pass corner frequency range in Hz
pub const LOW_PASS_RANGE: (f64, f64) = (500.0, 20000.0);

/// Make-up gain range (linear multiplier)
pub const GAIN_RANGE: (f64, f64) = (0.0, 3.0);

/// Output volume range (linear multiplier)
pub const VOLUME_RANGE: (f64, f64) = (0.0, 1.0);

/// Identifies one adjustable parameter and, through it, one graph stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Corner frequency of the high-pass stage
    HighPassHz,
    /// Corner frequency of the low-pass stage
    LowPassHz,
    /// Make-up gain stage multiplier
    Gain,
    /// Output volume stage multiplier
    Volume,
}

impl ParameterKind {
    /// All parameters, in signal-flow order
    pub const ALL: [ParameterKind; 4] = [
        ParameterKind::HighPassHz,
        ParameterKind::LowPassHz,
        ParameterKind::Gain,
        ParameterKind::Volume,
    ];

    /// Inclusive (min, max) range
    pub fn range(self) -> (f64, f64) {
        match self {
            ParameterKind::HighPassHz => HIGH_PASS_RANGE,
            ParameterKind::LowPassHz => LOW_PASS_RANGE,
            ParameterKind::Gain => GAIN_RANGE,
            ParameterKind::Volume => VOLUME_RANGE,
        }
    }

    /// Clamp a raw value into range; `None` for NaN or infinities
    pub fn clamp(self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        let (min, max) = self.range();
        Some(value.clamp(min, max))
    }

    /// Stable snake_case name, as used in config files and on the CLI
    pub fn name(self) -> &'static str {
        match self {
            ParameterKind::HighPassHz => "high_pass_hz",
            ParameterKind::LowPassHz => "low_pass_hz",
            ParameterKind::Gain => "gain",
            ParameterKind::Volume => "volume",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParameterKind {
    type Err = ChirpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high_pass_hz" | "high-pass" | "highpass" => Ok(ParameterKind::HighPassHz),
            "low_pass_hz" | "low-pass" | "lowpass" => Ok(ParameterKind::LowPassHz),
            "gain" => Ok(ParameterKind::Gain),
            "volume" => Ok(ParameterKind::Volume),
            other => Err(ChirpError::Config {
                reason: format!("unknown filter parameter '{}'", other),
            }),
        }
    }
}

/// Current values of the four filter parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParameters {
    /// High-pass corner frequency in Hz (20-5000)
    pub high_pass_hz: f64,
    /// Low-pass corner frequency in Hz (500-20000)
    pub low_pass_hz: f64,
    /// Make-up gain, linear (0-3)
    pub gain: f64,
    /// Output volume, linear (0-1)
    pub volume: f64,
}

impl Default for FilterParameters {
    /// A flat chain: both corners at the edges of the audible band, unity gain
    fn default() -> Self {
        Self {
            high_pass_hz: HIGH_PASS_RANGE.0,
            low_pass_hz: LOW_PASS_RANGE.1,
            gain: 1.0,
            volume: 1.0,
        }
    }
}

impl FilterParameters {
    /// Read one parameter
    pub fn get(&self, kind: ParameterKind) -> f64 {
        match kind {
            ParameterKind::HighPassHz => self.high_pass_hz,
            ParameterKind::LowPassHz => self.low_pass_hz,
            ParameterKind::Gain => self.gain,
            ParameterKind::Volume => self.volume,
        }
    }

    /// Store one parameter after clamping and return the stored value
    ///
    /// Only the named field is touched.
    pub fn set(&mut self, kind: ParameterKind, value: f64) -> f64 {
        let Some(clamped) = kind.clamp(value) else {
            return self.get(kind);
        };
        let slot = match kind {
            ParameterKind::HighPassHz => &mut self.high_pass_hz,
            ParameterKind::LowPassHz => &mut self.low_pass_hz,
            ParameterKind::Gain => &mut self.gain,
            ParameterKind::Volume => &mut self.volume,
        };
        *slot = clamped;
        clamped
    }

    /// Copy with every field clamped; non-finite fields fall back to defaults
    pub fn sanitized(&self) -> Self {
        let mut out = Self::default();
        for kind in ParameterKind::ALL {
            out.set(kind, self.get(kind));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ParameterKind::LowPassHz, 100.0, 500.0 ; "low pass below range")]
    #[test_case(ParameterKind::LowPassHz, 48000.0, 20000.0 ; "low pass above range")]
    #[test_case(ParameterKind::HighPassHz, 0.0, 20.0 ; "high pass below range")]
    #[test_case(ParameterKind::HighPassHz, 9000.0, 5000.0 ; "high pass above range")]
    #[test_case(ParameterKind::Gain, -1.0, 0.0 ; "negative gain")]
    #[test_case(ParameterKind::Gain, 7.5, 3.0 ; "excess gain")]
    #[test_case(ParameterKind::Volume, 1.5, 1.0 ; "excess volume")]
    #[test_case(ParameterKind::Volume, 0.25, 0.25 ; "volume in range")]
    fn test_set_clamps_to_nearest_bound(kind: ParameterKind, input: f64, expected: f64) {
        let mut params = FilterParameters::default();
        assert_eq!(params.set(kind, input), expected);
        assert_eq!(params.get(kind), expected);
    }

    #[test]
    fn test_non_finite_keeps_previous_value() {
        let mut params = FilterParameters::default();
        params.set(ParameterKind::Gain, 2.0);
        assert_eq!(params.set(ParameterKind::Gain, f64::NAN), 2.0);
        assert_eq!(params.set(ParameterKind::Gain, f64::INFINITY), 2.0);
        assert_eq!(params.gain, 2.0);
    }

    #[test]
    fn test_gain_does_not_touch_other_fields() {
        let mut params = FilterParameters {
            high_pass_hz: 1200.0,
            low_pass_hz: 8000.0,
            gain: 1.0,
            volume: 0.6,
        };
        params.set(ParameterKind::Gain, 2.5);
        assert_eq!(params.high_pass_hz, 1200.0);
        assert_eq!(params.low_pass_hz, 8000.0);
        assert_eq!(params.volume, 0.6);
    }

    #[test]
    fn test_sanitized_clamps_config_values() {
        let raw = FilterParameters {
            high_pass_hz: 1.0,
            low_pass_hz: f64::NAN,
            gain: 10.0,
            volume: 0.5,
        };
        let clean = raw.sanitized();
        assert_eq!(clean.high_pass_hz, 20.0);
        assert_eq!(clean.low_pass_hz, 20000.0);
        assert_eq!(clean.gain, 3.0);
        assert_eq!(clean.volume, 0.5);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("low-pass".parse::<ParameterKind>().unwrap(), ParameterKind::LowPassHz);
        assert_eq!("volume".parse::<ParameterKind>().unwrap(), ParameterKind::Volume);
        assert!("treble".parse::<ParameterKind>().is_err());
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let params: FilterParameters = serde_json::from_str(r#"{"high_pass_hz": 900.0}"#).unwrap();
        assert_eq!(params.high_pass_hz, 900.0);
        assert_eq!(params.low_pass_hz, 20000.0);
        assert_eq!(params.gain, 1.0);
    }
}
