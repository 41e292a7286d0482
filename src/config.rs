//! Runtime configuration
//!
//! Settings shared by every player on one review page. Stored as JSON;
//! missing fields fall back to the built-in defaults.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dsp::{FilterParameters, ProcessingContext, RealtimeContext};
use crate::engine::buffer::{DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE, MIN_SAMPLE_RATE};
use crate::engine::{EventSink, ExclusivityCoordinator, PlayerEnv};
use crate::error::{ChirpError, Result};

/// Review page settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Output sample rate; recordings are resampled to it
    pub sample_rate: u32,

    /// Frames per rendered block
    pub block_size: usize,

    /// Milliseconds of playback between time updates
    pub time_update_interval_ms: u64,

    /// Whether the host offers real-time processing (filters)
    pub realtime_processing: bool,

    /// Filter settings every new player starts with
    pub default_filters: FilterParameters,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            time_update_interval_ms: 250,
            realtime_processing: true,
            default_filters: FilterParameters::default(),
        }
    }
}

impl ReviewConfig {
    /// Read and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: ReviewConfig = serde_json::from_str(&text)?;
        config.validate()?;
        debug!(path = %path.display(), ?config, "config loaded");
        Ok(config)
    }

    /// Reject settings no player could run with
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < MIN_SAMPLE_RATE {
            return Err(ChirpError::Config {
                reason: format!("sample_rate must be at least {} Hz", MIN_SAMPLE_RATE),
            });
        }
        if self.block_size == 0 {
            return Err(ChirpError::Config {
                reason: "block_size must be greater than zero".to_string(),
            });
        }
        if self.time_update_interval_ms == 0 {
            return Err(ChirpError::Config {
                reason: "time_update_interval_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Time update cadence in seconds
    pub fn time_update_interval(&self) -> f64 {
        self.time_update_interval_ms as f64 / 1000.0
    }

    /// Processing context matching `realtime_processing`
    pub fn processing_context(&self) -> RealtimeContext {
        if self.realtime_processing {
            RealtimeContext::new(self.sample_rate as f64)
        } else {
            RealtimeContext::unavailable()
        }
    }

    /// Surroundings for players mounted on one page
    pub fn player_env(&self, coordinator: ExclusivityCoordinator, events: EventSink) -> PlayerEnv {
        let context: Rc<dyn ProcessingContext> = Rc::new(self.processing_context());
        PlayerEnv {
            coordinator,
            context,
            events,
            time_update_interval: self.time_update_interval(),
            initial_filters: self.default_filters.sanitized(),
        }
    }
}
