//! CLI Module
//!
//! Command-line harness for the review engine.

pub mod commands;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::dsp::{FilterParameters, ParameterKind};

/// Chirpscope - review playback for bird detection recordings
#[derive(Parser, Debug)]
#[command(name = "chirpscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show what a player would learn about a recording
    #[command(name = "inspect")]
    Inspect {
        /// WAV recording
        file: PathBuf,
    },

    /// Play recordings back-to-back through review players
    #[command(name = "review")]
    Review {
        /// Recordings or directories of recordings
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Print the media URL of a detection recording
    #[command(name = "url")]
    Url {
        /// Dashboard base address
        #[arg(long, default_value = "http://localhost:8080")]
        base: String,

        /// Detection date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Scientific species name
        #[arg(long)]
        species: String,

        /// Recording filename
        #[arg(long)]
        filename: String,

        /// Use the pitch-shifted variant
        #[arg(long)]
        shifted: bool,
    },
}

/// Filter overrides for the review command
#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// High-pass corner in Hz
    #[arg(long)]
    pub high_pass: Option<f64>,

    /// Low-pass corner in Hz
    #[arg(long)]
    pub low_pass: Option<f64>,

    /// Make-up gain (linear)
    #[arg(long)]
    pub gain: Option<f64>,

    /// Output volume (0-1)
    #[arg(long)]
    pub volume: Option<f64>,
}

impl FilterArgs {
    /// Apply the given overrides on top of `base`, clamped
    pub fn apply(&self, base: FilterParameters) -> FilterParameters {
        let mut params = base;
        let overrides = [
            (ParameterKind::HighPassHz, self.high_pass),
            (ParameterKind::LowPassHz, self.low_pass),
            (ParameterKind::Gain, self.gain),
            (ParameterKind::Volume, self.volume),
        ];
        for (kind, value) in overrides {
            if let Some(value) = value {
                params.set(kind, value);
            }
        }
        params
    }
}
