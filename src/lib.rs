//! Chirpscope - review playback for bird detection recordings
//!
//! Every detection card on a dashboard page gets its own player. This crate
//! is the engine behind those players:
//! 1. A live-adjustable filter chain (high-pass, low-pass, gain, volume)
//!    that helps a reviewer pick a faint call out of noise
//! 2. A page-wide coordinator that keeps at most one player audible
//!
//! # Architecture
//!
//! - `dsp`: the signal graph and its stages
//! - `engine`: media elements, playback controllers, the coordinator and
//!   the parameter channel
//! - `config`: runtime settings shared by every player on a page

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;

pub use config::ReviewConfig;
pub use error::{ChirpError, Result};
