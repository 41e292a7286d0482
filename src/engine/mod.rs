//! Playback engine
//!
//! Everything that turns a recording into sound on a review page:
//! - Sample blocks and WAV decoding
//! - Host media element abstraction
//! - Per-player transport and controller
//! - The page-wide exclusivity coordinator and the parameter channel

pub mod buffer;
pub mod channel;
pub mod controller;
pub mod coordinator;
pub mod events;
pub mod io;
pub mod media;
pub mod source;
pub mod transport;

pub use buffer::{AudioBuffer, ChannelLayout};
pub use channel::{ParameterChange, ParameterChannel, ParameterSender};
pub use controller::{GraphStatus, PlaybackController, PlayerEnv};
pub use coordinator::{ExclusivityCoordinator, ExclusivityToken, SlotHolder};
pub use events::{EventSink, PlaybackFailure, PlayerEvent, PlayerEventKind, PlayerId};
pub use io::{decode_wav, generate_test_tone, read_source_bytes};
pub use media::{MediaElement, MediaEvent, StartRequest, WavMedia};
pub use source::AudioSource;
pub use transport::{PlaybackState, SeekOutcome, Transport};
