//! Host media element
//!
//! The media element is the host's player for one recording: it loads the
//! bytes, reports metadata, asks the host for permission to start output,
//! and hands out decoded blocks. Everything slow is asynchronous and comes
//! back as a [`MediaEvent`].

use std::collections::VecDeque;
use std::fmt;

use tracing::debug;

use crate::engine::buffer::{AudioBuffer, DEFAULT_SAMPLE_RATE};
use crate::engine::io::{decode_wav, read_source_bytes};
use crate::engine::source::AudioSource;
use crate::error::ChirpError;

/// Identifies one asynchronous start attempt
///
/// Only the most recent request of a player may produce sound; older ones
/// resolve into nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StartRequest(pub u64);

impl fmt::Display for StartRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "start#{}", self.0)
    }
}

/// Asynchronous notifications from the media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Total length became known
    MetadataLoaded { duration: f64 },
    /// Host allowed output for this request
    StartResolved { request: StartRequest },
    /// Host refused output for this request (e.g. autoplay policy)
    StartRejected { request: StartRequest, reason: String },
    /// The stream finished on its own
    Ended,
    /// Bytes could not be fetched
    LoadFailed { reason: String },
    /// Bytes could not be decoded
    DecodeFailed { reason: String },
}

/// A host media element bound to one player
pub trait MediaElement {
    /// Begin loading `source`; the outcome arrives as an event
    fn load(&mut self, source: &AudioSource);

    /// Ask the host to begin output; answered by `StartResolved`/`StartRejected`
    fn request_start(&mut self, request: StartRequest);

    /// Stop output immediately, keeping the position
    fn halt(&mut self);

    /// Move the read position (seconds, already clamped by the caller)
    fn seek(&mut self, position: f64);

    /// Current read position in seconds
    fn position(&self) -> f64;

    /// Fill `block` from the current position and advance
    ///
    /// Returns the number of frames written; fewer than `block.len()` means
    /// the stream ended inside this block.
    fn read(&mut self, block: &mut AudioBuffer) -> usize;

    /// Drop decoded data and any pending work
    fn unload(&mut self);

    /// Next self-reported event, for elements that queue their own
    fn poll_event(&mut self) -> Option<MediaEvent> {
        None
    }
}

enum Contents {
    Empty,
    Encoded(Vec<u8>),
    Decoded(AudioBuffer),
}

/// In-memory media element for WAV recordings
///
/// Loading and start permission complete immediately but are still reported
/// through the event queue, so callers see the same ordering as with a real
/// asynchronous host.
pub struct WavMedia {
    target_rate: u32,
    contents: Contents,
    cursor: usize,
    outputting: bool,
    autoplay_allowed: bool,
    events: VecDeque<MediaEvent>,
}

impl WavMedia {
    /// Media that reads the source address on `load`
    pub fn new(target_rate: u32) -> Self {
        Self {
            target_rate,
            contents: Contents::Empty,
            cursor: 0,
            outputting: false,
            autoplay_allowed: true,
            events: VecDeque::new(),
        }
    }

    /// Media with the encoded bytes already in hand
    pub fn from_bytes(bytes: Vec<u8>, target_rate: u32) -> Self {
        Self {
            contents: Contents::Encoded(bytes),
            ..Self::new(target_rate)
        }
    }

    /// Media over already-decoded samples
    pub fn from_buffer(buffer: AudioBuffer) -> Self {
        Self {
            target_rate: buffer.sample_rate,
            contents: Contents::Decoded(buffer),
            ..Self::new(DEFAULT_SAMPLE_RATE)
        }
    }

    /// Refuse start requests, as a browser blocking autoplay would
    pub fn with_autoplay_blocked(mut self) -> Self {
        self.autoplay_allowed = false;
        self
    }

    /// Whether output is currently running
    pub fn is_outputting(&self) -> bool {
        self.outputting
    }

    /// Events queued and not yet polled
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    fn decoded(&self) -> Option<&AudioBuffer> {
        match &self.contents {
            Contents::Decoded(buffer) => Some(buffer),
            _ => None,
        }
    }
}

impl MediaElement for WavMedia {
    fn load(&mut self, source: &AudioSource) {
        self.cursor = 0;
        self.outputting = false;

        // encoded bytes are kept until they decode, so a retry can reuse them
        let decoded = match &self.contents {
            Contents::Decoded(_) => Ok(None),
            Contents::Encoded(bytes) => decode_wav(bytes, self.target_rate).map(Some),
            Contents::Empty => read_source_bytes(source)
                .and_then(|bytes| decode_wav(&bytes, self.target_rate))
                .map(Some),
        };

        match decoded {
            Ok(Some(buffer)) => self.contents = Contents::Decoded(buffer),
            Ok(None) => {}
            Err(ChirpError::SourceLoadFailed { reason }) => {
                self.events.push_back(MediaEvent::LoadFailed { reason });
                return;
            }
            Err(err) => {
                self.events.push_back(MediaEvent::DecodeFailed {
                    reason: err.to_string(),
                });
                return;
            }
        }

        let duration = self.decoded().map(|b| b.duration_secs()).unwrap_or(0.0);
        debug!(source = %source.url(), duration, "media loaded");
        self.events.push_back(MediaEvent::MetadataLoaded { duration });
    }

    fn request_start(&mut self, request: StartRequest) {
        if self.autoplay_allowed {
            self.outputting = true;
            self.events.push_back(MediaEvent::StartResolved { request });
        } else {
            self.events.push_back(MediaEvent::StartRejected {
                request,
                reason: "playback requires a user gesture".to_string(),
            });
        }
    }

    fn halt(&mut self) {
        self.outputting = false;
    }

    fn seek(&mut self, position: f64) {
        if let Some(buffer) = self.decoded() {
            let frame = (position.max(0.0) * buffer.sample_rate as f64).round() as usize;
            self.cursor = frame.min(buffer.len());
        }
    }

    fn position(&self) -> f64 {
        match self.decoded() {
            Some(buffer) if buffer.sample_rate > 0 => {
                self.cursor as f64 / buffer.sample_rate as f64
            }
            _ => 0.0,
        }
    }

    fn read(&mut self, block: &mut AudioBuffer) -> usize {
        let Contents::Decoded(buffer) = &self.contents else {
            block.silence();
            return 0;
        };
        if !self.outputting {
            block.silence();
            return 0;
        }

        let available = buffer.len().saturating_sub(self.cursor);
        let frames = block.len().min(available);
        let source_channels = buffer.channels();

        for (ch, out) in block.samples.iter_mut().enumerate() {
            // mono sources feed every output channel
            let src = &buffer.samples[ch.min(source_channels - 1)];
            out[..frames].copy_from_slice(&src[self.cursor..self.cursor + frames]);
        }
        block.silence_from(frames);

        self.cursor += frames;
        frames
    }

    fn unload(&mut self) {
        self.contents = Contents::Empty;
        self.cursor = 0;
        self.outputting = false;
        self.events.clear();
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.events.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::ChannelLayout;
    use crate::engine::io::generate_test_tone;

    fn source() -> AudioSource {
        AudioSource::new("memory://tone", "tone.wav")
    }

    #[test]
    fn test_load_reports_metadata() {
        let mut media = WavMedia::from_buffer(generate_test_tone(440.0, 2.0, 8000));
        media.load(&source());
        assert_eq!(
            media.poll_event(),
            Some(MediaEvent::MetadataLoaded { duration: 2.0 })
        );
        assert_eq!(media.poll_event(), None);
    }

    #[test]
    fn test_read_is_silent_until_started() {
        let mut media = WavMedia::from_buffer(generate_test_tone(440.0, 1.0, 8000));
        media.load(&source());
        let mut block = AudioBuffer::new(256, ChannelLayout::Mono, 8000);
        assert_eq!(media.read(&mut block), 0);
        assert_eq!(block.peak(), 0.0);

        media.request_start(StartRequest(1));
        assert_eq!(media.read(&mut block), 256);
        assert!(block.peak() > 0.1);
    }

    #[test]
    fn test_short_read_at_end() {
        let mut media = WavMedia::from_buffer(generate_test_tone(440.0, 0.1, 8000));
        media.load(&source());
        media.request_start(StartRequest(1));
        media.seek(0.05);
        let mut block = AudioBuffer::new(1000, ChannelLayout::Mono, 8000);
        assert_eq!(media.read(&mut block), 400);
        assert!((media.position() - 0.1).abs() < 1e-9);
        assert!(block.channel(0)[400..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mono_fills_stereo_block() {
        let mut media = WavMedia::from_buffer(generate_test_tone(440.0, 0.5, 8000));
        media.load(&source());
        media.request_start(StartRequest(1));
        let mut block = AudioBuffer::new(64, ChannelLayout::Stereo, 8000);
        media.read(&mut block);
        assert_eq!(block.channel(0), block.channel(1));
    }

    #[test]
    fn test_blocked_autoplay_rejects() {
        let mut media =
            WavMedia::from_buffer(generate_test_tone(440.0, 0.5, 8000)).with_autoplay_blocked();
        media.load(&source());
        media.poll_event();
        media.request_start(StartRequest(7));
        assert!(matches!(
            media.poll_event(),
            Some(MediaEvent::StartRejected { request: StartRequest(7), .. })
        ));
        assert!(!media.is_outputting());
    }

    #[test]
    fn test_missing_file_reports_load_failure() {
        let mut media = WavMedia::new(48000);
        media.load(&AudioSource::new("/no/such/file.wav", "file.wav"));
        assert!(matches!(media.poll_event(), Some(MediaEvent::LoadFailed { .. })));
    }

    #[test]
    fn test_bad_bytes_report_decode_failure() {
        let mut media = WavMedia::from_bytes(b"RIFF....garbage".to_vec(), 48000);
        media.load(&source());
        assert!(matches!(media.poll_event(), Some(MediaEvent::DecodeFailed { .. })));
    }
}
