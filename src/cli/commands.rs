//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use crossbeam::channel::Receiver;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cli::FilterArgs;
use crate::config::ReviewConfig;
use crate::engine::buffer::linear_to_db;
use crate::engine::{
    read_source_bytes, AudioBuffer, AudioSource, ChannelLayout, EventSink,
    ExclusivityCoordinator, MediaElement, MediaEvent, PlaybackController, PlaybackState,
    PlayerEvent, WavMedia,
};
use crate::error::{ChirpError, Result};

/// Print source identity and stream properties of one recording.
pub fn inspect(path: &Path, config: &ReviewConfig) -> Result<()> {
    info!("Inspecting recording: {}", path.display());

    let source = AudioSource::from_path(path);
    let bytes = read_source_bytes(&source)?;
    let spec = hound::WavReader::new(Cursor::new(bytes.as_slice()))?.spec();

    let mut media = WavMedia::from_bytes(bytes, config.sample_rate);
    media.load(&source);
    let duration = match media.poll_event() {
        Some(MediaEvent::MetadataLoaded { duration }) => duration,
        Some(MediaEvent::LoadFailed { reason }) => {
            return Err(ChirpError::SourceLoadFailed { reason })
        }
        Some(MediaEvent::DecodeFailed { reason }) => {
            return Err(ChirpError::SourceDecodeFailed { reason })
        }
        _ => 0.0,
    };

    println!("Source:      {}", source);
    println!("Media type:  {}", source.media_type());
    println!("Duration:    {:.3} s", duration);
    println!("Sample rate: {} Hz", spec.sample_rate);
    println!("Channels:    {}", spec.channels);
    println!("Bit depth:   {}", spec.bits_per_sample);

    Ok(())
}

/// Expand files and directories into a sorted list of WAV recordings.
pub fn collect_recordings(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut recordings = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let is_wav = entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
            if entry.file_type().is_file() && is_wav {
                recordings.push(entry.into_path());
            }
        }
    }
    recordings.sort();
    recordings.dedup();
    recordings
}

/// Per-player outcome of a review run.
#[derive(Debug, Clone)]
pub struct ReviewSummary {
    pub filename: String,
    pub duration: Option<f64>,
    pub final_state: PlaybackState,
    pub peak_db: f32,
    pub blocks: usize,
}

/// Play every recording back-to-back on one page and log what happens.
pub fn review(paths: &[PathBuf], filters: &FilterArgs, config: &ReviewConfig) -> Result<()> {
    let recordings = collect_recordings(paths);
    if recordings.is_empty() {
        println!("No WAV recordings found.");
        return Ok(());
    }
    info!("Reviewing {} recording(s)", recordings.len());

    let summaries = run_review(&recordings, filters, config)?;

    println!("{:<32} {:>9} {:>9} {:>8}", "Recording", "Duration", "Peak", "State");
    println!("{:-<61}", "");
    for summary in &summaries {
        let duration = summary
            .duration
            .map(|d| format!("{:.2} s", d))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:>9} {:>6.1} dB {:>8}",
            summary.filename, duration, summary.peak_db, summary.final_state
        );
    }

    Ok(())
}

/// Drive one simulated review page over `recordings`.
///
/// Every recording gets its own player on a shared coordinator. Players are
/// started one after another; rendered audio goes nowhere.
pub fn run_review(
    recordings: &[PathBuf],
    filters: &FilterArgs,
    config: &ReviewConfig,
) -> Result<Vec<ReviewSummary>> {
    config.validate()?;

    let coordinator = ExclusivityCoordinator::new();
    let (sink, events) = EventSink::channel();
    let mut env = config.player_env(coordinator, sink);
    env.initial_filters = filters.apply(env.initial_filters);

    let players: Vec<PlaybackController> = recordings
        .iter()
        .map(|path| {
            PlaybackController::new(
                AudioSource::from_path(path),
                Box::new(WavMedia::new(config.sample_rate)),
                &env,
            )
        })
        .collect();

    for player in &players {
        player.pump();
    }
    log_events(&events)?;

    let mut block = AudioBuffer::new(config.block_size, ChannelLayout::Stereo, config.sample_rate);
    let mut summaries = Vec::with_capacity(players.len());

    for player in &players {
        player.play();
        player.pump();

        let mut peak = 0.0f32;
        let mut blocks = 0;
        while player.state() == PlaybackState::Playing && player.is_audible() {
            player.render(&mut block);
            peak = peak.max(block.peak());
            blocks += 1;
            player.pump();
            log_events(&events)?;
        }
        log_events(&events)?;

        summaries.push(ReviewSummary {
            filename: player.source().filename().to_string(),
            duration: player.duration(),
            final_state: player.state(),
            peak_db: linear_to_db(peak),
            blocks,
        });
    }

    for player in &players {
        player.destroy();
    }

    Ok(summaries)
}

fn log_events(events: &Receiver<PlayerEvent>) -> Result<()> {
    for event in events.try_iter() {
        info!(player = %event.player, "{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

/// Print the media URL for a detection recording.
pub fn print_url(
    base: &str,
    date: NaiveDate,
    species: &str,
    filename: &str,
    shifted: bool,
) -> Result<()> {
    let source = AudioSource::for_detection(base, date, species, filename, shifted)?;
    println!("{}", source.url());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_test_tone;
    use tempfile::TempDir;

    fn write_tone(path: &Path, seconds: f32) {
        let tone = generate_test_tone(880.0, seconds, 8000);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in tone.channel(0) {
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn config() -> ReviewConfig {
        ReviewConfig {
            sample_rate: 8000,
            block_size: 256,
            ..Default::default()
        }
    }

    #[test]
    fn test_collect_recordings_walks_directories() {
        let dir = TempDir::new().unwrap();
        write_tone(&dir.path().join("b.wav"), 0.1);
        write_tone(&dir.path().join("a.WAV"), 0.1);
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let found = collect_recordings(&[dir.path().to_path_buf()]);
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.WAV", "b.wav"]);
    }

    #[test]
    fn test_run_review_plays_everything_to_the_end() {
        let dir = TempDir::new().unwrap();
        write_tone(&dir.path().join("one.wav"), 0.25);
        write_tone(&dir.path().join("two.wav"), 0.5);

        let recordings = collect_recordings(&[dir.path().to_path_buf()]);
        let summaries = run_review(&recordings, &FilterArgs::default(), &config()).unwrap();

        assert_eq!(summaries.len(), 2);
        for summary in &summaries {
            assert_eq!(summary.final_state, PlaybackState::Ended);
            assert!(summary.peak_db > -12.0);
        }
        assert_eq!(summaries[1].duration, Some(0.5));
    }

    #[test]
    fn test_run_review_reports_broken_recording() {
        let dir = TempDir::new().unwrap();
        let broken = dir.path().join("broken.wav");
        std::fs::write(&broken, b"definitely not riff").unwrap();

        let summaries = run_review(&[broken], &FilterArgs::default(), &config()).unwrap();
        assert_eq!(summaries[0].final_state, PlaybackState::Idle);
        assert_eq!(summaries[0].blocks, 0);
    }

    #[test]
    fn test_inspect_missing_file_fails() {
        let err = inspect(Path::new("/no/such/recording.wav"), &config()).unwrap_err();
        assert_eq!(err.error_code(), "SOURCE_LOAD_FAILED");
    }
}
