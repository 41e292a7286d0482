//! Audio source identity
//!
//! A source is the address of one recording plus the filename shown to the
//! reviewer. The engine never interprets the address beyond handing it to
//! the media element.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{ChirpError, Result};

/// Addressable recording played by one player
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioSource {
    url: String,
    filename: String,
}

impl AudioSource {
    /// Create a source from a URL (or path) and a display filename
    pub fn new(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: filename.into(),
        }
    }

    /// Create a source for a local recording
    pub fn from_path(path: &Path) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(path.display().to_string(), filename)
    }

    /// Build the dashboard media URL for a detection recording
    ///
    /// Produces `{base}/api/media/audio/{date}/{Species_Name}/{filename}`.
    ///
    /// # Example
    /// ```
    /// use chirpscope::engine::AudioSource;
    /// use chrono::NaiveDate;
    ///
    /// let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
    /// let source = AudioSource::for_detection(
    ///     "http://birdnet.local", date, "Turdus merula", "blackbird.mp3", false,
    /// ).unwrap();
    /// assert_eq!(
    ///     source.url(),
    ///     "http://birdnet.local/api/media/audio/2024-05-17/Turdus_merula/blackbird.mp3"
    /// );
    /// ```
    ///
    /// # Errors
    /// * `InvalidSource` - a segment would escape its directory
    pub fn for_detection(
        base: &str,
        date: NaiveDate,
        scientific_name: &str,
        filename: &str,
        shifted: bool,
    ) -> Result<Self> {
        let species = scientific_name.trim().replace(' ', "_");
        check_segment("species", &species)?;
        check_segment("filename", filename)?;

        let kind = if shifted { "shifted" } else { "audio" };
        let url = format!(
            "{}/api/media/{}/{}/{}/{}",
            base.trim_end_matches('/'),
            kind,
            date.format("%Y-%m-%d"),
            species,
            filename
        );
        Ok(Self::new(url, filename))
    }

    /// Stream address
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Filename shown next to the player
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Whether the address points at an HTTP(S) server
    pub fn is_remote(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    /// MIME type inferred from the filename extension
    pub fn media_type(&self) -> &'static str {
        let ext = Path::new(&self.filename)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("mp3") => "audio/mpeg",
            Some("ogg") => "audio/ogg",
            Some("flac") => "audio/flac",
            _ => "audio/wav",
        }
    }
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.filename, self.url)
    }
}

fn check_segment(what: &str, segment: &str) -> Result<()> {
    if segment.is_empty()
        || segment == "."
        || segment.contains("..")
        || segment.contains('/')
        || segment.contains('\\')
    {
        return Err(ChirpError::InvalidSource {
            reason: format!("{} segment '{}' is not a plain name", what, segment),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
    }

    #[test]
    fn test_detection_url() {
        let source = AudioSource::for_detection(
            "http://birdnet.local/",
            date(),
            "Erithacus rubecula",
            "robin-87.wav",
            false,
        )
        .unwrap();
        assert_eq!(
            source.url(),
            "http://birdnet.local/api/media/audio/2024-05-17/Erithacus_rubecula/robin-87.wav"
        );
        assert_eq!(source.filename(), "robin-87.wav");
        assert!(source.is_remote());
    }

    #[test]
    fn test_shifted_url() {
        let source =
            AudioSource::for_detection("", date(), "Strix aluco", "owl.mp3", true).unwrap();
        assert_eq!(
            source.url(),
            "/api/media/shifted/2024-05-17/Strix_aluco/owl.mp3"
        );
    }

    #[test]
    fn test_traversal_rejected() {
        let err = AudioSource::for_detection("", date(), "Strix aluco", "../secrets", false)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SOURCE");
        assert!(AudioSource::for_detection("", date(), "a/b", "x.wav", false).is_err());
    }

    #[test]
    fn test_media_type_from_extension() {
        assert_eq!(AudioSource::new("u", "a.MP3").media_type(), "audio/mpeg");
        assert_eq!(AudioSource::new("u", "a.ogg").media_type(), "audio/ogg");
        assert_eq!(AudioSource::new("u", "a.flac").media_type(), "audio/flac");
        assert_eq!(AudioSource::new("u", "a.wav").media_type(), "audio/wav");
        assert_eq!(AudioSource::new("u", "noext").media_type(), "audio/wav");
    }

    #[test]
    fn test_from_path() {
        let source = AudioSource::from_path(Path::new("/data/2024-05-17/call.wav"));
        assert_eq!(source.filename(), "call.wav");
        assert!(!source.is_remote());
    }
}
