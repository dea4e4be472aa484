//! Converted track and playlist structures
//!
//! These are the reconciled records that get written to Rekordbox XML.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::key::MusicalKey;

/// Placeholder for tracks without a title
pub const UNKNOWN_TITLE: &str = "Unknown Title";
/// Placeholder for tracks without an artist
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Audio container, chosen by file extension
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum AudioFormat {
    /// ID3-tagged MPEG audio
    Mp3,
    /// MP4 container with iTunes-style atoms
    M4a,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" => Some(AudioFormat::M4a),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Rekordbox `Kind` attribute
    pub fn kind(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "MP3 File",
            AudioFormat::M4a => "M4A File",
        }
    }
}

/// Hot cue color
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct CueColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl CueColor {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// `#RRGGBB`
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

/// Hot cue decoded from Serato Markers2
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HotCue {
    /// Cue label, may be empty
    pub name: String,
    /// Hot cue slot, 0-based
    pub index: u8,
    /// Position from track start in milliseconds
    pub position_ms: u32,
    pub color: CueColor,
}

impl HotCue {
    /// Position in seconds
    pub fn start_secs(&self) -> f64 {
        self.position_ms as f64 / 1000.0
    }
}

/// One crate entry after reconciliation
#[derive(Debug, Clone, Serialize)]
pub struct TrackRecord {
    /// Volume-relative path as stored in the crate
    pub path: String,
    /// Absolute location on disk
    pub location: PathBuf,
    pub title: String,
    pub artist: String,
    /// Duration in whole seconds
    pub duration_secs: u32,
    pub format: AudioFormat,
    /// Key from the Serato database, if known
    pub key: Option<MusicalKey>,
    /// Hot cues in Markers2 order
    pub cues: Vec<HotCue>,
}

/// Playlist built from one crate
#[derive(Debug, Clone, Serialize)]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<TrackRecord>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: Vec::new(),
        }
    }
}

/// A crate entry that could not be converted
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailedTrack {
    /// Resolved path, or the crate name when the path itself was unreadable
    pub path: String,
    pub reason: String,
}

/// Everything produced by one conversion run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionResult {
    pub playlists: Vec<Playlist>,
    pub failed: Vec<FailedTrack>,
}

impl ConversionResult {
    /// Tracks across all playlists
    pub fn track_count(&self) -> usize {
        self.playlists.iter().map(|p| p.tracks.len()).sum()
    }

    /// Write the result as pretty JSON
    pub fn write_report<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
