//! Track reconciliation
//!
//! Merges the three Serato sources into one record per crate entry:
//! - crate file: which tracks, in which order
//! - audio file tags: title, artist, duration, Markers2 cue blob
//! - `database V2`: musical key (and title/artist when tags lack them)
//!
//! A failing track is recorded and skipped; it never stops the batch.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::crate_file::CrateFile;
use crate::database::{Database, FieldCode};
use crate::error::{Error, Result};
use crate::key::MusicalKey;
use crate::markers::decode_markers;
use crate::track::{
    AudioFormat, ConversionResult, FailedTrack, Playlist, TrackRecord, UNKNOWN_ARTIST,
    UNKNOWN_TITLE,
};

/// Metadata read from an audio file's own tags
#[derive(Debug, Clone, Default)]
pub struct AudioTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration: Duration,
    /// Raw Markers2 tag value, if present
    pub markers: Option<Vec<u8>>,
}

/// Reads tags from audio files
///
/// Implementations pick the container reader for `format`; the M4A reader
/// is expected to try each of [`crate::markers::MARKERS2_MP4_ATOMS`] in order.
pub trait TagReader {
    fn read_tags(&self, path: &Path, format: AudioFormat) -> Result<AudioTags>;
}

/// Accumulates playlists and failures during a run
#[derive(Debug, Default)]
pub struct ConversionBuilder {
    playlists: Vec<Playlist>,
    failed: Vec<FailedTrack>,
}

impl ConversionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Playlist with the given name, created at the end if missing
    pub fn playlist_mut(&mut self, name: &str) -> &mut Playlist {
        let idx = match self.playlists.iter().position(|p| p.name == name) {
            Some(idx) => idx,
            None => {
                self.playlists.push(Playlist::new(name));
                self.playlists.len() - 1
            }
        };
        &mut self.playlists[idx]
    }

    pub fn push_track(&mut self, playlist: &str, track: TrackRecord) {
        self.playlist_mut(playlist).tracks.push(track);
    }

    pub fn push_failure(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(FailedTrack {
            path: path.into(),
            reason: reason.into(),
        });
    }

    pub fn finish(self) -> ConversionResult {
        ConversionResult {
            playlists: self.playlists,
            failed: self.failed,
        }
    }
}

/// Builds track records from crates, the database and a tag reader
pub struct Reconciler<'a, R> {
    database: &'a Database,
    tags: &'a R,
    volume_root: &'a Path,
}

impl<'a, R: TagReader> Reconciler<'a, R> {
    pub fn new(database: &'a Database, tags: &'a R, volume_root: &'a Path) -> Self {
        Self {
            database,
            tags,
            volume_root,
        }
    }

    /// Convert crates in order
    pub fn convert<I>(&self, crates: I) -> ConversionResult
    where
        I: IntoIterator<Item = CrateFile>,
    {
        let mut builder = ConversionBuilder::new();
        for crate_file in crates {
            self.add_crate(&crate_file, &mut builder);
        }
        builder.finish()
    }

    /// Reconcile every track of one crate into `builder`
    pub fn add_crate(&self, crate_file: &CrateFile, builder: &mut ConversionBuilder) {
        let name = crate_file.name();
        info!("Converting: {}", name);
        builder.playlist_mut(name);

        for (entry, path) in crate_file.paths().enumerate() {
            let path = match path {
                Ok(path) => path,
                Err(e) => {
                    warn!("Unreadable path in crate {} (entry {}): {}", name, entry, e);
                    builder.push_failure(format!("{} (crate entry {})", name, entry), e.to_string());
                    continue;
                }
            };

            match self.reconcile_track(&path) {
                Ok(track) => builder.push_track(name, track),
                Err(e) => {
                    let location = self.resolve(&path);
                    warn!("Failed to convert {:?}: {}", location, e);
                    builder.push_failure(location.display().to_string(), e.to_string());
                }
            }
        }
    }

    /// Build the record for one crate path
    pub fn reconcile_track(&self, path: &str) -> Result<TrackRecord> {
        let location = self.resolve(path);
        let format = AudioFormat::from_path(&location).ok_or_else(|| {
            Error::UnsupportedFormat(
                location
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("no extension")
                    .to_string(),
            )
        })?;

        let tags = self.tags.read_tags(&location, format)?;
        let location_str = location.display().to_string();

        let cues = tags
            .markers
            .as_deref()
            .map(|raw| decode_markers(raw, &location_str))
            .unwrap_or_default();

        let title = non_empty(tags.title)
            .or_else(|| self.database.text_for(path, FieldCode::Title))
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let artist = non_empty(tags.artist)
            .or_else(|| self.database.text_for(path, FieldCode::Artist))
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        let key = self.lookup_key(path);
        debug!("{}: {} cues, key {:?}", path, cues.len(), key.as_ref().map(|k| k.as_str()));

        Ok(TrackRecord {
            path: path.to_string(),
            location,
            title,
            artist,
            duration_secs: tags.duration.as_secs_f64().round() as u32,
            format,
            key,
            cues,
        })
    }

    /// Absolute location of a volume-relative path
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.volume_root.join(path)
    }

    /// Key for a crate path, if the database has a usable one
    fn lookup_key(&self, path: &str) -> Option<MusicalKey> {
        let key = MusicalKey::parse(&self.database.key_for(path)?);
        if key.is_empty() {
            return None;
        }
        match key.to_camelot() {
            Ok(_) => Some(key),
            Err(e) => {
                warn!("Ignoring key {} for {}: {}", key, path, e);
                None
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
