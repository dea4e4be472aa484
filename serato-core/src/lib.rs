//! serato-core: Serato DJ library decoding and Rekordbox XML output
//!
//! This crate provides:
//! - crate files and `database V2` (big-endian tagged records)
//! - Serato Markers2 hot cues (base64 blob inside ID3 / MP4 tags)
//! - key notation cleanup and Camelot conversion
//! - reconciliation into playlists and Rekordbox XML generation
//!
//! Reading the audio tag containers is left to a [`TagReader`].

pub mod crate_file;
pub mod database;
pub mod error;
pub mod key;
pub mod markers;
pub mod reconcile;
pub mod record;
pub mod rekordbox;
pub mod string;
pub mod track;

pub use crate_file::CrateFile;
pub use database::{Database, FieldCode, FieldSet};
pub use error::{Error, Result};
pub use key::{MusicalKey, Notation};
pub use reconcile::{AudioTags, ConversionBuilder, Reconciler, TagReader};
pub use rekordbox::{to_xml_string, write_xml, XmlOptions};
pub use track::{AudioFormat, ConversionResult, CueColor, FailedTrack, HotCue, Playlist, TrackRecord};
