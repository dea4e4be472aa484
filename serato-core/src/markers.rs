//! Serato Markers2 hot cue decoding
//!
//! Serato writes cue points as a base64 text blob into the audio file's tags:
//! - MP3: `GEOB` frame described `Serato Markers2`
//! - M4A: freeform atom `----:com.serato:markersv2` (older) or
//!   `----:com.serato.dj:markersv2`
//!
//! The decoded payload is a run of entries:
//! - NUL-terminated ASCII type (`COLOR`, `CUE`, `BPMLOCK`, ...)
//! - 4 bytes: payload length (u32, big-endian)
//! - N bytes: payload
//!
//! `CUE` payload:
//! - byte 1: hot cue index
//! - bytes 2-5: position in milliseconds (u32, big-endian)
//! - bytes 7-9: RGB color
//! - bytes 12..: UTF-8 name with a trailing NUL (absent in a 12-byte payload)

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use binrw::{binrw, BinReaderExt};
use tracing::{debug, warn};

use crate::error::Result;
use crate::track::{CueColor, HotCue};

/// `GEOB` description of the Markers2 frame
pub const MARKERS2_GEOB_DESCRIPTION: &str = "Serato Markers2";

/// MP4 freeform atoms holding Markers2, as (mean, name), in lookup order
pub const MARKERS2_MP4_ATOMS: [(&str, &str); 2] = [
    ("com.serato", "markersv2"),
    ("com.serato.dj", "markersv2"),
];

/// Entry type carrying a hot cue
const CUE_ENTRY: &[u8] = b"CUE";

/// Base64 digit for value zero; Serato pads with it instead of `=`
const ZERO_DIGIT: u8 = b'A';

/// Offset of the cue name inside a `CUE` payload
const CUE_NAME_OFFSET: usize = 12;

/// Fixed head of a `CUE` payload
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy)]
struct CueHead {
    #[brw(pad_before = 1)]
    index: u8,
    position_ms: u32,
    #[brw(pad_before = 1)]
    color: [u8; 3],
}

/// Decode a raw Markers2 tag value into hot cues
///
/// Base64 failures are logged and yield no cues. `track` is only used in
/// diagnostics.
pub fn decode_markers(raw: &[u8], track: &str) -> Vec<HotCue> {
    let data = match decode_base64(raw) {
        Ok(data) => data,
        Err(e) => {
            warn!("Error decoding Markers2 base64 for {}: {}", track, e);
            return Vec::new();
        }
    };

    let cues = parse_entries(&data);
    debug!("Decoded {} hot cues for {}", cues.len(), track);
    cues
}

/// Decode a Markers2 tag value after [`clean_base64`]
pub fn decode_base64(raw: &[u8]) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(clean_base64(raw))?)
}

/// Strip non-base64 bytes and zero-pad to a multiple of four
pub fn clean_base64(raw: &[u8]) -> Vec<u8> {
    let mut cleaned: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
        .collect();

    let remainder = cleaned.len() % 4;
    if remainder != 0 {
        cleaned.resize(cleaned.len() + 4 - remainder, ZERO_DIGIT);
    }

    cleaned
}

/// Collect hot cues from decoded Markers2 bytes
///
/// A malformed entry ends the scan; cues before it are kept.
pub fn parse_entries(data: &[u8]) -> Vec<HotCue> {
    let mut cues = Vec::new();

    for entry in MarkerEntries::new(data) {
        if entry.kind != CUE_ENTRY {
            continue;
        }
        match parse_cue(entry.payload) {
            Some(cue) => cues.push(cue),
            None => {
                debug!("Short CUE entry ({} bytes), stopping", entry.payload.len());
                break;
            }
        }
    }

    cues
}

/// One Markers2 entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerEntry<'a> {
    pub kind: &'a [u8],
    pub payload: &'a [u8],
}

/// Single pass over Markers2 entries
#[derive(Debug)]
pub struct MarkerEntries<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MarkerEntries<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn finish(&mut self) -> Option<MarkerEntry<'a>> {
        self.pos = self.data.len();
        None
    }
}

impl<'a> Iterator for MarkerEntries<'a> {
    type Item = MarkerEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.data[self.pos..];
        if rest.is_empty() {
            return None;
        }

        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            debug!("Markers2 entry without terminator at offset {}", self.pos);
            return self.finish();
        };
        let kind = &rest[..nul];

        let len_start = nul + 1;
        if len_start + 4 > rest.len() {
            return self.finish();
        }
        let len = u32::from_be_bytes([
            rest[len_start],
            rest[len_start + 1],
            rest[len_start + 2],
            rest[len_start + 3],
        ]) as usize;

        let payload_start = len_start + 4;
        if len > rest.len() - payload_start {
            debug!(
                "Markers2 entry {:?} overruns buffer at offset {}",
                String::from_utf8_lossy(kind),
                self.pos
            );
            return self.finish();
        }

        self.pos += payload_start + len;
        Some(MarkerEntry {
            kind,
            payload: &rest[payload_start..payload_start + len],
        })
    }
}

fn parse_cue(payload: &[u8]) -> Option<HotCue> {
    if payload.len() < CUE_NAME_OFFSET {
        return None;
    }

    let head: CueHead = Cursor::new(payload).read_be().ok()?;
    // Name runs up to the trailing NUL; a bare 12-byte head has no name
    let name_end = (payload.len() - 1).max(CUE_NAME_OFFSET);
    let name_bytes = &payload[CUE_NAME_OFFSET..name_end];

    Some(HotCue {
        name: String::from_utf8_lossy(name_bytes).into_owned(),
        index: head.index,
        position_ms: head.position_ms,
        color: CueColor::new(head.color[0], head.color[1], head.color[2]),
    })
}
