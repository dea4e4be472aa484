//! Serato crate files (`Subcrates/*.crate`)
//!
//! A crate lists its tracks as `ptrk` records nested inside `otrk` records,
//! surrounded by column and sorting records we don't need. Rather than walk
//! the record tree, the parser scans linearly for the `ptrk` marker:
//! - 4 bytes: `ptrk`
//! - 4 bytes: path length (u32, big-endian)
//! - N bytes: volume-relative path, UTF-16BE

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::record::write_record;
use crate::string::{decode_utf16be, encode_utf16be};

/// Marker preceding every track path
const START_MARKER: &[u8; 4] = b"ptrk";
/// Size of the path length field after the marker
const PATH_LENGTH_LEN: usize = 4;
/// Marker plus length field
const MARKER_FULL_LEN: usize = START_MARKER.len() + PATH_LENGTH_LEN;

/// Crate file extension
pub const CRATE_EXTENSION: &str = "crate";

/// Version string written by Serato into crate headers
const CRATE_VERSION: &str = "1.0/Serato ScratchLive Crate";

/// A crate file loaded into memory
#[derive(Debug, Clone)]
pub struct CrateFile {
    name: String,
    data: Vec<u8>,
}

impl CrateFile {
    /// Read a crate file; the playlist name comes from its file name
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Path(format!("crate path has no file name: {:?}", path)))?;
        let data = fs::read(path)?;
        Ok(Self::from_bytes(playlist_name(file_name), data))
    }

    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Playlist name derived from the crate file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Track paths in file order
    ///
    /// Every call starts a fresh scan over the same bytes.
    pub fn paths(&self) -> CratePaths<'_> {
        CratePaths::new(&self.data)
    }
}

/// Playlist name for a crate file name
///
/// Drops the `.crate` extension and turns Serato's `%%` subcrate separator
/// back into `/`.
pub fn playlist_name(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .filter(|(_, ext)| ext.eq_ignore_ascii_case(CRATE_EXTENSION))
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    stem.replace("%%", "/")
}

/// Lazy scan for `ptrk` records over a crate buffer
#[derive(Debug, Clone)]
pub struct CratePaths<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CratePaths<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl Iterator for CratePaths<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.data;

        // Strict bound: a marker whose length field ends exactly at EOF
        // could only carry an empty path, so it is never reported.
        while self.pos + MARKER_FULL_LEN < data.len() {
            if &data[self.pos..self.pos + START_MARKER.len()] != START_MARKER {
                self.pos += 1;
                continue;
            }

            let len_start = self.pos + START_MARKER.len();
            let path_len = u32::from_be_bytes([
                data[len_start],
                data[len_start + 1],
                data[len_start + 2],
                data[len_start + 3],
            ]) as usize;
            let path_start = len_start + PATH_LENGTH_LEN;
            let available = data.len() - path_start;

            if path_len > available {
                self.pos = data.len();
                return Some(Err(Error::Truncated {
                    offset: path_start,
                    needed: path_len,
                    available,
                }));
            }

            self.pos = path_start + path_len;
            return Some(decode_utf16be(&data[path_start..path_start + path_len]));
        }

        None
    }
}

/// Encode track paths as a crate file
///
/// Writes a `vrsn` header followed by one `otrk { ptrk }` record per path,
/// the layout Serato itself produces.
pub fn encode_crate_paths<S: AsRef<str>>(paths: &[S]) -> Vec<u8> {
    let mut buffer = Vec::new();
    write_record(&mut buffer, b"vrsn", &encode_utf16be(CRATE_VERSION));

    for path in paths {
        let mut track = Vec::new();
        write_record(&mut track, START_MARKER, &encode_utf16be(path.as_ref()));
        write_record(&mut buffer, b"otrk", &track);
    }

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn collect(data: &[u8]) -> Vec<String> {
        CratePaths::new(data).map(|p| p.unwrap()).collect()
    }

    #[test]
    fn test_round_trip() {
        let paths = vec![
            "Users/dj/Music/Intro.mp3",
            "Users/dj/Music/Björk - Army of Me.m4a",
            "Volumes/USB/日本語.mp3",
        ];

        let encoded = encode_crate_paths(&paths);
        assert_eq!(collect(&encoded), paths);
    }

    #[test]
    fn test_paths_is_restartable() {
        let crate_file = CrateFile::from_bytes("Test", encode_crate_paths(&["a.mp3", "b.mp3"]));

        let first: Vec<_> = crate_file.paths().map(|p| p.unwrap()).collect();
        let second: Vec<_> = crate_file.paths().map(|p| p.unwrap()).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_marker_at_unaligned_offset() {
        let mut data = vec![0xAA, 0xBB, 0xCC];
        data.extend_from_slice(b"ptrk");
        data.extend_from_slice(&4u32.to_be_bytes());
        data.extend_from_slice(&encode_utf16be("ab"));
        data.extend_from_slice(b"junk");

        assert_eq!(collect(&data), vec!["ab"]);
    }

    #[test]
    fn test_empty_and_short_buffers() {
        assert!(collect(&[]).is_empty());
        assert!(collect(b"ptrk").is_empty());
        assert!(collect(b"ptrk\x00\x00\x00").is_empty());
    }

    #[test]
    fn test_trailing_empty_path_not_reported() {
        // Marker + zero length ending exactly at EOF
        let mut data = encode_crate_paths(&["a.mp3"]);
        data.extend_from_slice(b"ptrk");
        data.extend_from_slice(&0u32.to_be_bytes());

        assert_eq!(collect(&data), vec!["a.mp3"]);
    }

    #[test]
    fn test_truncated_path_ends_scan() {
        let mut data = encode_crate_paths(&["a.mp3"]);
        data.extend_from_slice(b"ptrk");
        data.extend_from_slice(&200u32.to_be_bytes());
        data.extend_from_slice(&encode_utf16be("short"));

        let results: Vec<_> = CratePaths::new(&data).collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "a.mp3");
        assert!(matches!(results[1], Err(Error::Truncated { .. })));
    }

    #[test]
    fn test_invalid_utf16_does_not_stop_scan() {
        let mut data = Vec::new();
        data.extend_from_slice(b"ptrk");
        data.extend_from_slice(&3u32.to_be_bytes());
        data.extend_from_slice(&[0x00, b'a', 0x00]);
        data.extend_from_slice(&encode_crate_paths(&["b.mp3"]));

        let results: Vec<_> = CratePaths::new(&data).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap(), "b.mp3");
    }

    #[test]
    fn test_playlist_name() {
        assert_eq!(playlist_name("House.crate"), "House");
        assert_eq!(playlist_name("Genres%%Techno%%Peak.crate"), "Genres/Techno/Peak");
        assert_eq!(playlist_name("NoExtension"), "NoExtension");
    }

    #[test]
    fn test_playlist_name_extension_case() {
        assert_eq!(playlist_name("Techno.CRATE"), "Techno");
        assert_eq!(playlist_name("Deep%%Dub.Crate"), "Deep/Dub");
        assert_eq!(playlist_name("v1.2 Edits.crate"), "v1.2 Edits");
        assert_eq!(playlist_name("Notes.txt"), "Notes.txt");
    }

    #[test]
    fn test_open_from_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Sets%%Friday.crate");
        fs::write(&path, encode_crate_paths(&["x.mp3"])).unwrap();

        let crate_file = CrateFile::open(&path).unwrap();
        assert_eq!(crate_file.name(), "Sets/Friday");
        assert_eq!(crate_file.paths().count(), 1);
    }
}
