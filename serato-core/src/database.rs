//! Serato library database (`_Serato_/database V2`)
//!
//! Layout (all lengths u32 big-endian):
//! - `vrsn` header record (format version, UTF-16BE, not interpreted)
//! - `otrk` records, one per track, whose value is a run of field records
//!
//! Field values of interest are UTF-16BE strings:
//! - `pfil`: volume-relative file path (the lookup key)
//! - `tkey`: musical key as typed or analyzed in Serato
//! - `tsng` / `tart`: title / artist, used when the audio file has no tags
//!
//! Anything after the track records that is not an `otrk` ends the scan.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record::{RecordReader, HEADER_LEN};
use crate::string::decode_utf16be;

/// Database file name inside the Serato library folder
pub const DATABASE_FILE_NAME: &str = "database V2";

/// Track record tag
const TRACK_TAG: &[u8; 4] = b"otrk";

/// Field codes found inside `otrk` records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCode {
    /// `pfil`
    FilePath,
    /// `tkey`
    Key,
    /// `tsng`
    Title,
    /// `tart`
    Artist,
    /// Any field we carry along without interpreting
    Unknown([u8; 4]),
}

impl FieldCode {
    pub fn from_tag(tag: [u8; 4]) -> Self {
        match &tag {
            b"pfil" => FieldCode::FilePath,
            b"tkey" => FieldCode::Key,
            b"tsng" => FieldCode::Title,
            b"tart" => FieldCode::Artist,
            _ => FieldCode::Unknown(tag),
        }
    }

    pub fn tag(&self) -> [u8; 4] {
        match self {
            FieldCode::FilePath => *b"pfil",
            FieldCode::Key => *b"tkey",
            FieldCode::Title => *b"tsng",
            FieldCode::Artist => *b"tart",
            FieldCode::Unknown(tag) => *tag,
        }
    }
}

/// Fields of a single track record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    fields: HashMap<FieldCode, Vec<u8>>,
}

impl FieldSet {
    /// Insert a field; a repeated code replaces the earlier value
    pub fn insert(&mut self, code: FieldCode, value: Vec<u8>) {
        self.fields.insert(code, value);
    }

    /// Raw field value
    pub fn get(&self, code: FieldCode) -> Option<&[u8]> {
        self.fields.get(&code).map(Vec::as_slice)
    }

    /// Field value decoded as UTF-16BE text
    pub fn text(&self, code: FieldCode) -> Result<Option<String>> {
        self.get(code).map(decode_utf16be).transpose()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Track fields indexed by volume-relative path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Database {
    tracks: HashMap<String, FieldSet>,
}

impl Database {
    /// Read and parse a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path.as_ref())?;
        Self::parse(&data)
    }

    /// Parse database bytes
    ///
    /// Only a missing or truncated header is an error. A damaged track
    /// record is logged and skipped.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = RecordReader::new(data);

        if data.len() < HEADER_LEN {
            return Err(Error::Database(format!(
                "file too short for header: {} bytes",
                data.len()
            )));
        }
        let header_len = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
        reader.advance(HEADER_LEN)?;
        reader
            .advance(header_len)
            .map_err(|e| Error::Database(format!("truncated header: {}", e)))?;

        if let Ok(version) = decode_utf16be(&data[HEADER_LEN..HEADER_LEN + header_len]) {
            debug!("Database version: {}", version);
        }

        let mut tracks = HashMap::new();
        let mut skipped = 0usize;

        while reader.remaining() >= HEADER_LEN {
            let offset = reader.position();
            let header = match reader.peek_header() {
                Ok(header) => header,
                Err(e) => {
                    debug!("Stopping database scan at offset {}: {}", offset, e);
                    break;
                }
            };

            if &header.tag != TRACK_TAG {
                debug!(
                    "Stopping database scan at non-track record {:?} (offset {})",
                    String::from_utf8_lossy(&header.tag),
                    offset
                );
                break;
            }

            let record = match reader.read_record() {
                Ok(record) => record,
                Err(e) => {
                    warn!("Truncated track record at offset {}: {}", offset, e);
                    skipped += 1;
                    break;
                }
            };

            match parse_track(record.value) {
                Ok(fields) => match fields.text(FieldCode::FilePath) {
                    Ok(Some(path)) => {
                        tracks.insert(path, fields);
                    }
                    Ok(None) => {
                        debug!("Track record at offset {} has no path", offset);
                        skipped += 1;
                    }
                    Err(e) => {
                        warn!("Track record at offset {} has an unreadable path: {}", offset, e);
                        skipped += 1;
                    }
                },
                Err(e) => {
                    warn!("Skipping malformed track record at offset {}: {}", offset, e);
                    skipped += 1;
                }
            }
        }

        debug!("Database parsed: {} tracks, {} records skipped", tracks.len(), skipped);

        Ok(Self { tracks })
    }

    /// Fields for a volume-relative path
    pub fn get(&self, path: &str) -> Option<&FieldSet> {
        self.tracks.get(path)
    }

    /// Raw key text for a path, if the database has one
    pub fn key_for(&self, path: &str) -> Option<String> {
        self.text_for(path, FieldCode::Key)
    }

    /// Decoded text field for a path; unreadable values count as absent
    pub fn text_for(&self, path: &str, code: FieldCode) -> Option<String> {
        match self.get(path)?.text(code) {
            Ok(text) => text,
            Err(e) => {
                debug!("Unreadable {:?} field for {}: {}", code, path, e);
                None
            }
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.tracks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Collect the field records of one `otrk` value
///
/// The fields must tile the value exactly; an overrun or corrupt tag fails
/// the whole record.
fn parse_track(value: &[u8]) -> Result<FieldSet> {
    let mut fields = FieldSet::default();
    for record in RecordReader::new(value) {
        let record = record?;
        fields.insert(FieldCode::from_tag(record.tag), record.value.to_vec());
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::write_record;
    use crate::string::encode_utf16be;
    use tempfile::TempDir;

    fn header() -> Vec<u8> {
        let mut data = Vec::new();
        write_record(&mut data, b"vrsn", &encode_utf16be("2.0/Serato Scratch LIVE Database"));
        data
    }

    fn track(fields: &[(&[u8; 4], &str)]) -> Vec<u8> {
        let mut value = Vec::new();
        for (tag, text) in fields {
            write_record(&mut value, tag, &encode_utf16be(text));
        }
        let mut record = Vec::new();
        write_record(&mut record, b"otrk", &value);
        record
    }

    #[test]
    fn test_parse_tracks() {
        let mut data = header();
        data.extend(track(&[(b"pfil", "Music/a.mp3"), (b"tkey", "Am")]));
        data.extend(track(&[(b"pfil", "Music/b.m4a"), (b"tkey", "8B"), (b"tbpm", "128")]));

        let db = Database::parse(&data).unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.key_for("Music/a.mp3").as_deref(), Some("Am"));
        assert_eq!(db.key_for("Music/b.m4a").as_deref(), Some("8B"));

        let fields = db.get("Music/b.m4a").unwrap();
        assert_eq!(fields.len(), 3);
        assert!(fields.get(FieldCode::Unknown(*b"tbpm")).is_some());
    }

    #[test]
    fn test_lookup_miss() {
        let mut data = header();
        data.extend(track(&[(b"pfil", "Music/a.mp3")]));

        let db = Database::parse(&data).unwrap();
        assert!(db.get("Music/missing.mp3").is_none());
        assert!(db.key_for("Music/missing.mp3").is_none());
        assert!(db.key_for("Music/a.mp3").is_none());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let mut data = header();
        data.extend(track(&[(b"pfil", "a.mp3"), (b"tkey", "C")]));
        data.extend(track(&[(b"pfil", "b.mp3"), (b"tsng", "Song")]));

        let first = Database::parse(&data).unwrap();
        let second = Database::parse(&data).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_path_last_wins() {
        let mut data = header();
        data.extend(track(&[(b"pfil", "a.mp3"), (b"tkey", "C")]));
        data.extend(track(&[(b"pfil", "a.mp3"), (b"tkey", "Dm")]));

        let db = Database::parse(&data).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.key_for("a.mp3").as_deref(), Some("Dm"));
    }

    #[test]
    fn test_duplicate_field_last_wins() {
        let mut data = header();
        data.extend(track(&[(b"pfil", "a.mp3"), (b"tkey", "C"), (b"tkey", "G")]));

        let db = Database::parse(&data).unwrap();
        assert_eq!(db.key_for("a.mp3").as_deref(), Some("G"));
    }

    #[test]
    fn test_truncated_record_skipped() {
        // First record declares a field longer than the record itself
        let mut broken = Vec::new();
        write_record(&mut broken, b"pfil", &encode_utf16be("broken.mp3"));
        broken.extend_from_slice(b"tkey");
        broken.extend_from_slice(&64u32.to_be_bytes());
        broken.extend_from_slice(&encode_utf16be("Am"));

        let mut data = header();
        write_record(&mut data, b"otrk", &broken);
        data.extend(track(&[(b"pfil", "good.mp3"), (b"tkey", "Em")]));

        let db = Database::parse(&data).unwrap();
        assert_eq!(db.len(), 1);
        assert!(db.get("broken.mp3").is_none());
        assert_eq!(db.key_for("good.mp3").as_deref(), Some("Em"));
    }

    #[test]
    fn test_record_overrunning_file_ends_scan() {
        let mut data = header();
        data.extend(track(&[(b"pfil", "good.mp3")]));
        data.extend_from_slice(b"otrk");
        data.extend_from_slice(&1000u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 16]);

        let db = Database::parse(&data).unwrap();
        assert_eq!(db.len(), 1);
        assert!(db.get("good.mp3").is_some());
    }

    #[test]
    fn test_non_track_record_ends_scan() {
        let mut data = header();
        data.extend(track(&[(b"pfil", "a.mp3")]));
        write_record(&mut data, b"osrt", b"whatever");
        data.extend(track(&[(b"pfil", "after.mp3")]));

        let db = Database::parse(&data).unwrap();
        assert_eq!(db.len(), 1);
        assert!(db.get("after.mp3").is_none());
    }

    #[test]
    fn test_record_without_path_skipped() {
        let mut data = header();
        data.extend(track(&[(b"tkey", "Am")]));
        data.extend(track(&[(b"pfil", "a.mp3")]));

        let db = Database::parse(&data).unwrap();
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_header_only() {
        let db = Database::parse(&header()).unwrap();
        assert!(db.is_empty());
    }

    #[test]
    fn test_short_header_is_error() {
        assert!(matches!(Database::parse(b"vrsn"), Err(Error::Database(_))));

        let mut data = Vec::new();
        data.extend_from_slice(b"vrsn");
        data.extend_from_slice(&100u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 10]);
        assert!(matches!(Database::parse(&data), Err(Error::Database(_))));
    }

    #[test]
    fn test_open_missing_file() {
        let tmp = TempDir::new().unwrap();
        let result = Database::open(tmp.path().join(DATABASE_FILE_NAME));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_open_from_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DATABASE_FILE_NAME);
        let mut data = header();
        data.extend(track(&[(b"pfil", "a.mp3"), (b"tart", "Artist")]));
        fs::write(&path, &data).unwrap();

        let db = Database::open(&path).unwrap();
        assert_eq!(db.text_for("a.mp3", FieldCode::Artist).as_deref(), Some("Artist"));
        assert_eq!(db.paths().collect::<Vec<_>>(), vec!["a.mp3"]);
    }

    #[test]
    fn test_field_code_tags() {
        for tag in [*b"pfil", *b"tkey", *b"tsng", *b"tart", *b"tbpm"] {
            assert_eq!(FieldCode::from_tag(tag).tag(), tag);
        }
        assert_eq!(FieldCode::from_tag(*b"pfil"), FieldCode::FilePath);
    }
}
