//! Tagged record reader shared by crate files and `database V2`
//!
//! Serato's binary files are flat sequences of big-endian records:
//! - 4 bytes: ASCII tag (`vrsn`, `otrk`, `ptrk`, `pfil`, ...)
//! - 4 bytes: value length (u32, big-endian)
//! - N bytes: value
//!
//! Records nest by value: an `otrk` value is itself a run of records.

use std::io::Cursor;

use binrw::{binrw, BinReaderExt};

use crate::error::{Error, Result};

/// Size of a record header (tag + length)
pub const HEADER_LEN: usize = 8;

/// Fixed record header
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Four-character record tag
    pub tag: [u8; 4],
    /// Length of the value that follows
    pub len: u32,
}

/// A single decoded record borrowing its value from the source buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub tag: [u8; 4],
    pub value: &'a [u8],
}

impl Record<'_> {
    /// Bytes this record occupied in the buffer, header included
    pub fn consumed(&self) -> usize {
        HEADER_LEN + self.value.len()
    }
}

/// Cursor over an immutable byte buffer of tagged records
#[derive(Debug, Clone)]
pub struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current cursor offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read the record header at the cursor without moving it
    ///
    /// Fails with `Truncated` when fewer than 8 bytes remain and with
    /// `CorruptTag` when the tag bytes are not ASCII.
    pub fn peek_header(&self) -> Result<RecordHeader> {
        if self.remaining() < HEADER_LEN {
            return Err(Error::Truncated {
                offset: self.pos,
                needed: HEADER_LEN,
                available: self.remaining(),
            });
        }

        let mut cursor = Cursor::new(&self.data[self.pos..self.pos + HEADER_LEN]);
        let header: RecordHeader = cursor.read_be()?;

        if !header.tag.is_ascii() {
            return Err(Error::CorruptTag {
                offset: self.pos,
                tag: header.tag,
            });
        }

        Ok(header)
    }

    /// Read one record and advance past its value
    ///
    /// On error the cursor is left where it was.
    pub fn read_record(&mut self) -> Result<Record<'a>> {
        let header = self.peek_header()?;
        let value_start = self.pos + HEADER_LEN;
        let len = header.len as usize;
        let available = self.data.len() - value_start;

        if len > available {
            return Err(Error::Truncated {
                offset: value_start,
                needed: len,
                available,
            });
        }

        let record = Record {
            tag: header.tag,
            value: &self.data[value_start..value_start + len],
        };
        self.pos = value_start + len;
        Ok(record)
    }

    /// Move the cursor forward by `n` bytes
    pub fn advance(&mut self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        self.pos += n;
        Ok(())
    }
}

impl<'a> Iterator for RecordReader<'a> {
    type Item = Result<Record<'a>>;

    /// Yields records until the buffer is consumed; the first error is
    /// yielded once and ends iteration.
    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }
        match self.read_record() {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                self.pos = self.data.len();
                Some(Err(e))
            }
        }
    }
}

/// Append one record to `buffer`
pub fn write_record(buffer: &mut Vec<u8>, tag: &[u8; 4], value: &[u8]) {
    buffer.extend_from_slice(tag);
    buffer.extend_from_slice(&(value.len() as u32).to_be_bytes());
    buffer.extend_from_slice(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_single_record() {
        let mut data = Vec::new();
        write_record(&mut data, b"tkey", &[0x00, b'A']);

        let mut reader = RecordReader::new(&data);
        let record = reader.read_record().unwrap();

        assert_eq!(&record.tag, b"tkey");
        assert_eq!(record.value, &[0x00, b'A']);
        assert_eq!(record.consumed(), 10);
        assert_eq!(reader.position(), 10);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_sequence() {
        let mut data = Vec::new();
        write_record(&mut data, b"pfil", b"ab");
        write_record(&mut data, b"tkey", b"");
        write_record(&mut data, b"tsng", b"cdef");

        let tags: Vec<[u8; 4]> = RecordReader::new(&data)
            .map(|r| r.unwrap().tag)
            .collect();
        assert_eq!(tags, vec![*b"pfil", *b"tkey", *b"tsng"]);
    }

    #[test]
    fn test_truncated_header() {
        let data = b"pfil\x00\x00";
        let mut reader = RecordReader::new(data);

        let err = reader.read_record().unwrap_err();
        assert!(matches!(err, Error::Truncated { offset: 0, needed: 8, available: 6 }));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_truncated_value() {
        let mut data = Vec::new();
        data.extend_from_slice(b"pfil");
        data.extend_from_slice(&100u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 10]);

        let mut reader = RecordReader::new(&data);
        let err = reader.read_record().unwrap_err();
        assert!(matches!(err, Error::Truncated { offset: 8, needed: 100, available: 10 }));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_corrupt_tag() {
        let mut data = Vec::new();
        write_record(&mut data, &[0xFF, b'f', b'i', b'l'], b"xx");

        let err = RecordReader::new(&data).read_record().unwrap_err();
        assert!(matches!(err, Error::CorruptTag { offset: 0, .. }));
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut data = Vec::new();
        write_record(&mut data, b"pfil", b"ab");
        data.extend_from_slice(b"tkey\x00\x00\x00\x09abc");

        let results: Vec<_> = RecordReader::new(&data).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_advance() {
        let data = [0u8; 12];
        let mut reader = RecordReader::new(&data);
        reader.advance(8).unwrap();
        assert_eq!(reader.remaining(), 4);
        assert!(reader.advance(5).is_err());
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn test_advance_then_iterate() {
        let mut data = vec![0u8; 3];
        write_record(&mut data, b"otrk", b"abc");

        let mut reader = RecordReader::new(&data);
        reader.advance(3).unwrap();
        let records: Vec<_> = reader.map(|r| r.unwrap().tag).collect();
        assert_eq!(records, vec![*b"otrk"]);
    }
}
