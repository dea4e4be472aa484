//! UTF-16BE string encoding used by Serato binary files
//!
//! Both crate files and `database V2` store text as big-endian UTF-16 with
//! no byte-order mark and no terminator; the length always comes from the
//! enclosing record header.

use crate::error::{Error, Result};

/// Decode big-endian UTF-16 bytes into a string
///
/// Fails on an odd byte count or unpaired surrogates.
pub fn decode_utf16be(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::StringEncoding(format!(
            "odd UTF-16BE byte length {}",
            bytes.len()
        )));
    }

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    String::from_utf16(&units).map_err(|e| Error::StringEncoding(e.to_string()))
}

/// Encode a string as big-endian UTF-16 bytes
pub fn encode_utf16be(s: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(s.len() * 2);
    for unit in s.encode_utf16() {
        result.extend_from_slice(&unit.to_be_bytes());
    }
    result
}
