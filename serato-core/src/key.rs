//! Musical key notation
//!
//! Serato stores whatever key text the user or analyzer produced: traditional
//! names (`Am`, `F#`, `Ebmin`, `Cmaj`) or Camelot codes (`8A`, `12b`).
//! Rekordbox's `Tonality` attribute gets the Camelot form.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// Traditional key → Camelot code
///
/// Minor keys are 'A', major keys are 'B'.
const CAMELOT_TABLE: [(&str, &str); 24] = [
    // Major
    ("b", "1B"),
    ("f#", "2B"),
    ("db", "3B"),
    ("ab", "4B"),
    ("eb", "5B"),
    ("bb", "6B"),
    ("f", "7B"),
    ("c", "8B"),
    ("g", "9B"),
    ("d", "10B"),
    ("a", "11B"),
    ("e", "12B"),
    // Minor
    ("g#m", "1A"),
    ("ebm", "2A"),
    ("bbm", "3A"),
    ("fm", "4A"),
    ("cm", "5A"),
    ("gm", "6A"),
    ("dm", "7A"),
    ("am", "8A"),
    ("em", "9A"),
    ("bm", "10A"),
    ("f#m", "11A"),
    ("c#m", "12A"),
];

/// Enharmonic spellings folded onto the table's spelling before lookup
const ENHARMONIC_ALIASES: [(&str, &str); 10] = [
    ("gb", "f#"),
    ("c#", "db"),
    ("g#", "ab"),
    ("d#", "eb"),
    ("a#", "bb"),
    ("abm", "g#m"),
    ("d#m", "ebm"),
    ("a#m", "bbm"),
    ("gbm", "f#m"),
    ("dbm", "c#m"),
];

/// Which notation a key string is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Notation {
    /// Leading digit: `1A`..`12B`
    Camelot,
    /// Note name with optional minor marker
    Traditional,
}

/// Normalized musical key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MusicalKey {
    notation: Notation,
    value: String,
}

impl MusicalKey {
    /// Normalize raw key text
    ///
    /// Traditional keys are lower-cased with `maj` dropped and `min`
    /// shortened to `m`, so `Cmaj` → `c` and `Amin` → `am`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            return Self {
                notation: Notation::Camelot,
                value: trimmed.to_string(),
            };
        }

        let mut value: String = trimmed
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '♯' => '#',
                '♭' => 'b',
                other => other,
            })
            .collect();

        if let Some(stripped) = value.strip_suffix("maj") {
            value = stripped.to_string();
        } else if let Some(stripped) = value.strip_suffix("min") {
            value = format!("{}m", stripped);
        }

        Self {
            notation: Notation::Traditional,
            value,
        }
    }

    pub fn kind(&self) -> Notation {
        self.notation
    }

    /// Cleaned key text
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Camelot code for this key
    ///
    /// Camelot input is upper-cased and otherwise returned unchanged. An
    /// empty key gives an empty string.
    pub fn to_camelot(&self) -> Result<String> {
        if self.is_empty() {
            return Ok(String::new());
        }

        match self.notation {
            Notation::Camelot => Ok(self.value.to_uppercase()),
            Notation::Traditional => {
                let spelled = ENHARMONIC_ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == self.value)
                    .map(|(_, canonical)| *canonical)
                    .unwrap_or(self.value.as_str());

                CAMELOT_TABLE
                    .iter()
                    .find(|(name, _)| *name == spelled)
                    .map(|(_, code)| code.to_string())
                    .ok_or_else(|| Error::UnknownKey(self.value.clone()))
            }
        }
    }

    /// Traditional name for this key
    ///
    /// Camelot → traditional is not supported.
    pub fn to_traditional(&self) -> Result<String> {
        match self.notation {
            Notation::Traditional => Ok(self.value.clone()),
            Notation::Camelot => Err(Error::Unsupported(format!(
                "Camelot to traditional key conversion ({})",
                self.value
            ))),
        }
    }
}

impl fmt::Display for MusicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
