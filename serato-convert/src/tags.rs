//! Audio tag readers
//!
//! - MP3: ID3v2 via `id3`, duration via Symphonia
//! - M4A: `ilst` atoms and duration via `lofty`

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use id3::TagLike;
use lofty::config::ParseOptions;
use lofty::file::AudioFile;
use lofty::mp4::{Atom, AtomData, AtomIdent, Ilst, Mp4File};
use lofty::tag::Accessor;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use serato_core::markers::{MARKERS2_GEOB_DESCRIPTION, MARKERS2_MP4_ATOMS};
use serato_core::{AudioFormat, AudioTags, Error, Result, TagReader};

/// Reads tags straight from files on disk
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTagReader;

impl TagReader for FileTagReader {
    fn read_tags(&self, path: &Path, format: AudioFormat) -> Result<AudioTags> {
        match format {
            AudioFormat::Mp3 => read_mp3(path),
            AudioFormat::M4a => read_m4a(path),
        }
    }
}

fn read_mp3(path: &Path) -> Result<AudioTags> {
    // Probing first means a missing or broken file fails the track
    let duration = mp3_duration(path)?;
    let mut tags = AudioTags {
        duration,
        ..Default::default()
    };

    match id3::Tag::read_from_path(path) {
        Ok(tag) => {
            tags.title = tag.title().map(str::to_owned);
            tags.artist = tag.artist().map(str::to_owned);
            tags.markers = markers_from_id3(&tag);
        }
        Err(e) => {
            warn!("Unable to read ID3 tags from {:?}: {}", path, e);
        }
    }

    Ok(tags)
}

/// Data of the `Serato Markers2` GEOB frame
fn markers_from_id3(tag: &id3::Tag) -> Option<Vec<u8>> {
    tag.frames()
        .filter(|f| f.id() == "GEOB")
        .filter_map(|f| f.content().encapsulated_object())
        .find(|obj| obj.description == MARKERS2_GEOB_DESCRIPTION)
        .map(|obj| obj.data.clone())
}

/// MP3 duration from the stream header, or by walking packets when the
/// file has no Xing/Info frame count
fn mp3_duration(path: &Path) -> Result<Duration> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::TagRead(format!("{:?}: {}", path, e)))?;

    let mut format = probed.format;

    let (track_id, n_frames, time_base, sample_rate) = {
        let track = format
            .default_track()
            .ok_or_else(|| Error::TagRead(format!("{:?}: no audio track", path)))?;
        (
            track.id,
            track.codec_params.n_frames,
            track.codec_params.time_base,
            track.codec_params.sample_rate,
        )
    };

    let to_duration = |ts: u64| -> Option<Duration> {
        if let Some(tb) = time_base {
            let time = tb.calc_time(ts);
            Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac))
        } else {
            sample_rate.map(|rate| Duration::from_secs_f64(ts as f64 / rate as f64))
        }
    };

    if let Some(duration) = n_frames.and_then(to_duration) {
        return Ok(duration);
    }

    debug!("No frame count in {:?}, walking packets", path);
    let mut total = 0u64;
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(Error::TagRead(format!("{:?}: {}", path, e))),
        };
        if packet.track_id() == track_id {
            total += packet.dur;
        }
    }

    to_duration(total).ok_or_else(|| Error::TagRead(format!("{:?}: unknown time base", path)))
}

fn read_m4a(path: &Path) -> Result<AudioTags> {
    let mut file = File::open(path)?;
    let mp4 = Mp4File::read_from(&mut file, ParseOptions::new())
        .map_err(|e| Error::TagRead(format!("{:?}: {}", path, e)))?;

    let mut tags = AudioTags {
        duration: mp4.properties().duration(),
        ..Default::default()
    };

    if let Some(ilst) = mp4.ilst() {
        tags.title = ilst.title().map(Cow::into_owned);
        tags.artist = ilst.artist().map(Cow::into_owned);
        tags.markers = markers_from_ilst(ilst);
    }

    Ok(tags)
}

/// First Markers2 freeform atom present, in preference order
fn markers_from_ilst(ilst: &Ilst) -> Option<Vec<u8>> {
    MARKERS2_MP4_ATOMS.iter().find_map(|(mean, name)| {
        let ident = AtomIdent::Freeform {
            mean: Cow::Borrowed(*mean),
            name: Cow::Borrowed(*name),
        };
        ilst.get(&ident).and_then(atom_bytes)
    })
}

fn atom_bytes(atom: &Atom<'_>) -> Option<Vec<u8>> {
    atom.data().find_map(|data| match data {
        AtomData::UTF8(text) | AtomData::UTF16(text) => Some(text.as_bytes().to_vec()),
        AtomData::Unknown { data, .. } => Some(data.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use id3::frame::EncapsulatedObject;
    use tempfile::TempDir;

    fn geob(description: &str, data: &[u8]) -> EncapsulatedObject {
        EncapsulatedObject {
            mime_type: "application/octet-stream".into(),
            filename: String::new(),
            description: description.into(),
            data: data.to_vec(),
        }
    }

    fn freeform(mean: &'static str, text: &str) -> Atom<'static> {
        Atom::new(
            AtomIdent::Freeform {
                mean: Cow::Borrowed(mean),
                name: Cow::Borrowed("markersv2"),
            },
            AtomData::UTF8(text.to_string()),
        )
    }

    #[test]
    fn test_markers_from_id3() {
        let mut tag = id3::Tag::new();
        tag.add_frame(geob("Serato Overview", b"nope"));
        tag.add_frame(geob("Serato Markers2", b"\x01\x01YWJj"));

        assert_eq!(markers_from_id3(&tag), Some(b"\x01\x01YWJj".to_vec()));
    }

    #[test]
    fn test_markers_from_id3_missing() {
        let mut tag = id3::Tag::new();
        tag.set_title("No cues");
        assert!(markers_from_id3(&tag).is_none());
    }

    #[test]
    fn test_markers_from_ilst_preference() {
        let mut ilst = Ilst::default();
        ilst.insert(freeform("com.serato.dj", "newer"));
        assert_eq!(markers_from_ilst(&ilst), Some(b"newer".to_vec()));

        ilst.insert(freeform("com.serato", "older"));
        assert_eq!(markers_from_ilst(&ilst), Some(b"older".to_vec()));
    }

    #[test]
    fn test_markers_from_ilst_missing() {
        assert!(markers_from_ilst(&Ilst::default()).is_none());
    }

    #[test]
    fn test_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        let reader = FileTagReader;

        assert!(reader.read_tags(&tmp.path().join("gone.mp3"), AudioFormat::Mp3).is_err());
        assert!(reader.read_tags(&tmp.path().join("gone.m4a"), AudioFormat::M4a).is_err());
    }

    #[test]
    fn test_garbage_file_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("noise.m4a");
        std::fs::write(&path, b"definitely not an mp4 container").unwrap();

        assert!(FileTagReader.read_tags(&path, AudioFormat::M4a).is_err());
    }
}
