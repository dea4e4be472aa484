//! Rekordbox XML library generation
//!
//! Document layout:
//! - DJ_PLAYLISTS: root, format version
//! - PRODUCT: identifies the writer
//! - COLLECTION: one TRACK per converted crate entry, with POSITION_MARK
//!   children for hot cues
//! - PLAYLISTS: ROOT folder node with one playlist NODE per crate

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::error::{Error, Result};
use crate::track::{ConversionResult, HotCue, TrackRecord};

/// DJ_PLAYLISTS version attribute
pub const PLAYLISTS_VERSION: &str = "1.0.0";

/// PRODUCT attributes rekordbox accepts on import
pub const PRODUCT_NAME: &str = "rekordbox";
pub const PRODUCT_VERSION: &str = "6.7.4";
pub const PRODUCT_COMPANY: &str = "AlphaTheta";

/// POSITION_MARK number of a memory cue
pub const MEMORY_CUE_NUM: i32 = -1;

/// Prefix for TRACK Location URLs
const LOCATION_PREFIX: &str = "file://localhost";

/// Playlist node types
const NODE_FOLDER: &str = "0";
const NODE_PLAYLIST: &str = "1";

/// Output options
#[derive(Debug, Clone, Copy)]
pub struct XmlOptions {
    /// Also write every hot cue as a memory cue
    pub copy_to_memory_cues: bool,
}

impl Default for XmlOptions {
    fn default() -> Self {
        Self {
            copy_to_memory_cues: true,
        }
    }
}

/// Write the whole document
///
/// Track IDs are assigned from 1 in playlist order.
pub fn write_xml<W: Write>(result: &ConversionResult, options: &XmlOptions, out: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let mut root = BytesStart::new("DJ_PLAYLISTS");
    root.push_attribute(("Version", PLAYLISTS_VERSION));
    writer.write_event(Event::Start(root)).map_err(xml_error)?;

    let mut product = BytesStart::new("PRODUCT");
    product.push_attribute(("Name", PRODUCT_NAME));
    product.push_attribute(("Version", PRODUCT_VERSION));
    product.push_attribute(("Company", PRODUCT_COMPANY));
    writer.write_event(Event::Empty(product)).map_err(xml_error)?;

    // COLLECTION
    let entries = result.track_count().to_string();
    let mut collection = BytesStart::new("COLLECTION");
    collection.push_attribute(("Entries", entries.as_str()));
    writer.write_event(Event::Start(collection)).map_err(xml_error)?;

    let mut track_id = 1u32;
    for playlist in &result.playlists {
        for track in &playlist.tracks {
            write_track(&mut writer, track_id, track, options)?;
            track_id += 1;
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new("COLLECTION")))
        .map_err(xml_error)?;

    // PLAYLISTS
    writer
        .write_event(Event::Start(BytesStart::new("PLAYLISTS")))
        .map_err(xml_error)?;

    let count = result.playlists.len().to_string();
    let mut root_node = BytesStart::new("NODE");
    root_node.push_attribute(("Type", NODE_FOLDER));
    root_node.push_attribute(("Name", "ROOT"));
    root_node.push_attribute(("Count", count.as_str()));
    writer.write_event(Event::Start(root_node)).map_err(xml_error)?;

    let mut track_id = 1u32;
    for playlist in &result.playlists {
        let entries = playlist.tracks.len().to_string();
        let mut node = BytesStart::new("NODE");
        node.push_attribute(("Name", playlist.name.as_str()));
        node.push_attribute(("Type", NODE_PLAYLIST));
        node.push_attribute(("KeyType", "0"));
        node.push_attribute(("Entries", entries.as_str()));

        if playlist.tracks.is_empty() {
            writer.write_event(Event::Empty(node)).map_err(xml_error)?;
            continue;
        }

        writer.write_event(Event::Start(node)).map_err(xml_error)?;
        for _ in &playlist.tracks {
            let key = track_id.to_string();
            let mut entry = BytesStart::new("TRACK");
            entry.push_attribute(("Key", key.as_str()));
            writer.write_event(Event::Empty(entry)).map_err(xml_error)?;
            track_id += 1;
        }
        writer
            .write_event(Event::End(BytesEnd::new("NODE")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("NODE")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("PLAYLISTS")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("DJ_PLAYLISTS")))
        .map_err(xml_error)?;

    writer.get_mut().write_all(b"\n")?;
    Ok(())
}

/// Render the document into a string
pub fn to_xml_string(result: &ConversionResult, options: &XmlOptions) -> Result<String> {
    let mut buffer = Vec::new();
    write_xml(result, options, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| Error::Xml(e.to_string()))
}

fn write_track<W: Write>(
    writer: &mut Writer<W>,
    track_id: u32,
    track: &TrackRecord,
    options: &XmlOptions,
) -> Result<()> {
    let id = track_id.to_string();
    let total_time = track.duration_secs.to_string();
    let location = format!("{}{}", LOCATION_PREFIX, track.location.display());
    let tonality = track
        .key
        .as_ref()
        .and_then(|k| k.to_camelot().ok())
        .filter(|k| !k.is_empty());

    let mut elem = BytesStart::new("TRACK");
    elem.push_attribute(("TrackID", id.as_str()));
    elem.push_attribute(("Name", track.title.trim()));
    elem.push_attribute(("Artist", track.artist.trim()));
    elem.push_attribute(("Kind", track.format.kind()));
    elem.push_attribute(("TotalTime", total_time.as_str()));
    if let Some(tonality) = &tonality {
        elem.push_attribute(("Tonality", tonality.as_str()));
    }
    elem.push_attribute(("Location", location.as_str()));

    if track.cues.is_empty() {
        writer.write_event(Event::Empty(elem)).map_err(xml_error)?;
        return Ok(());
    }

    writer.write_event(Event::Start(elem)).map_err(xml_error)?;
    for cue in &track.cues {
        write_position_mark(writer, cue, cue.index as i32)?;
        if options.copy_to_memory_cues {
            write_position_mark(writer, cue, MEMORY_CUE_NUM)?;
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new("TRACK")))
        .map_err(xml_error)?;

    Ok(())
}

fn write_position_mark<W: Write>(writer: &mut Writer<W>, cue: &HotCue, num: i32) -> Result<()> {
    let start = format!("{:.3}", cue.start_secs());
    let num = num.to_string();
    let red = cue.color.red.to_string();
    let green = cue.color.green.to_string();
    let blue = cue.color.blue.to_string();

    let mut mark = BytesStart::new("POSITION_MARK");
    mark.push_attribute(("Name", cue.name.as_str()));
    mark.push_attribute(("Type", "0"));
    mark.push_attribute(("Start", start.as_str()));
    mark.push_attribute(("Num", num.as_str()));
    mark.push_attribute(("Red", red.as_str()));
    mark.push_attribute(("Green", green.as_str()));
    mark.push_attribute(("Blue", blue.as_str()));
    writer.write_event(Event::Empty(mark)).map_err(xml_error)?;

    Ok(())
}

fn xml_error<E: std::fmt::Display>(e: E) -> Error {
    Error::Xml(e.to_string())
}
