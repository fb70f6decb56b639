//! M3U / M3U8 playlist parsing.
//!
//! Produces the ordered `TrackQuery` list the engine consumes. Parsing is
//! lenient about content (unknown directives are skipped) but strict about
//! the header.

use std::path::Path;

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::TrackQuery;

/// Leading track number in a file name: "01. ", "03 - ", "7 "
static FILENAME_TRACK_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.\-\s]+").unwrap());

const HEADER: &str = "#EXTM3U";
const EXTINF: &str = "#EXTINF:";

#[derive(Clone, Debug, PartialEq)]
pub struct PlaylistEntry {
    pub track: TrackQuery,
    /// Path or URL line as written in the playlist.
    pub location: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Playlist {
    /// File stem of the playlist.
    pub name: String,
    pub entries: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn tracks(&self) -> Vec<TrackQuery> {
        self.entries.iter().map(|e| e.track.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read and parse a `.m3u` / `.m3u8` file.
pub fn parse_file(path: &Path) -> Result<Playlist> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if extension != "m3u" && extension != "m3u8" {
        bail!("Playlist must be .m3u or .m3u8, got '{}'", path.display());
    }

    let bytes = std::fs::read(path).with_context(|| format!("Failed to read playlist {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("playlist")
        .to_string();

    parse_str(&name, &text).with_context(|| format!("Failed to parse playlist {}", path.display()))
}

pub fn parse_str(name: &str, text: &str) -> Result<Playlist> {
    let mut lines = text.lines().map(|l| l.trim_start_matches('\u{feff}').trim());

    match lines.next() {
        Some(first) if first.starts_with(HEADER) => {}
        _ => bail!("Invalid M3U playlist: must start with {}", HEADER),
    }

    let mut entries = Vec::new();
    let mut pending: Option<TrackQuery> = None;

    for line in lines {
        if line.is_empty() {
            continue;
        }
        if let Some(info) = line.strip_prefix(EXTINF) {
            pending = Some(parse_extinf(info));
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let track = match pending.take() {
            Some(track) => track,
            None => parse_filename(line),
        };
        entries.push(PlaylistEntry {
            track,
            location: line.to_string(),
        });
    }

    Ok(Playlist {
        name: name.to_string(),
        entries,
    })
}

/// Split "Artist - Title" on the first " - ". No separator means no artist.
fn split_artist_title(text: &str) -> (String, String) {
    match text.split_once(" - ") {
        Some((artist, title)) => (artist.trim().to_string(), title.trim().to_string()),
        None => (String::new(), text.trim().to_string()),
    }
}

/// `<seconds>,Artist - Title`. Negative or unparsable durations are dropped.
fn parse_extinf(info: &str) -> TrackQuery {
    let (duration, display) = match info.split_once(',') {
        Some((secs, rest)) => (secs.trim().parse::<f64>().ok(), rest),
        None => (None, info),
    };

    let (artist, title) = split_artist_title(display);
    let mut track = TrackQuery::new(title, artist);
    if let Some(secs) = duration.filter(|d| *d >= 0.0) {
        track = track.with_duration(secs as u32);
    }
    track
}

fn parse_filename(location: &str) -> TrackQuery {
    // Windows separators too; playlists travel between machines
    let file = location.rsplit(['/', '\\']).next().unwrap_or(location);
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    let stem = FILENAME_TRACK_NUMBER.replace(stem, "");
    let (artist, title) = split_artist_title(&stem);
    TrackQuery::new(title, artist)
}
