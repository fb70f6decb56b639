//! Normalization of titles and artist names for matching.
//!
//! CRITICAL: qualifier extraction and bracket stripping happen in the same
//! pass. Stripping brackets first loses remix identity ("Song (X Remix)"
//! collapses onto "Song") and turns real matches into false negatives.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

use crate::models::{NormalizedQuery, TrackQuery};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// A parenthesized or bracketed group; capture 1 is the inner text.
pub static BRACKET_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\(\[]([^\(\)\[\]]*)[\)\]]").unwrap());

/// Keywords that mark a musically distinct version of a track.
pub static QUALIFIER_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:remix|mix|edit|version|rework)(?:e[sd]|s)?\b").unwrap());

/// Featuring credit at the start of a bracket group: "feat. X", "ft X", "featuring X"
pub static FEATURING_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:feat\.?|ft\.?|featuring)(?:\s|$)").unwrap());

/// Featuring credit without brackets: "Song feat. Artist"
pub static FEATURING_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:feat\.?|ft\.?|featuring)\s+.*$").unwrap());

/// Matches track number prefixes like "03 - ", "Track 5 - ", "01. ", etc.
pub static TRACK_NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:track\s*)?\d{1,4}\s*[-–—._]\s*").unwrap());

/// Version tag after a dash: "- Remastered 2011", "- Radio Edit", "- Live at Wembley"
pub static DASH_VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s+[-–—]\s+.*\b(?:remaster(?:ed)?|remix(?:ed)?|mix|edit|version|rework(?:ed)?|live|acoustic|mono|stereo|demo|instrumental)\b.*$",
    )
    .unwrap()
});

/// Apostrophes are dropped outright so "Don't" and "Dont" compare equal.
pub static APOSTROPHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'").unwrap());

/// Residual punctuation (anything not a letter, digit or whitespace after ASCII folding)
pub static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]+").unwrap());

/// Regex to collapse multiple whitespace into single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII.
/// e.g., "Beyoncé" → "beyonce", "Motörhead" → "motorhead"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    // Transliterate any remaining non-ASCII (Cyrillic, Hebrew, CJK, etc.)
    any_ascii(&stripped).to_lowercase()
}

/// Straighten curly quotes and spell out "&" so "Rock & Roll" equals "Rock and Roll".
pub fn normalize_punctuation(s: &str) -> String {
    let result = s
        .replace(['\u{2018}', '\u{2019}', '\u{00B4}', '\u{0060}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(" & ", " and ");
    MULTI_SPACE.replace_all(&result, " ").to_string()
}

/// Drop apostrophes, turn remaining punctuation into spaces and collapse whitespace.
/// Expects input already folded to lowercase ASCII.
fn clean_words(s: &str) -> String {
    let without_apostrophes = APOSTROPHE.replace_all(s, "");
    let spaced = NON_WORD.replace_all(&without_apostrophes, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Output of [`normalize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Normalized {
    /// Comparison form; ends with the qualifier when one was preserved.
    pub text: String,
    pub qualifier: Option<String>,
}

/// Normalize a title (or artist) for comparison.
///
/// Bracket groups are scanned and stripped in a single pass: a group
/// containing a qualifier keyword (remix, mix, edit, version, rework) is kept
/// and re-appended after the rest of the text, every other group is dropped.
/// Featuring credits are removed whether bracketed or not.
///
/// "Song (Cabu & Ta-ku Remix)" → text "song cabu and ta ku remix",
/// qualifier "cabu and ta ku remix".
pub fn normalize(raw: &str) -> Normalized {
    let prepared = fold_to_ascii(&normalize_punctuation(raw));

    let mut preserved: Vec<String> = Vec::new();
    let stripped = BRACKET_GROUP.replace_all(&prepared, |caps: &Captures| {
        let inner = &caps[1];
        if !FEATURING_PREFIX.is_match(inner) && QUALIFIER_KEYWORD.is_match(inner) {
            let phrase = clean_words(inner);
            if !phrase.is_empty() {
                preserved.push(phrase);
            }
        }
        " "
    });
    let stripped = FEATURING_TAIL.replace(&stripped, "");

    let base = clean_words(&stripped);
    let qualifier = if preserved.is_empty() {
        None
    } else {
        Some(preserved.join(" "))
    };

    let text = match &qualifier {
        Some(q) if base.is_empty() => q.clone(),
        Some(q) => format!("{} {}", base, q),
        None => base,
    };

    Normalized { text, qualifier }
}

/// Normalize an artist name. Strips a leading "the " ("The Beatles" → "beatles").
pub fn normalize_artist(raw: &str) -> String {
    let normalized = normalize(raw).text;
    match normalized.strip_prefix("the ") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => normalized,
    }
}

/// Aggressively strip a title for the last-resort search.
/// Removes track numbers, every bracket group (qualifiers included),
/// dash version suffixes and featuring credits.
pub fn clean_title(raw: &str) -> String {
    let mut result = normalize_punctuation(raw);

    result = TRACK_NUMBER_PREFIX.replace(&result, "").to_string();
    result = BRACKET_GROUP.replace_all(&result, " ").to_string();
    result = DASH_VERSION_SUFFIX.replace(&result, "").to_string();
    result = FEATURING_TAIL.replace(&result, "").to_string();

    clean_words(&fold_to_ascii(&result))
}

impl NormalizedQuery {
    /// Derive the comparison form of a track query.
    pub fn from_query(query: &TrackQuery) -> Self {
        let title = normalize(&query.title);
        Self {
            title_norm: title.text,
            artist_norm: normalize_artist(&query.artist),
            preserved_qualifier: title.qualifier,
            title_cleaned: clean_title(&query.title),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
