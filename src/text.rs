//! Text canonicalization and lenient value parsing.
//!
//! Sheet exports are inconsistent about accents (`Réel` / `Réél` / `REEL`,
//! `ÉTAT` / `ETAT`) and Unicode composition. Cells are NFC-normalized once at
//! ingestion; every comparison downstream goes through [`canonical_key`].

use chrono::{NaiveDate, NaiveDateTime};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
];

/// NFC form of `s`.
pub fn nfc(s: &str) -> String {
    s.nfc().collect()
}

/// Accent-, case- and whitespace-insensitive key used for every match.
pub fn canonical_key(s: &str) -> String {
    let stripped: String = s
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace typographic punctuation with ASCII equivalents.
pub fn replace_unsupported_punctuation(s: &str) -> String {
    s.replace('\u{2013}', "-")
        .replace('\u{2014}', "-")
        .replace('\u{2026}', "...")
}

/// File-name safe form of a cycle value.
pub fn path_safe(s: &str) -> String {
    s.replace(['/', '\\'], "_")
}

/// Parse a payment amount; anything unparseable is `None`.
///
/// Accepts surrounding whitespace, thousands spaces (regular, NBSP and
/// narrow NBSP), a trailing `€` and a decimal comma.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('€')
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a calendar date (day-first for slash formats); time parts are dropped.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}
