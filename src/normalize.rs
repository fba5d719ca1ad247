//! Input normalization: free text to [`ScanQuery`] and correction-cache keys.
//!
//! Parsing is deliberately simple: three patterns tried in order, first match
//! wins, whole-string-as-title fallback. This trades recall (a title that
//! legitimately ends in a number gets mis-split) for a single predictable
//! parse outcome per input.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::ScanQuery;

static HASH_ISSUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*#\s*(\d+)$").expect("valid hash-issue regex"));
static NO_ISSUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s+no\.?\s*(\d+)$").expect("valid no-issue regex")
});
static BARE_ISSUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s+(\d+)$").expect("valid bare-issue regex"));
static YEAR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("valid year regex"));

/// Parse a raw input string into a [`ScanQuery`].
///
/// Patterns, in order: `<title> #<digits>`, `<title> No.<digits>`
/// (case-insensitive, optional period), `<title> <digits>`. The first match
/// splits the input into title and issue number; if none match, the entire
/// trimmed string is the title.
pub fn parse(raw_input: &str) -> ScanQuery {
    let trimmed = raw_input.trim();

    let (title, issue_number) = [&*HASH_ISSUE, &*NO_ISSUE, &*BARE_ISSUE]
        .iter()
        .find_map(|re| {
            re.captures(trimmed).map(|caps| {
                (
                    caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
                    Some(caps.get(2).map_or("", |m| m.as_str()).to_string()),
                )
            })
        })
        .unwrap_or_else(|| (trimmed.to_string(), None));

    // A standalone 19xx/20xx token that is not the captured issue number is
    // treated as a year hint for explainability signals.
    let year = YEAR_TOKEN
        .find_iter(trimmed)
        .map(|m| m.as_str())
        .find(|&tok| issue_number.as_deref() != Some(tok))
        .and_then(|tok| tok.parse::<i32>().ok());

    ScanQuery {
        raw_input: raw_input.to_string(),
        title,
        issue_number,
        year,
        publisher_hint: None,
    }
}

/// Canonical correction-cache key for a raw input: lowercase, strip every
/// character outside `[a-z0-9\s]`, collapse whitespace runs, trim.
///
/// Two differently-punctuated inputs naming the same item must produce the
/// same key; the correction store depends on this.
pub fn normalize_key(raw_input: &str) -> String {
    let lowered = raw_input.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
