//! Weighted multi-factor candidate scoring.
//!
//! A pure function of (query, candidate fields): no I/O, no randomness, same
//! inputs always produce the same score and breakdown. All weights live here
//! as named constants so the model stays explainable and tunable.
//!
//! Two weight profiles:
//! - **issue-first** (the query asked for a specific issue):
//!   title 0.40, publisher 0.30, issue 0.30
//! - **volume-only** (no issue number): title 0.70, publisher 0.30,
//!   issue unused
//!
//! A +0.10 bonus applies when all three factors agree (issue-first only),
//! capped at 0.98 — a plain score never reaches 1.0; that is reserved for
//! correction replay.

use crate::models::{ScanQuery, ScoreBreakdown};

/// Title weight when the query names a specific issue.
pub const TITLE_WEIGHT_ISSUE_FIRST: f64 = 0.40;

/// Title weight when only a series is being matched.
pub const TITLE_WEIGHT_VOLUME_ONLY: f64 = 0.70;

/// Publisher-hint weight (both profiles).
pub const PUBLISHER_WEIGHT: f64 = 0.30;

/// Exact-issue-match weight (issue-first profile only).
pub const ISSUE_WEIGHT: f64 = 0.30;

/// Bonus added when title, publisher, and issue all matched.
pub const AGREEMENT_BONUS: f64 = 0.10;

/// Minimum title-token match ratio for the agreement bonus to apply.
pub const AGREEMENT_TITLE_FLOOR: f64 = 0.30;

/// Hard ceiling on any computed score.
pub const SCORE_CAP: f64 = 0.98;

/// Score a candidate's raw fields against a parsed query.
///
/// Returns the weighted score in `[0, 0.98]` plus the per-factor breakdown
/// (weighted contributions, retained for diagnostics).
pub fn score_candidate(
    query: &ScanQuery,
    series_name: &str,
    publisher: Option<&str>,
    issue_number: Option<&str>,
) -> (f64, ScoreBreakdown) {
    let issue_first = query.issue_number.is_some();
    let title_weight = if issue_first {
        TITLE_WEIGHT_ISSUE_FIRST
    } else {
        TITLE_WEIGHT_VOLUME_ONLY
    };

    let ratio = title_match_ratio(&query.title, series_name);
    let title_component = ratio * title_weight;

    let publisher_component = match (&query.publisher_hint, publisher) {
        (Some(hint), Some(pub_name))
            if pub_name.to_lowercase().contains(&hint.to_lowercase()) =>
        {
            PUBLISHER_WEIGHT
        }
        _ => 0.0,
    };

    // Exact string equality only: "1" and "1.0" are different issues.
    let issue_component = match (&query.issue_number, issue_number) {
        (Some(wanted), Some(got)) if issue_first && wanted == got => ISSUE_WEIGHT,
        _ => 0.0,
    };

    let mut score = title_component + publisher_component + issue_component;

    if issue_first
        && ratio >= AGREEMENT_TITLE_FLOOR
        && publisher_component > 0.0
        && issue_component > 0.0
    {
        score += AGREEMENT_BONUS;
    }

    (
        score.min(SCORE_CAP),
        ScoreBreakdown {
            title: title_component,
            publisher: publisher_component,
            issue: issue_component,
        },
    )
}

/// Fraction of query title tokens (length > 2, split on non-alphanumerics)
/// found as case-insensitive substrings of the candidate series name.
fn title_match_ratio(query_title: &str, series_name: &str) -> f64 {
    let series_lower = series_name.to_lowercase();
    let tokens: Vec<String> = query_title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect();

    if tokens.is_empty() {
        return 0.0;
    }

    let matched = tokens.iter().filter(|t| series_lower.contains(t.as_str())).count();
    matched as f64 / tokens.len() as f64
}
