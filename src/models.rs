//! Core data types for scan resolution.
//!
//! These types flow through the resolution pipeline: a raw input string is
//! parsed into a [`ScanQuery`], catalog lookups produce [`Candidate`]s, and
//! the classifier collapses them into a [`Resolution`]. The only durable type
//! is [`CorrectionRecord`], written when a human confirms a selection.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parsed form of a raw scan input. Derived once by the normalizer and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanQuery {
    pub raw_input: String,
    pub title: String,
    pub issue_number: Option<String>,
    /// A standalone 19xx/20xx token found in the input. Feeds the
    /// `exact-year` explainability signal only; never scored.
    pub year: Option<i32>,
    pub publisher_hint: Option<String>,
}

/// Whether a candidate refers to a series-level or issue-level catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Volume,
    Issue,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Volume => "volume",
            ResourceKind::Issue => "issue",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "volume" => Ok(ResourceKind::Volume),
            "issue" => Ok(ResourceKind::Issue),
            other => bail!("Unknown resource kind: {}. Use volume or issue.", other),
        }
    }
}

/// Per-factor score contributions, retained alongside the weighted sum so
/// diagnostics can show where a score came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub title: f64,
    pub publisher: f64,
    pub issue: f64,
}

/// A scored, provisional match produced during one resolution attempt.
/// Never persisted except through a [`CorrectionRecord`].
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub source_id: String,
    pub resource_kind: ResourceKind,
    pub series_name: String,
    pub issue_number: Option<String>,
    pub year: Option<i32>,
    pub publisher: Option<String>,
    pub cover_image_ref: Option<String>,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub rejected: bool,
    pub reject_reason: Option<String>,
}

impl Candidate {
    /// Mark this candidate rejected with the given reason. Rejected
    /// candidates are excluded from classification but kept for diagnostics.
    pub fn reject(&mut self, reason: &str) {
        self.rejected = true;
        self.reject_reason = Some(reason.to_string());
    }
}

/// The catalog item a human selected, as stored inside a correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedItem {
    pub source_id: String,
    pub resource_kind: ResourceKind,
    pub series_name: String,
    pub issue_number: Option<String>,
    pub year: Option<i32>,
    pub publisher: Option<String>,
    pub cover_image_ref: Option<String>,
}

impl SelectedItem {
    /// Rebuild a candidate view of this selection for replay. Replay is the
    /// only path that reports a 1.0 score / 100 confidence.
    pub fn to_replay_candidate(&self) -> Candidate {
        Candidate {
            source_id: self.source_id.clone(),
            resource_kind: self.resource_kind,
            series_name: self.series_name.clone(),
            issue_number: self.issue_number.clone(),
            year: self.year,
            publisher: self.publisher.clone(),
            cover_image_ref: self.cover_image_ref.clone(),
            score: 1.0,
            breakdown: ScoreBreakdown::default(),
            rejected: false,
            reject_reason: None,
        }
    }
}

/// Durable, human-confirmed mapping from a normalized input key to a catalog
/// item. Append-only: reclassification adds a new record, lookup takes the
/// most recent.
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionRecord {
    pub id: Uuid,
    pub normalized_key: String,
    pub source_raw_input: String,
    pub selected: SelectedItem,
    /// Confidence the engine had reached before the human stepped in.
    pub original_confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// Session-scoped publisher preference used by the bias filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherFilter {
    Marvel,
    Dc,
    Indie,
}

impl PublisherFilter {
    /// Keywords matched (case-insensitively) against a candidate's publisher.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            PublisherFilter::Marvel => &["marvel"],
            PublisherFilter::Dc => &["dc", "vertigo"],
            PublisherFilter::Indie => &[
                "image",
                "dark horse",
                "idw",
                "boom",
                "dynamite",
                "valiant",
                "oni",
            ],
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "marvel" => Ok(PublisherFilter::Marvel),
            "dc" => Ok(PublisherFilter::Dc),
            "indie" => Ok(PublisherFilter::Indie),
            other => bail!(
                "Unknown publisher filter: {}. Use marvel, dc, or indie.",
                other
            ),
        }
    }
}

/// Packaging format of the scanned item. Recorded in the session context and
/// echoed in diagnostics; has no effect on ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanFormat {
    #[default]
    Raw,
    Slab,
}

impl ScanFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(ScanFormat::Raw),
            "slab" => Ok(ScanFormat::Slab),
            other => bail!("Unknown scan format: {}. Use raw or slab.", other),
        }
    }
}

/// Session-scoped bias state, passed explicitly into resolution calls.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScanContext {
    pub publisher_filter: Option<PublisherFilter>,
    pub format: ScanFormat,
}

/// Which signals matched for a candidate, shown alongside confirmation
/// prompts so a human can see why it ranked where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchSignal {
    ExactIssue,
    ExactYear,
    PublisherMatch,
}

impl MatchSignal {
    pub fn label(&self) -> &'static str {
        match self {
            MatchSignal::ExactIssue => "exact-issue",
            MatchSignal::ExactYear => "exact-year",
            MatchSignal::PublisherMatch => "publisher-match",
        }
    }
}

/// A candidate presented for human confirmation, tagged with its matched
/// signals.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub signals: Vec<MatchSignal>,
}

/// Why a resolution produced no match. `SearchFailed` distinguishes a
/// catalog outage from a genuinely empty result so callers can say
/// "search failed" rather than "no match found".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchReason {
    NoCandidates,
    LowConfidence,
    SearchFailed,
}

/// Exit contract of the resolution pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    /// The engine trusts the top candidate. `confidence` is a percentage;
    /// exactly 100.0 only ever comes from correction replay.
    AutoResolved { candidate: Candidate, confidence: f64 },
    /// Confidence was insufficient; up to five candidates are presented for
    /// a human pick.
    NeedsConfirmation { candidates: Vec<ConfirmCandidate> },
    NoMatch { reason: NoMatchReason },
}
