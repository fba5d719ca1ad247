//! Read-only diagnostics export.
//!
//! A structured view of everything a resolution attempt considered — scored
//! and rejected candidates alike, with reasons and breakdowns — for operator
//! inspection. It never influences the resolution and is omitted from
//! responses unless explicitly requested.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::SearchStrategy;
use crate::models::{Candidate, ScanContext, ScanQuery};

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub raw_input: String,
    pub normalized_key: String,
    pub parsed_title: String,
    pub parsed_issue_number: Option<String>,
    pub parsed_year: Option<i32>,
    pub publisher_hint: Option<String>,
    pub strategy: Option<SearchStrategy>,
    pub correction_hit: bool,
    pub catalog_ok: bool,
    pub context: ScanContext,
    /// Every candidate considered, including rejected ones with reasons.
    pub candidates: Vec<Candidate>,
    pub generated_at: DateTime<Utc>,
}

impl DiagnosticsReport {
    pub fn new(
        query: &ScanQuery,
        normalized_key: &str,
        strategy: Option<SearchStrategy>,
        correction_hit: bool,
        catalog_ok: bool,
        context: ScanContext,
        candidates: Vec<Candidate>,
    ) -> Self {
        Self {
            raw_input: query.raw_input.clone(),
            normalized_key: normalized_key.to_string(),
            parsed_title: query.title.clone(),
            parsed_issue_number: query.issue_number.clone(),
            parsed_year: query.year,
            publisher_hint: query.publisher_hint.clone(),
            strategy,
            correction_hit,
            catalog_ok,
            context,
            candidates,
            generated_at: Utc::now(),
        }
    }
}
