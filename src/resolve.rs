//! Resolution pipeline orchestration.
//!
//! Raw input → normalize → correction-memory lookup (short-circuit on hit)
//! → catalog gathering → scoring → rejection marking → bias re-rank →
//! classification. No step past the normalizer can fail the pipeline:
//! every failure mode collapses into one of the three classifier outcomes
//! or a logged-and-ignored side effect.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::bias;
use crate::catalog::{self, CatalogClient};
use crate::classify;
use crate::config::Config;
use crate::corrections;
use crate::diagnostics::DiagnosticsReport;
use crate::models::{
    CorrectionRecord, Resolution, ScanContext, SelectedItem,
};
use crate::normalize;
use crate::score;

/// Per-request resolution options. The session [`ScanContext`] is passed in
/// explicitly rather than read from shared state.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub publisher_hint: Option<String>,
    pub context: ScanContext,
    /// Report-wrong-match flow: this candidate was reported wrong and must
    /// not be offered again; the outcome is forced to confirmation.
    pub reported_wrong_source_id: Option<String>,
    /// Include the full scored/rejected candidate list in the outcome.
    pub diagnostics: bool,
}

/// A resolution plus, when requested, its diagnostics payload.
#[derive(Debug)]
pub struct ResolveOutcome {
    pub resolution: Resolution,
    pub diagnostics: Option<DiagnosticsReport>,
}

/// Resolve a raw scan input to a catalogued item.
///
/// Infallible by design: a broken correction store degrades to a cache miss,
/// a broken catalog degrades to `NoMatch`, and nothing here mutates state —
/// only an explicit [`confirm_selection`] writes anything.
pub async fn resolve_scan(
    pool: &SqlitePool,
    catalog_client: Arc<dyn CatalogClient>,
    config: &Config,
    raw_input: &str,
    options: &ResolveOptions,
) -> ResolveOutcome {
    let mut query = normalize::parse(raw_input);
    query.publisher_hint = options.publisher_hint.clone();
    let key = normalize::normalize_key(raw_input);

    // Correction memory takes priority over everything: a remembered answer
    // resolves instantly at confidence 100 with no catalog traffic.
    match corrections::lookup(pool, &key).await {
        Ok(Some(record)) => {
            let resolution = Resolution::AutoResolved {
                candidate: record.selected.to_replay_candidate(),
                confidence: 100.0,
            };
            let diagnostics = options.diagnostics.then(|| {
                DiagnosticsReport::new(
                    &query,
                    &key,
                    None,
                    true,
                    true,
                    options.context,
                    Vec::new(),
                )
            });
            return ResolveOutcome {
                resolution,
                diagnostics,
            };
        }
        Ok(None) => {}
        Err(e) => {
            warn!(key = %key, error = %e, "correction lookup failed; treating as miss");
        }
    }

    let gathered = catalog::gather_candidates(catalog_client, &config.catalog, &query).await;

    // Score everything, then mark rejections. Rejected candidates stay in
    // the set for diagnostics but are invisible to the classifier.
    let mut candidates = gathered.candidates;
    for candidate in &mut candidates {
        let (candidate_score, breakdown) = score::score_candidate(
            &query,
            &candidate.series_name,
            candidate.publisher.as_deref(),
            candidate.issue_number.as_deref(),
        );
        candidate.score = candidate_score;
        candidate.breakdown = breakdown;

        if breakdown.title == 0.0 {
            candidate.reject("no title token overlap");
        }
        if options.reported_wrong_source_id.as_deref() == Some(candidate.source_id.as_str()) {
            candidate.reject("reported wrong match");
        }
    }

    let mut live: Vec<_> = candidates.iter().filter(|c| !c.rejected).cloned().collect();
    classify::rank(&mut live);
    // Classification gates on the front of the biased order: an active
    // publisher filter can place a lower-scored preferred-publisher match
    // ahead of a higher-scored one, and the outcome follows the presented
    // ranking.
    let live = bias::apply_bias(live, options.context.publisher_filter);

    let force_confirm = options.reported_wrong_source_id.is_some();
    let resolution = classify::classify(
        live,
        &query,
        &config.resolution,
        force_confirm,
        !gathered.catalog_ok,
    );

    let diagnostics = options.diagnostics.then(|| {
        DiagnosticsReport::new(
            &query,
            &key,
            Some(gathered.strategy),
            false,
            gathered.catalog_ok,
            options.context,
            candidates,
        )
    });

    ResolveOutcome {
        resolution,
        diagnostics,
    }
}

/// Record a human pick for a raw input and return the terminal resolution.
///
/// The correction write is best-effort: persistence failure is logged and
/// swallowed, and the caller still gets `AutoResolved` at confidence 100 —
/// the selection was made by a human and stands regardless of storage.
pub async fn confirm_selection(
    pool: &SqlitePool,
    raw_input: &str,
    selected: SelectedItem,
    original_confidence: f64,
) -> Resolution {
    let record = CorrectionRecord {
        id: Uuid::new_v4(),
        normalized_key: normalize::normalize_key(raw_input),
        source_raw_input: raw_input.to_string(),
        selected,
        original_confidence,
        created_at: Utc::now(),
    };

    corrections::record_best_effort(pool, &record).await;

    Resolution::AutoResolved {
        candidate: record.selected.to_replay_candidate(),
        confidence: 100.0,
    }
}
