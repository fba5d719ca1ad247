//! Confidence classifier: scored candidates to a resolution outcome.
//!
//! `Searching → Scored → {AutoResolved, NeedsConfirmation, NoMatch}`.
//! The correction-replay short-circuit happens upstream in the resolver;
//! this module only sees the live catalog-derived candidate set.
//!
//! Ties are broken by `source_id` ascending — a deterministic secondary key
//! instead of catalog retrieval order, which also makes the concurrent
//! per-volume fan-out order-independent.

use crate::config::ResolutionConfig;
use crate::models::{
    Candidate, ConfirmCandidate, MatchSignal, NoMatchReason, Resolution, ScanQuery,
};

/// Rank candidates and order them deterministically: score descending, then
/// `source_id` ascending. Rejected candidates are not reordered here; callers
/// filter them first.
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.source_id.cmp(&b.source_id))
    });
}

/// Classify an already-ranked (and bias-reordered) candidate list.
///
/// * top score ≥ auto threshold → `AutoResolved` (unless `force_confirm`)
/// * top score ≥ confirm threshold, or `force_confirm` → `NeedsConfirmation`
///   with up to `max_confirm_candidates` tagged candidates
/// * otherwise → `NoMatch`; an empty list reports `SearchFailed` when the
///   catalog itself was unreachable, `NoCandidates` otherwise.
///
/// `force_confirm` is the report-wrong-match flow: even a high-confidence
/// top candidate goes back to a human.
pub fn classify(
    candidates: Vec<Candidate>,
    query: &ScanQuery,
    config: &ResolutionConfig,
    force_confirm: bool,
    search_failed: bool,
) -> Resolution {
    let Some(top) = candidates.first() else {
        let reason = if search_failed {
            NoMatchReason::SearchFailed
        } else {
            NoMatchReason::NoCandidates
        };
        return Resolution::NoMatch { reason };
    };

    if !force_confirm && top.score >= config.auto_resolve_threshold {
        return Resolution::AutoResolved {
            confidence: top.score * 100.0,
            candidate: top.clone(),
        };
    }

    if force_confirm || top.score >= config.confirm_threshold {
        let presented = candidates
            .into_iter()
            .take(config.max_confirm_candidates)
            .map(|candidate| ConfirmCandidate {
                signals: signals_for(query, &candidate),
                candidate,
            })
            .collect();
        return Resolution::NeedsConfirmation {
            candidates: presented,
        };
    }

    Resolution::NoMatch {
        reason: NoMatchReason::LowConfidence,
    }
}

/// Which signals matched, shown next to confirmation prompts so the human
/// can see why a candidate ranked where it did.
fn signals_for(query: &ScanQuery, candidate: &Candidate) -> Vec<MatchSignal> {
    let mut signals = Vec::new();

    if let (Some(wanted), Some(got)) = (&query.issue_number, &candidate.issue_number) {
        if wanted == got {
            signals.push(MatchSignal::ExactIssue);
        }
    }
    if let (Some(wanted), Some(got)) = (query.year, candidate.year) {
        if wanted == got {
            signals.push(MatchSignal::ExactYear);
        }
    }
    if let (Some(hint), Some(publisher)) = (&query.publisher_hint, &candidate.publisher) {
        if publisher.to_lowercase().contains(&hint.to_lowercase()) {
            signals.push(MatchSignal::PublisherMatch);
        }
    }

    signals
}
