//! Publisher bias filter: advisory re-ranking, never a hard filter.
//!
//! Candidates whose publisher matches the session's filter keywords move to
//! the front; everything else keeps its existing relative order behind them.
//! The output is always a permutation of the input — recall is preserved.

use crate::models::{Candidate, PublisherFilter};

/// Stably re-order `candidates` so that publisher-filter matches come first.
///
/// With no filter selected this is the identity. Relative order within each
/// partition is preserved, so callers should pass a score-sorted list.
pub fn apply_bias(
    candidates: Vec<Candidate>,
    filter: Option<PublisherFilter>,
) -> Vec<Candidate> {
    let Some(filter) = filter else {
        return candidates;
    };

    let (mut preferred, rest): (Vec<Candidate>, Vec<Candidate>) = candidates
        .into_iter()
        .partition(|c| matches_filter(c, filter));
    preferred.extend(rest);
    preferred
}

fn matches_filter(candidate: &Candidate, filter: PublisherFilter) -> bool {
    let Some(publisher) = &candidate.publisher else {
        return false;
    };
    let lower = publisher.to_lowercase();
    filter.keywords().iter().any(|kw| lower.contains(kw))
}
