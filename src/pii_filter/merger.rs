// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Cross-recognizer span reconciliation

use std::cmp::Ordering;

use super::config::DetectionOptions;
use super::span::Span;

/// Resolve overlapping candidates into a disjoint, start-sorted set.
///
/// Candidates are visited by (start asc, priority desc, confidence desc).
/// On overlap the stronger span (priority, then confidence) supplies
/// category and confidence, the interval grows to the union, and provenance
/// accumulates. `matched_text` is re-sliced from `text` so it always equals
/// `text[start..end]`.
pub fn merge_spans(text: &str, mut candidates: Vec<Span>) -> Vec<Span> {
    candidates.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| b.provenance.priority().cmp(&a.provenance.priority()))
            .then_with(|| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(Ordering::Equal)
            })
    });

    let mut merged: Vec<Span> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        // Candidates arrive in start order and finalized spans only grow to
        // the right, so only the most recent one can overlap.
        match merged.last_mut() {
            Some(current) if current.overlaps(&candidate) => absorb(text, current, candidate),
            _ => merged.push(candidate),
        }
    }

    merged.sort_by_key(|s| s.start);
    merged
}

fn absorb(text: &str, current: &mut Span, candidate: Span) {
    let stronger = match candidate
        .provenance
        .priority()
        .cmp(&current.provenance.priority())
    {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.confidence > current.confidence,
    };

    if stronger {
        current.category = candidate.category;
        current.confidence = candidate.confidence;
    }
    current.provenance.extend(&candidate.provenance);

    let start = current.start.min(candidate.start);
    let end = current.end.max(candidate.end);
    if (start, end) != (current.start, current.end) {
        current.start = start;
        current.end = end;
        current.matched_text = text[start..end].to_string();
    }
}

/// Keep spans whose category is enabled and whose confidence clears the floor
pub fn filter_spans(spans: Vec<Span>, options: &DetectionOptions) -> Vec<Span> {
    spans
        .into_iter()
        .filter(|s| options.is_enabled(s.category) && s.confidence >= options.min_confidence)
        .collect()
}
