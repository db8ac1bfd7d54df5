// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Span and result types shared by every stage of the pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::config::Category;

/// Recognizer that produced a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Pattern,
    DenyList,
    Statistical,
}

impl Source {
    /// Merge priority; higher wins an overlap
    pub fn priority(&self) -> u8 {
        match self {
            Source::DenyList => 3,
            Source::Pattern => 2,
            Source::Statistical => 1,
        }
    }
}

/// Set of recognizers that contributed to a span
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Provenance(BTreeSet<Source>);

impl Provenance {
    pub fn single(source: Source) -> Self {
        Self(BTreeSet::from([source]))
    }

    pub fn contains(&self, source: Source) -> bool {
        self.0.contains(&source)
    }

    pub fn extend(&mut self, other: &Provenance) {
        self.0.extend(other.0.iter().copied());
    }

    /// Highest priority among contributing sources
    pub fn priority(&self) -> u8 {
        self.0.iter().map(Source::priority).max().unwrap_or(0)
    }

    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A detected PII span over the input text.
///
/// `start..end` is a half-open UTF-8 byte range on char boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub category: Category,
    pub start: usize,
    pub end: usize,
    pub matched_text: String,
    pub confidence: f64,
    pub provenance: Provenance,
}

impl Span {
    /// Build a span by slicing `text`; caller guarantees a valid range
    pub fn from_text(
        text: &str,
        category: Category,
        start: usize,
        end: usize,
        confidence: f64,
        source: Source,
    ) -> Self {
        Self {
            category,
            start,
            end,
            matched_text: text[start..end].to_string(),
            confidence,
            provenance: Provenance::single(source),
        }
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        !(self.end <= other.start || other.end <= self.start)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Output of a masking call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskingResult {
    pub masked_text: String,
    pub spans: Vec<Span>,
    pub processing_time_ms: f64,
    /// SHA-256 of the original text, lowercase hex
    pub fingerprint: Option<String>,
}

/// Spans found in one string leaf of a nested value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedFinding {
    pub path: String,
    pub spans: Vec<Span>,
}

/// Output of masking a nested JSON value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedMaskingResult {
    pub modified: bool,
    pub value: serde_json::Value,
    pub findings: Vec<NestedFinding>,
}
