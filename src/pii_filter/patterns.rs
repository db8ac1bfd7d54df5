// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Pattern recognizer: fixed regex table with structural validators
// Uses RegexSet to skip patterns that cannot match before running find_iter

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use std::collections::BTreeMap;

use super::config::Category;
use super::error::PiiError;
use super::span::{Source, Span};
use super::validators::{is_valid_bic, is_valid_iban, is_valid_luhn, is_valid_ssn};

/// Matches shorter than this many characters are noise
pub const MIN_MATCH_CHARS: usize = 3;

/// Gatekeeper run on a raw match; `false` discards it
pub type Validator = fn(&str) -> bool;

/// Pattern definition (category, pattern, base confidence, validator)
type PatternDef = (Category, &'static str, f64, Option<Validator>);

// Table order is also overlap precedence inside this recognizer:
// earlier entries claim text first.
static PATTERN_TABLE: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    vec![
        (
            Category::Url,
            r#"\b(?:https?://|www\.)[^\s<>"'\[\]]+[^\s<>"'\[\].,;:!?)]"#,
            0.9,
            None,
        ),
        (
            Category::Email,
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            0.95,
            None,
        ),
        (
            Category::Uuid,
            r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b",
            0.9,
            None,
        ),
        (
            Category::Iban,
            r"\b[A-Z]{2}\d{2}(?:(?:[A-Z0-9]{4}){2,7}[A-Z0-9]{1,4}|(?: [A-Z0-9]{4}){2,7}(?: [A-Z0-9]{1,4})?)\b",
            0.95,
            Some(is_valid_iban),
        ),
        (
            Category::Card,
            r"\b(?:\d[ -]?){12,18}\d\b",
            0.95,
            Some(is_valid_luhn),
        ),
        (
            Category::Ssn,
            r"\b\d{3}-\d{2}-\d{4}\b|\b\d{9}\b",
            0.85,
            Some(is_valid_ssn),
        ),
        (
            Category::DateOfBirth,
            r"(?i)\b(?:DOB|date of birth|birth ?date|born(?: on)?|birthday)[:\s]+\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4}\b",
            0.9,
            None,
        ),
        (
            Category::DateOfBirth,
            r"\b(?:0[1-9]|1[0-2])/(?:0[1-9]|[12]\d|3[01])/(?:19|20)\d{2}\b",
            0.55,
            None,
        ),
        (
            Category::Phone,
            r"(?:\+1[-.\s]?)?(?:\(\d{3}\)\s?|\b\d{3}[-.\s]?)\d{3}[-.\s]?\d{4}\b",
            0.85,
            None,
        ),
        (
            Category::Phone,
            r"\+[1-9]\d{7,14}\b",
            0.8,
            None,
        ),
        (
            Category::TaxId,
            r"(?i)\b(?:tax ?id|tin|ein|vat(?: ?id)?|steuer-?id)(?: ?(?:no\.?|number|#))?[:\s]+(?:[A-Z]{2} ?)?\d[\d -]{6,16}\d\b",
            0.85,
            None,
        ),
        (Category::TaxId, r"\b\d{2}-\d{7}\b", 0.7, None),
        (Category::PostalCode, r"\b\d{5}-\d{4}\b", 0.75, None),
        (
            Category::PostalCode,
            r"\b[A-Z]{1,2}\d[A-Z\d]? \d[A-Z]{2}\b",
            0.7,
            None,
        ),
        (Category::PostalCode, r"\b\d{5}\b", 0.4, None),
        (
            Category::Bic,
            r"\b[A-Z]{4}[A-Z]{2}[A-Z0-9]{2}(?:[A-Z0-9]{3})?\b",
            0.6,
            Some(is_valid_bic),
        ),
    ]
});

/// Compiled pattern with metadata
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub category: Category,
    pub regex: Regex,
    pub confidence: f64,
    pub validator: Option<Validator>,
}

/// Pattern recognizer over the fixed table
#[derive(Debug, Clone)]
pub struct PatternRecognizer {
    regex_set: RegexSet,
    patterns: Vec<CompiledPattern>,
}

impl PatternRecognizer {
    /// Compile the pattern table
    pub fn new() -> Result<Self, PiiError> {
        let mut pattern_strings = Vec::with_capacity(PATTERN_TABLE.len());
        let mut patterns = Vec::with_capacity(PATTERN_TABLE.len());

        for (category, pattern, confidence, validator) in PATTERN_TABLE.iter() {
            let regex = Regex::new(pattern).map_err(|source| PiiError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            pattern_strings.push(*pattern);
            patterns.push(CompiledPattern {
                category: *category,
                regex,
                confidence: *confidence,
                validator: *validator,
            });
        }

        let regex_set =
            RegexSet::new(&pattern_strings).map_err(|source| PiiError::InvalidPattern {
                pattern: "<pattern set>".to_string(),
                source,
            })?;

        Ok(Self {
            regex_set,
            patterns,
        })
    }

    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    /// Find all non-overlapping structural matches in `text`
    pub fn recognize(&self, text: &str) -> Vec<Span> {
        // Claimed ranges, start -> end; always disjoint
        let mut claimed: BTreeMap<usize, usize> = BTreeMap::new();
        let mut spans: Vec<Span> = Vec::new();

        for pattern_idx in self.regex_set.matches(text).iter() {
            let pattern = &self.patterns[pattern_idx];

            for mat in pattern.regex.find_iter(text) {
                let Some((start, end)) = validated_range(pattern, text, mat.start(), mat.end())
                else {
                    continue;
                };

                let overlaps = claimed
                    .range(..end)
                    .next_back()
                    .is_some_and(|(_, &claimed_end)| claimed_end > start);
                if overlaps {
                    continue;
                }

                claimed.insert(start, end);
                spans.push(Span::from_text(
                    text,
                    pattern.category,
                    start,
                    end,
                    pattern.confidence,
                    Source::Pattern,
                ));
            }
        }

        spans.sort_by_key(|s| s.start);
        tracing::debug!(count = spans.len(), "Pattern recognizer finished");
        spans
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Range of an accepted match starting at `start`.
///
/// Greedy matches can swallow trailing digits that break a checksum, so when
/// the validator rejects the full match, shorter matches ending on a word
/// boundary are tried, longest first.
fn validated_range(
    pattern: &CompiledPattern,
    text: &str,
    start: usize,
    end: usize,
) -> Option<(usize, usize)> {
    let accepts = |end: usize| {
        let value = &text[start..end];
        value.chars().count() >= MIN_MATCH_CHARS && pattern.validator.map_or(true, |v| v(value))
    };

    if accepts(end) {
        return Some((start, end));
    }
    pattern.validator?;

    let mut boundaries: Vec<usize> = text[start..end]
        .char_indices()
        .skip(1)
        .filter(|&(offset, ch)| {
            !is_word_char(ch)
                && text[start..start + offset]
                    .chars()
                    .next_back()
                    .is_some_and(is_word_char)
        })
        .map(|(offset, _)| start + offset)
        .collect();
    boundaries.reverse();

    boundaries
        .into_iter()
        .find(|&shorter| {
            pattern
                .regex
                .find_at(&text[..shorter], start)
                .is_some_and(|m| m.start() == start && m.end() == shorter)
                && accepts(shorter)
        })
        .map(|shorter| (start, shorter))
}
