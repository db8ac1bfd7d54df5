// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Confidence adjustment from the words around each candidate span

use super::config::Category;
use super::masking::placeholder_ranges;
use super::span::Span;

/// Characters inspected on each side of a span
pub const WINDOW_CHARS: usize = 20;

const BOOST_FACTOR: f64 = 1.2;
const BOOST_CAP: f64 = 0.99;
const PENALTY_FACTOR: f64 = 0.5;

/// Markers of fabricated or illustrative values
const FALSE_POSITIVE_INDICATORS: &[&str] = &[
    "example",
    "test",
    "demo",
    "sample",
    "placeholder",
    "fake",
    "dummy",
    "xxx",
    "123",
    "000",
];

fn category_keywords(category: Category) -> &'static [&'static str] {
    match category {
        Category::Email => &["email", "e mail", "mail", "contact", "send", "reach"],
        Category::Phone => &["phone", "call", "tel", "mobile", "cell", "fax", "contact"],
        Category::Card => &["card", "credit", "debit", "visa", "mastercard", "amex", "payment"],
        Category::Iban => &["iban", "account", "bank", "transfer"],
        Category::Bic => &["bic", "swift", "bank"],
        Category::Name => &["name", "mr", "mrs", "ms", "dr", "dear", "signed", "regards"],
        Category::Address => &["address", "street", "lives", "located", "road", "avenue"],
        Category::PostalCode => &["zip", "postal", "postcode", "plz"],
        Category::Url => &["url", "link", "website", "visit", "http", "https"],
        Category::Uuid => &["id", "uuid", "identifier", "user"],
        Category::Ssn => &["ssn", "social security"],
        Category::TaxId => &["tax", "tin", "vat", "ein"],
        Category::DateOfBirth => &["born", "birth", "dob", "birthday"],
    }
}

/// Rescale each span's confidence from its surroundings.
///
/// Text covered by any other candidate, or by an existing placeholder, is
/// blanked out of the window, so the words of a neighbouring detection never
/// count as context. A category keyword multiplies by the boost factor; a
/// false-positive indicator multiplies by the penalty factor instead. No
/// spans are added or removed.
pub fn adjust_confidences(text: &str, spans: &mut [Span]) {
    let mut ranges: Vec<(usize, usize)> = spans.iter().map(|s| (s.start, s.end)).collect();
    ranges.extend(placeholder_ranges(text));
    // A span's own range never reaches into its window, so it can stay in
    // the covered set.
    let covered = CoveredRanges::new(ranges);

    let factors: Vec<f64> = spans
        .iter()
        .map(|span| {
            let context = surrounding_words(text, span, &covered);
            context_factor(span, &context)
        })
        .collect();

    for (span, factor) in spans.iter_mut().zip(factors) {
        if factor > 1.0 {
            span.confidence = (span.confidence * factor).min(BOOST_CAP).max(span.confidence);
        } else {
            span.confidence *= factor;
        }
    }
}

fn context_factor(span: &Span, context: &str) -> f64 {
    let mut factor = 1.0;

    if category_keywords(span.category)
        .iter()
        .any(|kw| contains_phrase(context, kw))
    {
        factor = BOOST_FACTOR;
    }

    let leading = span
        .matched_text
        .split(|c: char| !c.is_alphanumeric())
        .find(|token| !token.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let flagged = FALSE_POSITIVE_INDICATORS.iter().any(|indicator| {
        contains_phrase(context, indicator) || leading.starts_with(indicator)
    });
    if flagged {
        factor = PENALTY_FACTOR;
    }

    factor
}

/// Up to WINDOW_CHARS chars on each side, lowercased and reduced to
/// space-separated words padded with one space on each end
fn surrounding_words(text: &str, span: &Span, covered: &CoveredRanges) -> String {
    let window_start = text[..span.start]
        .char_indices()
        .rev()
        .nth(WINDOW_CHARS - 1)
        .map_or(0, |(i, _)| i);
    let window_end = text[span.end..]
        .char_indices()
        .nth(WINDOW_CHARS)
        .map_or(text.len(), |(i, _)| span.end + i);

    let mut raw = String::with_capacity(window_end - window_start + 1);
    for (offset, ch) in text[window_start..span.start].char_indices() {
        raw.push(if covered.contains(window_start + offset) { ' ' } else { ch });
    }
    raw.push(' ');
    for (offset, ch) in text[span.end..window_end].char_indices() {
        raw.push(if covered.contains(span.end + offset) { ' ' } else { ch });
    }

    let words: Vec<String> = raw
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!(" {} ", words.join(" "))
}

/// Sorted, disjoint byte ranges blanked out of context windows
struct CoveredRanges(Vec<(usize, usize)>);

impl CoveredRanges {
    fn new(mut ranges: Vec<(usize, usize)>) -> Self {
        ranges.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        Self(merged)
    }

    fn contains(&self, pos: usize) -> bool {
        let idx = self.0.partition_point(|&(start, _)| start <= pos);
        idx > 0 && pos < self.0[idx - 1].1
    }
}

fn contains_phrase(context: &str, phrase: &str) -> bool {
    context.contains(&format!(" {} ", phrase))
}
