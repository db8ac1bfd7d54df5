// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Placeholder substitution for merged spans

use sha2::{Digest, Sha256};
use std::borrow::Cow;

use super::config::Category;
use super::span::Span;

/// Replace every span with its `[[CATEGORY]]` placeholder
///
/// # Arguments
/// * `text` - Original text
/// * `spans` - Final merged spans, sorted by start and pairwise disjoint
///
/// # Returns
/// Masked text. Everything outside the spans is copied verbatim. Spans that
/// are out of bounds, off a char boundary, or overlap an earlier span are
/// skipped rather than corrupting the output.
pub fn mask_text<'a>(text: &'a str, spans: &[Span]) -> Cow<'a, str> {
    if spans.is_empty() {
        // Zero-copy when nothing needs masking
        return Cow::Borrowed(text);
    }

    let mut result = String::with_capacity(text.len());
    let mut cursor = 0;

    for span in spans {
        let usable = span.start >= cursor
            && span.start < span.end
            && span.end <= text.len()
            && text.is_char_boundary(span.start)
            && text.is_char_boundary(span.end);
        if !usable {
            tracing::debug!(
                start = span.start,
                end = span.end,
                category = %span.category,
                "Skipping span that cannot be masked"
            );
            continue;
        }

        result.push_str(&text[cursor..span.start]);
        result.push_str(&span.category.placeholder());
        cursor = span.end;
    }

    result.push_str(&text[cursor..]);
    Cow::Owned(result)
}

/// Byte ranges of well-formed placeholders already present in `text`
pub fn placeholder_ranges(text: &str) -> Vec<(usize, usize)> {
    let longest = Category::ALL
        .iter()
        .map(|c| c.as_str().len())
        .max()
        .unwrap_or(0);

    text.match_indices("[[")
        .filter_map(|(start, _)| {
            let rest = &text[start + 2..];
            let head = &rest.as_bytes()[..rest.len().min(longest + 2)];
            let close = head.windows(2).position(|pair| pair == b"]]")?;
            let name = &rest[..close];
            Category::ALL
                .iter()
                .any(|c| c.as_str() == name)
                .then_some((start, start + 2 + close + 2))
        })
        .collect()
}

/// One-way SHA-256 fingerprint of the original text, lowercase hex
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
