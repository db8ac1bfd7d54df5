// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Deny-list recognizer: literal matching against global and tenant rules

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::config::{clamp_confidence, Category};
use super::span::{Source, Span};

fn default_rule_confidence() -> f64 {
    0.9
}

/// Deny-list rule as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenyListRuleConfig {
    pub category: String,
    pub literals: Vec<String>,
    #[serde(default = "default_rule_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Deny-list section of the engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenyListConfig {
    pub global: Vec<DenyListRuleConfig>,
    pub tenants: BTreeMap<String, Vec<DenyListRuleConfig>>,
}

/// A validated deny-list rule
#[derive(Debug, Clone, PartialEq)]
pub struct DenyListRule {
    pub category: Category,
    pub literals: Vec<String>,
    pub confidence: f64,
    pub case_sensitive: bool,
}

impl DenyListRule {
    pub fn new<I, S>(category: Category, literals: I, confidence: f64, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category,
            literals: literals
                .into_iter()
                .map(Into::<String>::into)
                .filter(|l| !l.is_empty())
                .collect(),
            confidence: clamp_confidence(confidence),
            case_sensitive,
        }
    }

    fn from_config(raw: &DenyListRuleConfig) -> Option<Self> {
        match raw.category.parse::<Category>() {
            Ok(category) => Some(Self::new(
                category,
                raw.literals.iter().cloned(),
                raw.confidence,
                raw.case_sensitive,
            )),
            Err(reason) => {
                tracing::warn!(%reason, "Skipping deny-list rule");
                None
            }
        }
    }
}

/// Immutable set of global rules plus tenant-scoped additions.
///
/// Built once by the configuration layer and shared read-only across calls.
/// Tenant rules are looked up per call, never merged into the global list.
#[derive(Debug, Clone, Default)]
pub struct DenyListStore {
    global: Vec<DenyListRule>,
    tenants: HashMap<String, Vec<DenyListRule>>,
}

impl DenyListStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DenyListConfig) -> Self {
        let global = config
            .global
            .iter()
            .filter_map(DenyListRule::from_config)
            .collect();
        let tenants = config
            .tenants
            .iter()
            .map(|(tenant, rules)| {
                (
                    tenant.clone(),
                    rules.iter().filter_map(DenyListRule::from_config).collect(),
                )
            })
            .collect();

        Self { global, tenants }
    }

    pub fn with_global_rule(mut self, rule: DenyListRule) -> Self {
        self.global.push(rule);
        self
    }

    pub fn with_tenant_rule(mut self, tenant_id: impl Into<String>, rule: DenyListRule) -> Self {
        self.tenants.entry(tenant_id.into()).or_default().push(rule);
        self
    }

    /// Global rules followed by the tenant's own rules, if any
    pub fn rules_for<'a>(
        &'a self,
        tenant_id: Option<&str>,
    ) -> impl Iterator<Item = &'a DenyListRule> + 'a {
        let tenant_rules = tenant_id
            .and_then(|id| self.tenants.get(id))
            .map(Vec::as_slice)
            .unwrap_or_default();
        self.global.iter().chain(tenant_rules.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.tenants.values().all(Vec::is_empty)
    }

    /// Report every occurrence of every applicable literal, overlapping repeats included
    pub fn recognize(&self, text: &str, tenant_id: Option<&str>) -> Vec<Span> {
        let mut spans = Vec::new();
        let mut folded: Option<FoldedText> = None;

        for rule in self.rules_for(tenant_id) {
            for literal in &rule.literals {
                if rule.case_sensitive {
                    for start in find_overlapping(text, literal) {
                        spans.push(Span::from_text(
                            text,
                            rule.category,
                            start,
                            start + literal.len(),
                            rule.confidence,
                            Source::DenyList,
                        ));
                    }
                } else {
                    let haystack = folded.get_or_insert_with(|| FoldedText::new(text));
                    let needle = literal.to_lowercase();
                    for pos in find_overlapping(&haystack.folded, &needle) {
                        let (start, end) = haystack.original_range(pos, needle.len());
                        spans.push(Span::from_text(
                            text,
                            rule.category,
                            start,
                            end,
                            rule.confidence,
                            Source::DenyList,
                        ));
                    }
                }
            }
        }

        spans.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
        spans.dedup_by(|a, b| a.start == b.start && a.end == b.end && a.category == b.category);

        tracing::debug!(
            count = spans.len(),
            tenant = tenant_id.unwrap_or("-"),
            "Deny-list recognizer finished"
        );
        spans
    }
}

/// Lowercased copy of a text with a map back to original char ranges
struct FoldedText {
    folded: String,
    // For each folded byte: the (start, end) of the original char it came from
    origin: Vec<(usize, usize)>,
}

impl FoldedText {
    fn new(text: &str) -> Self {
        let mut folded = String::with_capacity(text.len());
        let mut origin = Vec::with_capacity(text.len());

        for (idx, ch) in text.char_indices() {
            let range = (idx, idx + ch.len_utf8());
            for lower in ch.to_lowercase() {
                folded.push(lower);
                origin.resize(folded.len(), range);
            }
        }

        Self { folded, origin }
    }

    fn original_range(&self, pos: usize, len: usize) -> (usize, usize) {
        (self.origin[pos].0, self.origin[pos + len - 1].1)
    }
}

/// Start offsets of every occurrence of `needle`, advancing one char per hit
fn find_overlapping(haystack: &str, needle: &str) -> Vec<usize> {
    let mut hits = Vec::new();
    if needle.is_empty() {
        return hits;
    }

    let mut pos = 0;
    while let Some(idx) = haystack[pos..].find(needle) {
        let at = pos + idx;
        hits.push(at);
        pos = at + haystack[at..].chars().next().map_or(1, char::len_utf8);
    }
    hits
}
