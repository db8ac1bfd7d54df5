// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Detection orchestrator: runs the recognizers, reconciles their spans and
// renders the masked result

use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::config::{DetectionOptions, EngineConfig};
use super::context::adjust_confidences;
use super::deny_list::DenyListStore;
use super::error::PiiError;
use super::masking::{fingerprint, mask_text};
use super::merger::{filter_spans, merge_spans};
use super::patterns::PatternRecognizer;
use super::span::{MaskingResult, NestedFinding, NestedMaskingResult, Span};
use super::statistical::StatisticalRecognizer;

/// Main PII detector
///
/// # Example
/// ```no_run
/// use pii_redactor::{DetectionOptions, PiiDetector};
///
/// # async fn run() -> Result<(), pii_redactor::PiiError> {
/// let detector = PiiDetector::new()?;
/// let options = DetectionOptions::default().with_categories(["EMAIL", "PHONE"]);
///
/// let result = detector
///     .mask("Contact john@corp.io or call (555) 201-3344", &options)
///     .await;
/// assert_eq!(result.masked_text, "Contact [[EMAIL]] or call [[PHONE]]");
/// # Ok(())
/// # }
/// ```
///
/// The detector is immutable once built; share it behind an `Arc`. The only
/// state that outlives a call is the statistical model handle, which loads
/// once on first use.
///
/// With a statistical recognizer attached, calls must run inside a tokio
/// runtime that has the time driver enabled (`enable_time` or `enable_all`).
/// The model load is spawned onto that runtime, and the deadline uses its
/// timer; without the driver `tokio::time::timeout` panics.
#[derive(Debug, Clone)]
pub struct PiiDetector {
    patterns: PatternRecognizer,
    deny_list: Arc<DenyListStore>,
    statistical: Option<Arc<StatisticalRecognizer>>,
    allow_list: Vec<Regex>,
    defaults: DetectionOptions,
}

impl PiiDetector {
    /// Detector with default options, no deny-list rules and no statistical model
    pub fn new() -> Result<Self, PiiError> {
        Self::from_config(&EngineConfig::default())
    }

    /// Build a detector from engine configuration
    ///
    /// # Errors
    /// Fails if an allow-list pattern does not compile.
    pub fn from_config(config: &EngineConfig) -> Result<Self, PiiError> {
        let patterns = PatternRecognizer::new()?;

        let allow_list = config
            .allow_patterns
            .iter()
            .map(|pattern| {
                regex::RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| PiiError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            deny_list: Arc::new(DenyListStore::from_config(&config.deny_list)),
            statistical: None,
            allow_list,
            defaults: config.defaults.clone(),
        })
    }

    /// Attach a statistical recognizer; clones of the detector share its model
    pub fn with_statistical(mut self, recognizer: Arc<StatisticalRecognizer>) -> Self {
        self.statistical = Some(recognizer);
        self
    }

    /// Replace the deny-list store
    pub fn with_deny_list(mut self, store: Arc<DenyListStore>) -> Self {
        self.deny_list = store;
        self
    }

    /// Options from the engine configuration
    pub fn default_options(&self) -> &DetectionOptions {
        &self.defaults
    }

    /// Detect PII spans in text
    ///
    /// # Returns
    /// Final spans: merged, filtered, sorted by start and pairwise disjoint.
    /// Recognizer failures only reduce the set; this never fails.
    pub async fn detect(&self, text: &str, options: &DetectionOptions) -> Vec<Span> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut candidates = self.collect_candidates(text, options).await;

        if !self.allow_list.is_empty() {
            candidates.retain(|span| !self.is_allowed(&span.matched_text));
        }

        adjust_confidences(text, &mut candidates);
        let merged = merge_spans(text, candidates);
        let spans = filter_spans(merged, options);

        tracing::debug!(count = spans.len(), "Detection finished");
        spans
    }

    /// Detect and mask PII in text
    ///
    /// # Returns
    /// Masked text, the spans that were masked, elapsed wall time, and a
    /// fingerprint of the original text (absent for blank input).
    pub async fn mask(&self, text: &str, options: &DetectionOptions) -> MaskingResult {
        let started = Instant::now();

        if text.trim().is_empty() {
            return MaskingResult {
                masked_text: text.to_string(),
                spans: Vec::new(),
                processing_time_ms: elapsed_ms(started),
                fingerprint: None,
            };
        }

        let spans = self.detect(text, options).await;
        let masked_text = mask_text(text, &spans).into_owned();

        MaskingResult {
            masked_text,
            spans,
            processing_time_ms: elapsed_ms(started),
            fingerprint: Some(fingerprint(text)),
        }
    }

    /// Mask every string inside a JSON value
    ///
    /// Objects and arrays are walked recursively; numbers, booleans and null
    /// pass through untouched. Findings carry the path of each string leaf
    /// (`user.emails[0]`), with the empty path for a top-level string.
    pub async fn mask_nested(&self, data: &Value, options: &DetectionOptions) -> NestedMaskingResult {
        let mut leaves = Vec::new();
        collect_strings(data, String::new(), &mut leaves);

        let mut findings = Vec::new();
        let mut replacements = Vec::with_capacity(leaves.len());
        for (path, text) in leaves {
            let spans = self.detect(text, options).await;
            replacements.push(mask_text(text, &spans).into_owned());
            if !spans.is_empty() {
                findings.push(NestedFinding { path, spans });
            }
        }

        let mut value = data.clone();
        if !findings.is_empty() {
            replace_strings(&mut value, &mut replacements.into_iter());
        }

        NestedMaskingResult {
            modified: !findings.is_empty(),
            value,
            findings,
        }
    }

    async fn collect_candidates(&self, text: &str, options: &DetectionOptions) -> Vec<Span> {
        let toggles = options.recognizers;
        let timeout = Duration::from_millis(options.timeout_ms);

        let statistical = async {
            match &self.statistical {
                Some(recognizer) if toggles.statistical => {
                    recognizer.recognize(text, timeout).await
                }
                _ => Vec::new(),
            }
        };

        let structural = async {
            let mut spans = Vec::new();
            if toggles.pattern {
                spans.extend(self.patterns.recognize(text));
            }
            if toggles.deny_list {
                spans.extend(self.deny_list.recognize(text, options.tenant_id.as_deref()));
            }
            spans
        };

        let (statistical, mut spans) = tokio::join!(statistical, structural);
        spans.extend(statistical);
        spans
    }

    /// Check if a matched value is on the allow list
    fn is_allowed(&self, value: &str) -> bool {
        self.allow_list.iter().any(|pattern| pattern.is_match(value))
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

/// String leaves in traversal order, with their paths
fn collect_strings<'a>(value: &'a Value, path: String, out: &mut Vec<(String, &'a str)>) {
    match value {
        Value::String(text) => out.push((path, text.as_str())),
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                collect_strings(item, format!("{}[{}]", path, idx), out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                collect_strings(item, child_path(&path, key), out);
            }
        }
        _ => {}
    }
}

/// Overwrite string leaves in the same order `collect_strings` visits them
fn replace_strings(value: &mut Value, replacements: &mut impl Iterator<Item = String>) {
    match value {
        Value::String(text) => {
            if let Some(masked) = replacements.next() {
                *text = masked;
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                replace_strings(item, replacements);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                replace_strings(item, replacements);
            }
        }
        _ => {}
    }
}
