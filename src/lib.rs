// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// PII detection and redaction
// Runs inline before text leaves a local boundary

pub mod pii_filter;

pub use pii_filter::config::{Category, DetectionOptions, EngineConfig, RecognizerToggles};
pub use pii_filter::deny_list::{DenyListRule, DenyListStore};
pub use pii_filter::error::{PiiError, StatisticalError};
pub use pii_filter::span::{MaskingResult, NestedMaskingResult, Provenance, Source, Span};
pub use pii_filter::statistical::{
    EntityModel, ModelLoader, StatisticalRecognizer, TokenPrediction,
};
pub use pii_filter::PiiDetector;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
