// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// PII Filter - detection and redaction engine
//
// Pipeline per call:
// - pattern, deny-list and statistical recognizers over the same text
// - context-based confidence adjustment
// - overlap resolution into disjoint spans, then category/confidence filter
// - placeholder substitution

pub mod config;
pub mod context;
pub mod deny_list;
pub mod detector;
pub mod error;
pub mod masking;
pub mod merger;
pub mod patterns;
pub mod span;
pub mod statistical;
pub mod validators;

pub use detector::PiiDetector;
