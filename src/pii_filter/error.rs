// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Error types for the PII filter

use thiserror::Error;

/// Errors raised while building a detector or loading its configuration.
///
/// Detection itself never fails; these only surface from construction paths.
#[derive(Debug, Error)]
pub enum PiiError {
    /// Malformed configuration document
    #[error("Invalid config: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration file could not be read
    #[error("Failed to read config file '{path}': {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A regex failed to compile
    #[error("Failed to compile pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures of the statistical recognizer.
///
/// These are logged by the orchestrator and turned into "no spans from this
/// source"; they never propagate out of `detect` or `mask`.
#[derive(Debug, Error)]
pub enum StatisticalError {
    /// Model handle could not be initialized
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// Inference call failed
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Deadline elapsed before the model answered
    #[error("Statistical recognizer timed out after {0}ms")]
    Timeout(u64),
}
