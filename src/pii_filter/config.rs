// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Configuration types for PII Filter

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use super::deny_list::DenyListConfig;
use super::error::PiiError;

/// PII categories that can be detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Email,
    Phone,
    Card,
    Iban,
    Bic,
    Name,
    Address,
    PostalCode,
    Url,
    Uuid,
    Ssn,
    TaxId,
    DateOfBirth,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Email,
        Category::Phone,
        Category::Card,
        Category::Iban,
        Category::Bic,
        Category::Name,
        Category::Address,
        Category::PostalCode,
        Category::Url,
        Category::Uuid,
        Category::Ssn,
        Category::TaxId,
        Category::DateOfBirth,
    ];

    /// Uppercase category name, as used inside placeholders
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Email => "EMAIL",
            Category::Phone => "PHONE",
            Category::Card => "CARD",
            Category::Iban => "IBAN",
            Category::Bic => "BIC",
            Category::Name => "NAME",
            Category::Address => "ADDRESS",
            Category::PostalCode => "POSTAL_CODE",
            Category::Url => "URL",
            Category::Uuid => "UUID",
            Category::Ssn => "SSN",
            Category::TaxId => "TAX_ID",
            Category::DateOfBirth => "DATE_OF_BIRTH",
        }
    }

    /// Redaction token, e.g. `[[EMAIL]]`
    pub fn placeholder(&self) -> String {
        format!("[[{}]]", self.as_str())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Case-insensitive; `-` and space are accepted in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// Per-recognizer enable flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerToggles {
    pub pattern: bool,
    pub deny_list: bool,
    pub statistical: bool,
}

impl Default for RecognizerToggles {
    fn default() -> Self {
        Self {
            pattern: true,
            deny_list: true,
            statistical: true,
        }
    }
}

/// Per-call detection options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionOptions {
    #[serde(deserialize_with = "deserialize_categories")]
    pub enabled_categories: BTreeSet<Category>,
    #[serde(deserialize_with = "deserialize_confidence")]
    pub min_confidence: f64,
    pub recognizers: RecognizerToggles,
    pub timeout_ms: u64,
    pub tenant_id: Option<String>,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            enabled_categories: Category::ALL.into_iter().collect(),
            min_confidence: 0.5,
            recognizers: RecognizerToggles::default(),
            timeout_ms: 2000,
            tenant_id: None,
        }
    }
}

impl DetectionOptions {
    /// Restrict detection to the given category names, ignoring unknown ones
    pub fn with_categories<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.enabled_categories = parse_categories(names);
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = clamp_confidence(min_confidence);
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        self.enabled_categories.contains(&category)
    }
}

/// Parse category names, dropping the ones that are not recognized
pub fn parse_categories<I, S>(names: I) -> BTreeSet<Category>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| match name.as_ref().parse::<Category>() {
            Ok(category) => Some(category),
            Err(reason) => {
                tracing::warn!(%reason, "Ignoring category in options");
                None
            }
        })
        .collect()
}

pub(crate) fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn deserialize_categories<'de, D>(deserializer: D) -> Result<BTreeSet<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    Ok(parse_categories(names))
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(clamp_confidence)
}

/// Engine-level configuration, loaded once and shared by every call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Options used when the caller does not supply their own
    pub defaults: DetectionOptions,

    /// Global and tenant-scoped deny-list rules
    pub deny_list: DenyListConfig,

    /// Regexes for values that must never be reported (case-insensitive)
    pub allow_patterns: Vec<String>,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, PiiError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, PiiError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PiiError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PiiError::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}
