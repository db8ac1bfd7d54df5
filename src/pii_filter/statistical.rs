// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Statistical (NER) recognizer boundary: model seam, single-load guard,
// deadline handling, label mapping and fusion of adjacent predictions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::config::Category;
use super::error::StatisticalError;
use super::span::{Source, Span};

/// Predictions below this score are dropped before fusion
pub const SCORE_FLOOR: f64 = 0.5;

const PERSON_BOOST: f64 = 1.1;
const PERSON_CAP: f64 = 0.95;
const ADDRESS_PENALTY: f64 = 0.8;

/// One token-level prediction returned by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrediction {
    pub label: String,
    pub score: f64,
    pub start: usize,
    pub end: usize,
}

impl TokenPrediction {
    pub fn new(label: impl Into<String>, score: f64, start: usize, end: usize) -> Self {
        Self {
            label: label.into(),
            score,
            start,
            end,
        }
    }
}

/// A loaded entity model
#[async_trait]
pub trait EntityModel: Send + Sync {
    async fn predict(&self, text: &str) -> Result<Vec<TokenPrediction>, StatisticalError>;
}

/// Produces the model handle; invoked at most once per successful load
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn EntityModel>, StatisticalError>;
}

/// Statistical recognizer wrapping a lazily loaded model.
///
/// The load runs on a detached task, so a caller whose deadline expires stops
/// waiting without cancelling it. Concurrent callers wait on the same
/// in-flight load. A failed load leaves the handle empty so a later call can
/// retry.
///
/// Needs a tokio runtime with the time driver enabled.
pub struct StatisticalRecognizer {
    loader: Option<Arc<dyn ModelLoader>>,
    model: Arc<OnceCell<Arc<dyn EntityModel>>>,
}

impl StatisticalRecognizer {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader: Some(loader),
            model: Arc::new(OnceCell::new()),
        }
    }

    /// Use an already loaded model
    pub fn with_model(model: Arc<dyn EntityModel>) -> Self {
        Self {
            loader: None,
            model: Arc::new(OnceCell::new_with(Some(model))),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    async fn model(&self) -> Result<Arc<dyn EntityModel>, StatisticalError> {
        if let Some(model) = self.model.get() {
            return Ok(Arc::clone(model));
        }

        let loader = self
            .loader
            .clone()
            .ok_or_else(|| StatisticalError::ModelLoad("no model loader".to_string()))?;
        let cell = Arc::clone(&self.model);

        // Only one task runs the loader at a time; the rest wait on the cell
        // and pick up its value.
        let load = tokio::spawn(async move {
            cell.get_or_try_init(|| async {
                tracing::info!("Loading statistical model");
                let model = loader.load().await?;
                tracing::info!("Statistical model ready");
                Ok::<_, StatisticalError>(model)
            })
            .await
            .cloned()
        });

        load.await
            .map_err(|e| StatisticalError::ModelLoad(format!("load task failed: {}", e)))?
    }

    /// Raw predictions, bounded by `timeout`. Anything arriving later is dropped.
    ///
    /// The deadline covers the wait for the model, never the load itself.
    pub async fn predict(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<Vec<TokenPrediction>, StatisticalError> {
        let call = async {
            let model = self.model().await?;
            model.predict(text).await
        };

        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| StatisticalError::Timeout(timeout.as_millis() as u64))?
    }

    /// Mapped and fused spans; any failure yields no spans
    pub async fn recognize(&self, text: &str, timeout: Duration) -> Vec<Span> {
        match self.predict(text, timeout).await {
            Ok(predictions) => {
                let spans = spans_from_predictions(text, &predictions);
                tracing::debug!(
                    predictions = predictions.len(),
                    count = spans.len(),
                    "Statistical recognizer finished"
                );
                spans
            }
            Err(e) => {
                tracing::warn!(error = %e, "Statistical recognizer contributed no spans");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for StatisticalRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticalRecognizer")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Map a model label to a category. The flag marks person-derived labels.
pub fn map_label(label: &str) -> Option<(Category, bool)> {
    let upper = label.trim().to_ascii_uppercase();
    let bare = ["B-", "I-", "E-", "S-", "L-", "U-"]
        .iter()
        .find_map(|prefix| upper.strip_prefix(prefix))
        .unwrap_or(&upper);

    match bare {
        "PER" | "PERSON" => Some((Category::Name, true)),
        "ORG" | "ORGANIZATION" => Some((Category::Name, false)),
        "LOC" | "LOCATION" => Some((Category::Address, false)),
        "MISC" | "MISCELLANEOUS" => Some((Category::Name, false)),
        _ => None,
    }
}

struct FusedPrediction {
    category: Category,
    from_person: bool,
    start: usize,
    end: usize,
    scores: Vec<f64>,
}

/// Turn raw predictions into spans.
///
/// Drops unmapped labels, low scores and invalid offsets, then fuses
/// same-category predictions that touch or overlap.
pub fn spans_from_predictions(text: &str, predictions: &[TokenPrediction]) -> Vec<Span> {
    let mut mapped: Vec<(Category, bool, &TokenPrediction)> = predictions
        .iter()
        .filter(|p| p.score >= SCORE_FLOOR)
        .filter(|p| {
            p.start < p.end
                && p.end <= text.len()
                && text.is_char_boundary(p.start)
                && text.is_char_boundary(p.end)
        })
        .filter_map(|p| map_label(&p.label).map(|(category, person)| (category, person, p)))
        .collect();
    mapped.sort_by_key(|(_, _, p)| (p.start, p.end));

    let mut fused: Vec<FusedPrediction> = Vec::new();
    for (category, person, prediction) in mapped {
        let score = prediction.score.min(1.0);
        if let Some(last) = fused.last_mut() {
            if last.category == category && prediction.start <= last.end {
                last.end = last.end.max(prediction.end);
                last.from_person |= person;
                last.scores.push(score);
                continue;
            }
        }
        fused.push(FusedPrediction {
            category,
            from_person: person,
            start: prediction.start,
            end: prediction.end,
            scores: vec![score],
        });
    }

    fused
        .into_iter()
        .map(|group| {
            let mean = group.scores.iter().sum::<f64>() / group.scores.len() as f64;
            let confidence = match group.category {
                Category::Name if group.from_person => (mean * PERSON_BOOST).min(PERSON_CAP),
                Category::Address => mean * ADDRESS_PENALTY,
                _ => mean,
            };
            Span::from_text(
                text,
                group.category,
                group.start,
                group.end,
                confidence,
                Source::Statistical,
            )
        })
        .collect()
}
