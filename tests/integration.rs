// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Integration tests for the detection and masking pipeline

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pii_redactor::{
    Category, DenyListRule, DenyListStore, DetectionOptions, EngineConfig, EntityModel,
    ModelLoader, PiiDetector, Source, StatisticalError, StatisticalRecognizer, TokenPrediction,
};

/// Labels every occurrence of the configured words
struct WordModel {
    words: Vec<(&'static str, &'static str, f64)>,
    delay: Duration,
}

#[async_trait]
impl EntityModel for WordModel {
    async fn predict(&self, text: &str) -> Result<Vec<TokenPrediction>, StatisticalError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut predictions = Vec::new();
        for (word, label, score) in &self.words {
            for (start, _) in text.match_indices(word) {
                predictions.push(TokenPrediction::new(*label, *score, start, start + word.len()));
            }
        }
        Ok(predictions)
    }
}

struct BrokenModel;

#[async_trait]
impl EntityModel for BrokenModel {
    async fn predict(&self, _text: &str) -> Result<Vec<TokenPrediction>, StatisticalError> {
        Err(StatisticalError::Inference("runtime crashed".to_string()))
    }
}

struct SlowLoader {
    loads: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl ModelLoader for SlowLoader {
    async fn load(&self) -> Result<Arc<dyn EntityModel>, StatisticalError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Arc::new(WordModel {
            words: vec![("Anna", "B-PER", 0.9)],
            delay: Duration::ZERO,
        }))
    }
}

fn detector_with_model(model: impl EntityModel + 'static) -> PiiDetector {
    PiiDetector::new()
        .unwrap()
        .with_statistical(Arc::new(StatisticalRecognizer::with_model(Arc::new(model))))
}

#[tokio::test]
async fn test_scenario_a_email_and_phone() {
    let detector = PiiDetector::new().unwrap();
    let options = DetectionOptions::default()
        .with_categories(["EMAIL", "PHONE"])
        .with_min_confidence(0.7);

    let text = "Contact john@example.com or call (555) 123-4567";
    let result = detector.mask(text, &options).await;

    assert_eq!(result.masked_text.matches("[[EMAIL]]").count(), 1);
    assert_eq!(result.masked_text.matches("[[PHONE]]").count(), 1);
    assert!(!result.masked_text.contains("john@example.com"));
    assert!(!result.masked_text.contains("(555) 123-4567"));
    assert_eq!(result.masked_text, "Contact [[EMAIL]] or call [[PHONE]]");
}

#[tokio::test]
async fn test_scenario_b_luhn_failure_yields_no_card() {
    let detector = PiiDetector::new().unwrap();
    let spans = detector
        .detect("Card: 4111111111111112", &DetectionOptions::default())
        .await;
    assert!(spans.iter().all(|s| s.category != Category::Card));

    let spans = detector
        .detect("Card: 4111111111111111", &DetectionOptions::default())
        .await;
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].category, Category::Card);
}

#[tokio::test]
async fn test_scenario_c_empty_input() {
    let detector = detector_with_model(BrokenModel);
    let result = detector.mask("", &DetectionOptions::default()).await;

    assert_eq!(result.masked_text, "");
    assert!(result.spans.is_empty());
    assert!(result.fingerprint.is_none());
}

#[tokio::test]
async fn test_scenario_d_statistical_toggle_keeps_structural_spans() {
    let detector = detector_with_model(WordModel {
        words: vec![("Anna Berg", "PER", 0.9)],
        delay: Duration::ZERO,
    });
    let text = "Anna Berg, SSN 219-09-9999, mail anna@corp.io";

    let with = detector.detect(text, &DetectionOptions::default()).await;

    let mut options = DetectionOptions::default();
    options.recognizers.statistical = false;
    let without = detector.detect(text, &options).await;

    let structural: Vec<_> = with
        .into_iter()
        .filter(|s| s.provenance.contains(Source::Pattern) || s.provenance.contains(Source::DenyList))
        .collect();
    assert_eq!(structural, without);
    assert_eq!(without.len(), 2);
}

#[tokio::test]
async fn test_scenario_e_overlap_keeps_priority_category_with_union() {
    let store = DenyListStore::new().with_global_rule(DenyListRule::new(
        Category::Name,
        ["Acme Tower"],
        0.9,
        true,
    ));
    let detector = detector_with_model(WordModel {
        words: vec![("Tower North", "LOC", 0.95)],
        delay: Duration::ZERO,
    })
    .with_deny_list(Arc::new(store));

    let text = "Ship it to Acme Tower North today";
    let spans = detector.detect(text, &DetectionOptions::default()).await;

    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].category, Category::Name);
    assert_eq!(spans[0].matched_text, "Acme Tower North");
    assert_eq!(&text[spans[0].start..spans[0].end], "Acme Tower North");
    assert!(spans[0].provenance.contains(Source::DenyList));
    assert!(spans[0].provenance.contains(Source::Statistical));
}

#[tokio::test]
async fn test_statistical_failure_does_not_abort() {
    let detector = detector_with_model(BrokenModel);
    let result = detector
        .mask("SSN 219-09-9999", &DetectionOptions::default())
        .await;
    assert_eq!(result.masked_text, "SSN [[SSN]]");
}

#[tokio::test]
async fn test_late_statistical_response_is_discarded() {
    let detector = detector_with_model(WordModel {
        words: vec![("Anna", "PER", 0.9)],
        delay: Duration::from_millis(300),
    });
    let options = DetectionOptions {
        timeout_ms: 20,
        ..Default::default()
    };

    let result = detector.mask("Anna: 219-09-9999", &options).await;
    assert_eq!(result.masked_text, "Anna: [[SSN]]");
    assert!(result
        .spans
        .iter()
        .all(|s| !s.provenance.contains(Source::Statistical)));
}

#[tokio::test]
async fn test_statistical_names_are_masked() {
    let detector = detector_with_model(WordModel {
        words: vec![("Anna", "B-PER", 0.9), ("Berlin", "B-LOC", 0.9)],
        delay: Duration::ZERO,
    });
    let result = detector
        .mask("Dear Anna, welcome to Berlin", &DetectionOptions::default())
        .await;
    assert_eq!(result.masked_text, "Dear [[NAME]], welcome to [[ADDRESS]]");
}

#[tokio::test]
async fn test_shared_detector_loads_model_once() {
    let loader = Arc::new(SlowLoader {
        loads: AtomicUsize::new(0),
        delay: Duration::from_millis(30),
    });
    let detector = Arc::new(
        PiiDetector::new()
            .unwrap()
            .with_statistical(Arc::new(StatisticalRecognizer::new(loader.clone()))),
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let detector = Arc::clone(&detector);
        handles.push(tokio::spawn(async move {
            detector
                .mask("Anna called", &DetectionOptions::default())
                .await
        }));
    }
    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result.masked_text, "[[NAME]] called");
    }

    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_model_load_outlives_short_deadlines() {
    let loader = Arc::new(SlowLoader {
        loads: AtomicUsize::new(0),
        delay: Duration::from_millis(100),
    });
    let detector = PiiDetector::new()
        .unwrap()
        .with_statistical(Arc::new(StatisticalRecognizer::new(loader.clone())));
    let options = DetectionOptions {
        timeout_ms: 60,
        ..Default::default()
    };

    let first = detector.mask("Anna called", &options).await;
    assert_eq!(first.masked_text, "Anna called");

    let mut last = first;
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(60)).await;
        last = detector.mask("Anna called", &options).await;
    }

    assert_eq!(last.masked_text, "[[NAME]] called");
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tenant_deny_list_from_config() {
    let config = EngineConfig::from_json_str(
        r#"{
            "deny_list": {
                "global": [{"category": "NAME", "literals": ["Project Falcon"]}],
                "tenants": {"acme": [{"category": "ADDRESS", "literals": ["Acme Tower"], "confidence": 0.8}]}
            }
        }"#,
    )
    .unwrap();
    let detector = PiiDetector::from_config(&config).unwrap();
    let text = "Project Falcon kickoff at Acme Tower";

    let global_only = detector.mask(text, &DetectionOptions::default()).await;
    assert_eq!(global_only.masked_text, "[[NAME]] kickoff at Acme Tower");

    let tenant = detector
        .mask(text, &DetectionOptions::default().with_tenant("acme"))
        .await;
    assert_eq!(tenant.masked_text, "[[NAME]] kickoff at [[ADDRESS]]");
}

#[tokio::test]
async fn test_placeholders_are_not_redetected() {
    let detector = PiiDetector::new().unwrap();
    let text = "Mail anna@corp.io, IBAN DE89370400440532013000, card 4111 1111 1111 1111, \
                SSN 219-09-9999, see https://corp.io/u/7, BIC DEUTDEFF";

    let first = detector.mask(text, &DetectionOptions::default()).await;
    assert_eq!(first.spans.len(), 6);

    let second = detector
        .mask(&first.masked_text, &DetectionOptions::default())
        .await;
    assert!(second.spans.is_empty());
    assert_eq!(second.masked_text, first.masked_text);
}

#[tokio::test]
async fn test_repeated_calls_are_deterministic() {
    let detector = detector_with_model(WordModel {
        words: vec![("Anna", "PER", 0.8)],
        delay: Duration::ZERO,
    });
    let text = "Anna (anna@corp.io, +1 555-201-3344) was born 04/12/1987 in 55401.";

    let first = detector.mask(text, &DetectionOptions::default()).await;
    for _ in 0..5 {
        let again = detector.mask(text, &DetectionOptions::default()).await;
        assert_eq!(again.spans, first.spans);
        assert_eq!(again.masked_text, first.masked_text);
        assert_eq!(again.fingerprint, first.fingerprint);
    }
}

#[tokio::test]
async fn test_large_text_performance() {
    let detector = PiiDetector::new().unwrap();

    let mut text = String::new();
    for i in 0..1000 {
        text.push_str(&format!(
            "Customer c{}: SSN 219-09-{:04}, Email user{}@corp.io\n",
            i,
            1000 + i,
            i
        ));
    }

    let start = std::time::Instant::now();
    let result = detector.mask(&text, &DetectionOptions::default()).await;
    let duration = start.elapsed();

    assert_eq!(result.masked_text.matches("[[SSN]]").count(), 1000);
    assert_eq!(result.masked_text.matches("[[EMAIL]]").count(), 1000);

    println!("Processed {} bytes in {:?}", text.len(), duration);
}

async fn fastest_mask(detector: &PiiDetector, text: &str) -> (Duration, usize) {
    let mut best = Duration::MAX;
    let mut masked = 0;
    for _ in 0..3 {
        let start = std::time::Instant::now();
        let result = detector.mask(text, &DetectionOptions::default()).await;
        best = best.min(start.elapsed());
        masked = result.spans.len();
    }
    (best, masked)
}

#[tokio::test]
async fn test_masking_time_grows_linearly() {
    let detector = PiiDetector::new().unwrap();
    let small = "mail ab@corp.io ".repeat(2000);
    let large = "mail ab@corp.io ".repeat(8000);

    let (small_time, small_count) = fastest_mask(&detector, &small).await;
    let (large_time, large_count) = fastest_mask(&detector, &large).await;

    assert_eq!(small_count, 2000);
    assert_eq!(large_count, 8000);
    // 4x the input; quadratic work would be about 16x
    assert!(
        large_time < small_time * 10 + Duration::from_millis(100),
        "small {:?}, large {:?}",
        small_time,
        large_time
    );
}
