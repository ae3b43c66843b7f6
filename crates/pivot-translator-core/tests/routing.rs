//! Integration tests for pivot-translator-core
//!
//! These tests drive the engine end to end with an in-process model backend:
//! - Route selection (direct, pivot, pass-through)
//! - Single model instantiation under concurrent acquires
//! - Per-unit failure isolation and batch statistics
//! - Cancellation and output ordering
//! - Plain text, JSON and CSV file translation

use async_trait::async_trait;
use pivot_translator_core::{
    AppConfig, BatchOptions, CancelToken, Engine, Error, ErrorKind, FileFormat, FileOptions,
    FileTranslator, ModelCache, ModelDescriptor, ModelLoader, Result, RouteKind, RoutePlan,
    TranslationModel,
    config::CacheConfig, executor::Executor,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// =============================================================================
// Mock Backend for Testing
// =============================================================================

/// Prefixes text with the model's target code, so every step is visible.
/// Text containing "FAIL" makes inference fail.
struct MarkerModel {
    target: String,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

#[async_trait]
impl TranslationModel for MarkerModel {
    async fn infer(&self, text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            // Shorter texts finish later, to scramble completion order
            tokio::time::sleep(delay / u32::try_from(text.len().max(1)).unwrap()).await;
        }
        if text.contains("FAIL") {
            return Err(Error::Inference {
                model: self.target.clone(),
                reason: "mock inference failure".to_string(),
            });
        }
        Ok(format!("{}:{}", self.target, text))
    }
}

#[derive(Default)]
struct MarkerLoader {
    loads: AtomicUsize,
    calls: Arc<AtomicUsize>,
    load_delay: Option<Duration>,
    infer_delay: Option<Duration>,
}

impl MarkerLoader {
    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for MarkerLoader {
    async fn load(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn TranslationModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Arc::new(MarkerModel {
            target: descriptor.target().to_string(),
            calls: Arc::clone(&self.calls),
            delay: self.infer_delay,
        }))
    }

    fn name(&self) -> &'static str {
        "marker"
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

fn test_config() -> AppConfig {
    AppConfig {
        cache: CacheConfig::disabled(),
        ..Default::default()
    }
}

fn engine_with(loader: Arc<MarkerLoader>) -> Engine {
    Engine::with_loader(&test_config(), loader).unwrap()
}

fn engine() -> (Engine, Arc<MarkerLoader>) {
    let loader = Arc::new(MarkerLoader::default());
    (engine_with(Arc::clone(&loader)), loader)
}

// =============================================================================
// Routing Tests
// =============================================================================

#[tokio::test]
async fn test_direct_pair_uses_one_model() {
    let (engine, loader) = engine();
    let plan = engine.plan("en", "hi").unwrap();
    assert_eq!(plan.kind(), RouteKind::Direct);

    let result = engine.translate_one("Hello", "en", "hi").await.unwrap();
    assert!(result.succeeded);
    assert_eq!(result.text, "hin_Deva:Hello");
    assert_eq!(loader.calls(), 1);
}

#[tokio::test]
async fn test_pivot_pair_goes_through_english() {
    let (engine, loader) = engine();
    let result = engine.translate_one("नमस्ते", "hin_Deva", "zho_Hans").await.unwrap();
    assert_eq!(result.text, "zho_Hans:eng_Latn:नमस्ते");
    assert_eq!(loader.loads(), 2);
    assert_eq!(engine.model_cache().stats().loaded, 2);
}

#[tokio::test]
async fn test_same_language_passes_through() {
    let (engine, loader) = engine();
    for text in ["", "hello", "  spaced  "] {
        let result = engine.translate_one(text, "english", "en").await.unwrap();
        assert!(result.succeeded);
        assert_eq!(result.text, text);
    }
    assert_eq!(loader.loads(), 0);
}

#[tokio::test]
async fn test_empty_text_acquires_nothing() {
    let (engine, loader) = engine();
    let result = engine.translate_one("", "hi", "zh").await.unwrap();
    assert!(result.succeeded);
    assert_eq!(result.text, "");
    assert_eq!(engine.model_cache().stats().acquires, 0);
    assert_eq!(loader.loads(), 0);
}

#[tokio::test]
async fn test_unroutable_pair() {
    let mut config = test_config();
    // Drop ur -> en so ur has no way to the pivot
    config.models.retain(|m| !(m.source == "urd_Arab" && m.target == "eng_Latn"));
    let engine = Engine::with_loader(&config, Arc::new(MarkerLoader::default())).unwrap();

    let err = engine.translate_one("سلام", "ur", "hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoRouteAvailable);
    assert!(engine.translate_batch(&["a"], "ur", "zh").await.is_err());
}

#[tokio::test]
async fn test_round_trip_through_pivot_needs_two_calls() {
    let (engine, loader) = engine();
    let registry = engine.registry();
    let hi = registry.canonicalize("hi").unwrap();
    let en = registry.canonicalize("en").unwrap();

    let directory = engine.directory();
    let plan = RoutePlan::two_step(
        Arc::clone(directory.lookup_direct(&hi, &en).unwrap()),
        Arc::clone(directory.lookup_direct(&en, &hi).unwrap()),
    )
    .unwrap();
    assert!(plan.steps().iter().all(|m| m.source() != m.target()));

    let cache = Arc::new(ModelCache::new(Arc::clone(&loader) as Arc<dyn ModelLoader>));
    let result = Executor::new(cache).execute(&plan, "namaste").await;

    assert!(result.succeeded);
    assert_eq!(result.text, "hin_Deva:eng_Latn:namaste");
    assert_eq!(loader.calls(), 2);
    assert_eq!(loader.loads(), 2);
}

#[tokio::test]
async fn test_available_targets() {
    let (engine, _) = engine();
    let direct = engine.available_targets("zh", false).unwrap();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].as_str(), "eng_Latn");

    let all = engine.available_targets("zh", true).unwrap();
    assert_eq!(all.len(), 3);
}

// =============================================================================
// Model Cache Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquires_load_once() {
    let loader = Arc::new(MarkerLoader {
        load_delay: Some(Duration::from_millis(50)),
        ..Default::default()
    });
    let cache = Arc::new(ModelCache::new(loader.clone()));
    let engine = engine_with(Arc::clone(&loader));
    let plan = engine.plan("en", "hi").unwrap();
    let descriptor = Arc::clone(&plan.steps()[0]);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let descriptor = Arc::clone(&descriptor);
            tokio::spawn(async move {
                let lease = cache.acquire(&descriptor).await.unwrap();
                Arc::as_ptr(lease.model()).cast::<()>() as usize
            })
        })
        .collect();

    let mut instances = Vec::new();
    for handle in handles {
        instances.push(handle.await.unwrap());
    }

    assert_eq!(loader.loads(), 1);
    assert!(instances.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(cache.ref_count(&descriptor), 0);
    assert!(cache.is_loaded(&descriptor));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_batch_loads_each_model_once() {
    let loader = Arc::new(MarkerLoader {
        load_delay: Some(Duration::from_millis(20)),
        ..Default::default()
    });
    let engine = engine_with(Arc::clone(&loader));
    let units: Vec<String> = (0..16).map(|i| format!("line {i}")).collect();

    let options = BatchOptions::with_concurrency(8);
    let outcome = engine.translate_batch_with(&units, "hi", "zh", &options).await.unwrap();

    assert_eq!(outcome.stats.succeeded, 16);
    assert_eq!(loader.loads(), 2);
}

// =============================================================================
// Batch Tests
// =============================================================================

#[tokio::test]
async fn test_failed_unit_does_not_stop_batch() {
    let (engine, _) = engine();
    let outcome = engine.translate_batch(&["u0", "u1 FAIL", "u2"], "en", "hi").await.unwrap();

    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.stats.attempted, 3);
    assert_eq!(outcome.stats.succeeded, 2);
    assert_eq!(outcome.stats.failed, 1);
    assert_eq!(outcome.stats.skipped, 0);

    assert_eq!(outcome.results[0].text, "hin_Deva:u0");
    assert_eq!(outcome.results[2].text, "hin_Deva:u2");
    let failed = &outcome.results[1];
    assert!(!failed.succeeded);
    assert!(failed.text.is_empty());
    assert_eq!(failed.error_kind(), Some(ErrorKind::TranslationFailed));
    assert_eq!(failed.error.as_ref().unwrap().step, Some(0));
}

#[tokio::test]
async fn test_pivot_failure_at_first_step_skips_second() {
    let (engine, loader) = engine();
    let outcome = engine.translate_batch(&["ok", "FAIL"], "hi", "zh").await.unwrap();

    assert_eq!(outcome.results[0].text, "zho_Hans:eng_Latn:ok");
    let failure = outcome.results[1].error.as_ref().unwrap();
    assert_eq!(failure.step, Some(0));
    assert_eq!(outcome.stats.failed, 1);
    // Two calls for "ok", one for the failed unit
    assert_eq!(loader.calls(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_results_keep_input_order() {
    let loader = Arc::new(MarkerLoader {
        infer_delay: Some(Duration::from_millis(40)),
        ..Default::default()
    });
    let engine = engine_with(loader);
    let units = vec!["a", "bb", "ccc", "dddd", "eeeee", "ffffff"];

    let options = BatchOptions::with_concurrency(4);
    let outcome = engine.translate_batch_with(&units, "en", "zh", &options).await.unwrap();

    let texts: Vec<_> = outcome.results.iter().map(|r| r.text.as_str()).collect();
    let expected: Vec<_> = units.iter().map(|u| format!("zho_Hans:{u}")).collect();
    assert_eq!(texts, expected);
}

#[tokio::test]
async fn test_cancel_before_run_skips_everything() {
    let (engine, loader) = engine();
    let cancel = CancelToken::new();
    cancel.cancel();
    let options = BatchOptions {
        cancel: Some(cancel),
        ..Default::default()
    };

    let outcome = engine.translate_batch_with(&["a", "b"], "en", "hi", &options).await.unwrap();
    assert_eq!(outcome.stats.skipped, 2);
    assert_eq!(outcome.stats.attempted, 0);
    assert!(outcome.results.iter().all(|r| r.is_cancelled()));
    assert_eq!(loader.loads(), 0);
}

#[tokio::test]
async fn test_cancel_mid_run_keeps_finished_units() {
    let (engine, _) = engine();
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let options = BatchOptions {
        concurrency: 1,
        cancel: Some(cancel),
        progress: Some(Arc::new(move |done, _total| {
            if done == 1 {
                trigger.cancel();
            }
        })),
    };

    let outcome = engine
        .translate_batch_with(&["first", "second", "third"], "en", "hi", &options)
        .await
        .unwrap();

    assert_eq!(outcome.results[0].text, "hin_Deva:first");
    assert!(outcome.results[1].is_cancelled());
    assert!(outcome.results[2].is_cancelled());
    assert_eq!(outcome.stats.succeeded, 1);
    assert_eq!(outcome.stats.skipped, 2);
}

#[tokio::test]
async fn test_progress_reports_every_unit() {
    let (engine, _) = engine();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let options = BatchOptions {
        progress: Some(Arc::new(move |_, total| {
            assert_eq!(total, 3);
            counter.fetch_add(1, Ordering::SeqCst);
        })),
        ..Default::default()
    };

    engine.translate_batch_with(&["a", "", "c"], "en", "ur", &options).await.unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

// =============================================================================
// Result Cache Tests
// =============================================================================

#[tokio::test]
async fn test_disk_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        cache: CacheConfig {
            memory_enabled: false,
            disk_enabled: true,
            disk_path: Some(dir.path().join("cache")),
            ..Default::default()
        },
        ..Default::default()
    };

    {
        let engine = Engine::with_loader(&config, Arc::new(MarkerLoader::default())).unwrap();
        engine.translate_one("hello", "en", "hi").await.unwrap();
        engine.flush_cache();
    }

    let loader = Arc::new(MarkerLoader::default());
    let engine = Engine::with_loader(&config, loader.clone()).unwrap();
    let result = engine.translate_one("hello", "en", "hi").await.unwrap();
    assert_eq!(result.text, "hin_Deva:hello");
    assert_eq!(loader.loads(), 0);
}

// =============================================================================
// File Translation Tests
// =============================================================================

fn file_translator() -> FileTranslator {
    let (engine, _) = engine();
    FileTranslator::new(Arc::new(engine))
}

#[tokio::test]
async fn test_text_file_preserves_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("story.txt");
    std::fs::write(&input, "Once upon a time\n\n  indented\nFAIL here\n").unwrap();

    let stats = file_translator()
        .translate_file(&input, None, "en", "hi", &FileOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.output, dir.path().join("story_translated_hin_Deva.txt"));
    assert_eq!(stats.format, FileFormat::Txt);
    assert_eq!(stats.units, 3);
    assert_eq!(stats.batch.failed, 1);

    let output = std::fs::read_to_string(&stats.output).unwrap();
    assert_eq!(output, "hin_Deva:Once upon a time\n\n  hin_Deva:indented\nFAIL here\n");
}

#[tokio::test]
async fn test_text_file_as_single_unit() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("note.txt");
    let output = dir.path().join("out").join("note.txt");
    std::fs::write(&input, "one\n\ntwo").unwrap();

    let options = FileOptions {
        preserve_formatting: false,
        ..Default::default()
    };
    let stats = file_translator()
        .translate_file(&input, Some(&output), "en", "zh", &options)
        .await
        .unwrap();

    assert_eq!(stats.units, 1);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "zho_Hans:one\n\ntwo");
}

#[tokio::test]
async fn test_json_file_respects_fields() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("data.json");
    std::fs::write(
        &input,
        r#"{"id": "x1", "title": "Hello", "items": [{"title": "World", "count": 2}]}"#,
    )
    .unwrap();

    let options = FileOptions {
        fields: Some(vec!["title".to_string()]),
        ..Default::default()
    };
    let stats = file_translator()
        .translate_file(&input, None, "en", "ur", &options)
        .await
        .unwrap();
    assert_eq!(stats.units, 2);

    let output: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&stats.output).unwrap()).unwrap();
    assert_eq!(output["id"], "x1");
    assert_eq!(output["title"], "urd_Arab:Hello");
    assert_eq!(output["items"][0]["title"], "urd_Arab:World");
    assert_eq!(output["items"][0]["count"], 2);

    // Key order is kept
    let text = std::fs::read_to_string(&stats.output).unwrap();
    assert!(text.find("\"id\"").unwrap() < text.find("\"title\"").unwrap());
}

#[tokio::test]
async fn test_csv_file_translates_selected_columns() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("rows.csv");
    std::fs::write(&input, "id,text,note\n1,Hello,keep\n2,,keep\n3,FAIL,keep\n").unwrap();

    let options = FileOptions {
        columns: Some(vec!["text".to_string(), "missing".to_string()]),
        ..Default::default()
    };
    let stats = file_translator()
        .translate_file(&input, None, "en", "hi", &options)
        .await
        .unwrap();

    assert_eq!(stats.units, 2);
    assert_eq!(stats.batch.succeeded, 1);
    assert_eq!(stats.batch.failed, 1);
    assert_eq!(
        std::fs::read_to_string(&stats.output).unwrap(),
        "id,text,note\n1,hin_Deva:Hello,keep\n2,,keep\n3,FAIL,keep\n"
    );
}

#[tokio::test]
async fn test_unsupported_file_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("slides.pptx");
    std::fs::write(&input, "binary").unwrap();

    let err = file_translator()
        .translate_file(&input, None, "en", "hi", &FileOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
}
