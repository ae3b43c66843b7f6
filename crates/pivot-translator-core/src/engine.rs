//! The routing engine: the entry point CLI and server layers call into.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::{ModelLoader, create_loader};
use crate::batch::{BatchDriver, BatchOptions, BatchOutcome};
use crate::cache::TranslationCache;
use crate::config::AppConfig;
use crate::directory::{ModelDescriptor, ModelDirectory};
use crate::error::Result;
use crate::executor::{Executor, TranslationResult};
use crate::language::{Language, LanguageCode, LanguageRegistry};
use crate::model_cache::{CacheStats, ModelCache};
use crate::planner::{RoutePlan, RoutePlanner};
use crate::translator::{Translator, TranslatorInfo};

/// Snapshot of what the engine can do and what it has loaded
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub backend: &'static str,
    pub pivot: LanguageCode,
    pub languages: Vec<Language>,
    pub models: Vec<ModelDescriptor>,
    pub loaded_models: Vec<ModelDescriptor>,
    pub model_cache: CacheStats,
    pub result_cache_enabled: bool,
}

/// Plans routes and runs them. Cheap to share behind an `Arc`.
pub struct Engine {
    planner: RoutePlanner,
    driver: BatchDriver,
    result_cache: Option<Arc<TranslationCache>>,
    concurrency: usize,
}

impl Engine {
    /// Create an engine backed by the configured inference server
    pub fn new(config: &AppConfig) -> Result<Self> {
        let registry = Arc::new(LanguageRegistry::with_extra(config.languages.clone())?);
        let loader = create_loader(&config.backend, Arc::clone(&registry))?;
        Self::assemble(config, registry, loader)
    }

    /// Create with a custom model loader
    pub fn with_loader(config: &AppConfig, loader: Arc<dyn ModelLoader>) -> Result<Self> {
        let registry = Arc::new(LanguageRegistry::with_extra(config.languages.clone())?);
        Self::assemble(config, registry, loader)
    }

    fn assemble(
        config: &AppConfig,
        registry: Arc<LanguageRegistry>,
        loader: Arc<dyn ModelLoader>,
    ) -> Result<Self> {
        config.validate()?;

        let directory = Arc::new(ModelDirectory::from_config(config, &registry)?);
        let model_cache = Arc::new(ModelCache::with_limit(loader, config.model_cache.max_loaded));
        let result_cache = TranslationCache::new(&config.cache)?.map(Arc::new);

        info!(
            "Engine ready: {} languages, {} models, pivot {}, backend {}",
            registry.languages().len(),
            directory.descriptors().len(),
            directory.pivot(),
            model_cache.loader_name()
        );

        Ok(Self {
            planner: RoutePlanner::new(registry, directory),
            driver: BatchDriver::new(Executor::new(model_cache), result_cache.clone()),
            result_cache,
            concurrency: config.batch.concurrency.max(1),
        })
    }

    pub fn plan(&self, source: &str, target: &str) -> Result<RoutePlan> {
        self.planner.plan(source, target)
    }

    /// Translate a single unit.
    ///
    /// Unknown languages and unroutable pairs are `Err`; model failures come
    /// back as a failed result.
    pub async fn translate_one(&self, text: &str, source: &str, target: &str) -> Result<TranslationResult> {
        let plan = self.plan(source, target)?;
        debug!("Translating one unit via {}", plan);
        Ok(self.driver.translate_unit(&plan, text).await)
    }

    /// Translate many units with one plan and the configured concurrency
    pub async fn translate_batch<S: AsRef<str>>(
        &self,
        units: &[S],
        source: &str,
        target: &str,
    ) -> Result<BatchOutcome> {
        let options = BatchOptions::with_concurrency(self.concurrency);
        self.translate_batch_with(units, source, target, &options).await
    }

    pub async fn translate_batch_with<S: AsRef<str>>(
        &self,
        units: &[S],
        source: &str,
        target: &str,
        options: &BatchOptions,
    ) -> Result<BatchOutcome> {
        let plan = self.plan(source, target)?;
        info!("Translating {} units via {} ({})", units.len(), plan, plan.kind());
        Ok(self.driver.run(&plan, units, options).await)
    }

    pub fn available_targets(&self, source: &str, include_multistep: bool) -> Result<Vec<LanguageCode>> {
        self.planner.available_targets(source, include_multistep)
    }

    pub fn info(&self) -> EngineInfo {
        let model_cache = self.model_cache();
        EngineInfo {
            backend: model_cache.loader_name(),
            pivot: self.planner.directory().pivot().clone(),
            languages: self.planner.registry().languages().to_vec(),
            models: self
                .planner
                .directory()
                .descriptors()
                .iter()
                .map(|d| d.as_ref().clone())
                .collect(),
            loaded_models: model_cache.loaded_models(),
            model_cache: model_cache.stats(),
            result_cache_enabled: self.result_cache.is_some(),
        }
    }

    pub fn registry(&self) -> &Arc<LanguageRegistry> {
        self.planner.registry()
    }

    pub fn directory(&self) -> &Arc<ModelDirectory> {
        self.planner.directory()
    }

    pub const fn model_cache(&self) -> &Arc<ModelCache> {
        self.driver.executor().cache()
    }

    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Persist pending result-cache writes
    pub fn flush_cache(&self) {
        if let Some(cache) = &self.result_cache {
            cache.flush();
        }
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.result_cache {
            cache.clear();
        }
    }
}

#[async_trait]
impl Translator for Engine {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "Pivot Router",
            supports_pivot: true,
        }
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let plan = self.plan(source, target)?;
        self.driver.executor().run(&plan, text).await
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pivot", self.planner.directory().pivot())
            .field("models", &self.planner.directory().descriptors().len())
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TranslationModel;
    use crate::config::CacheConfig;
    use crate::error::ErrorKind;

    struct Echo;

    #[async_trait]
    impl TranslationModel for Echo {
        async fn infer(&self, text: &str) -> Result<String> {
            Ok(format!("<{text}>"))
        }
    }

    struct EchoLoader;

    #[async_trait]
    impl ModelLoader for EchoLoader {
        async fn load(&self, _descriptor: &ModelDescriptor) -> Result<Arc<dyn TranslationModel>> {
            Ok(Arc::new(Echo))
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    fn engine(cache: CacheConfig) -> Engine {
        let config = AppConfig {
            cache,
            ..Default::default()
        };
        Engine::with_loader(&config, Arc::new(EchoLoader)).unwrap()
    }

    #[tokio::test]
    async fn test_translator_trait_routes_via_pivot() {
        let engine = engine(CacheConfig::disabled());
        let translator: &dyn Translator = &engine;
        assert_eq!(translator.translate("नमस्ते", "hi", "zh").await.unwrap(), "<<नमस्ते>>");
        assert_eq!(translator.name(), "Pivot Router");
    }

    #[tokio::test]
    async fn test_unknown_language_rejected_before_model_work() {
        let engine = engine(CacheConfig::disabled());
        let err = engine.translate_one("hello", "en", "xx").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownLanguage);
        assert_eq!(engine.model_cache().stats().acquires, 0);
    }

    #[tokio::test]
    async fn test_result_cache_skips_model_on_repeat() {
        let engine = engine(CacheConfig::default());
        let first = engine.translate_one("hello", "en", "hi").await.unwrap();
        let second = engine.translate_one("hello", "en", "hi").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.model_cache().stats().acquires, 1);

        engine.clear_cache();
        engine.translate_one("hello", "en", "hi").await.unwrap();
        assert_eq!(engine.model_cache().stats().acquires, 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = AppConfig {
            pivot: "xx".to_string(),
            ..Default::default()
        };
        let err = Engine::with_loader(&config, Arc::new(EchoLoader)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_info_reports_loaded_models() {
        let engine = engine(CacheConfig::disabled());
        engine.translate_one("hi", "ur", "en").await.unwrap();

        let info = engine.info();
        assert_eq!(info.backend, "echo");
        assert_eq!(info.pivot.as_str(), "eng_Latn");
        assert_eq!(info.models.len(), 6);
        assert_eq!(info.loaded_models.len(), 1);
        assert_eq!(info.loaded_models[0].handle(), "ai4bharat/indictrans2-indic-en-dist-200M");
        assert!(!info.result_cache_enabled);
    }
}
