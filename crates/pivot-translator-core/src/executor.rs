//! Runs route plans against the model cache.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::directory::ModelDescriptor;
use crate::error::{Error, ErrorKind, Result};
use crate::model_cache::ModelCache;
use crate::planner::RoutePlan;
use crate::util::split_padding;

/// Why one unit did not translate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub kind: ErrorKind,
    /// Zero-based plan step that failed, when a model was involved
    pub step: Option<usize>,
    /// Kind of the step error behind a `TranslationFailed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<ErrorKind>,
    pub message: String,
}

impl From<&Error> for UnitFailure {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            step: error.step(),
            cause: error.cause_kind(),
            message: error.to_string(),
        }
    }
}

/// Outcome of translating one unit. Failed results carry no text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationResult {
    pub text: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<UnitFailure>,
}

impl TranslationResult {
    pub const fn success(text: String) -> Self {
        Self {
            text,
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(error: &Error) -> Self {
        Self {
            text: String::new(),
            succeeded: false,
            error: Some(UnitFailure::from(error)),
        }
    }

    pub fn cancelled() -> Self {
        Self::failure(&Error::Cancelled)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn is_cancelled(&self) -> bool {
        self.error_kind() == Some(ErrorKind::Cancelled)
    }
}

/// Chains plan steps, feeding each step's output into the next.
#[derive(Clone)]
pub struct Executor {
    cache: Arc<ModelCache>,
}

impl Executor {
    pub const fn new(cache: Arc<ModelCache>) -> Self {
        Self { cache }
    }

    pub const fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// Execute `plan` on `text`. Failures come back inside the result.
    pub async fn execute(&self, plan: &RoutePlan, text: &str) -> TranslationResult {
        match self.run(plan, text).await {
            Ok(translated) => TranslationResult::success(translated),
            Err(e) => TranslationResult::failure(&e),
        }
    }

    /// Execute `plan` on `text`, returning the step error on failure.
    ///
    /// Blank text and zero-step plans return the input without touching
    /// any model. Leading and trailing whitespace is kept verbatim.
    pub async fn run(&self, plan: &RoutePlan, text: &str) -> Result<String> {
        if plan.is_empty() {
            return Ok(text.to_string());
        }

        let (leading, content, trailing) = split_padding(text);
        if content.is_empty() {
            return Ok(text.to_string());
        }

        let mut current = content.to_string();
        for (step, model) in plan.steps().iter().enumerate() {
            current = self.run_step(model, &current).await.map_err(|cause| {
                warn!("Step {} ({}) failed: {}", step, model, cause);
                Error::TranslationFailed {
                    step,
                    cause: Box::new(cause),
                }
            })?;
            debug!("Step {} ({}) done", step, model.handle());
        }

        Ok(format!("{leading}{current}{trailing}"))
    }

    async fn run_step(&self, model: &Arc<ModelDescriptor>, text: &str) -> Result<String> {
        let lease = self.cache.acquire(model).await?;
        let output = lease.infer(text).await;
        lease.release();
        output.map(|translated| translated.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ModelLoader, TranslationModel};
    use crate::language::LanguageRegistry;
    use async_trait::async_trait;

    /// Tags text with the model handle so step order is visible
    struct Tagger(String);

    #[async_trait]
    impl TranslationModel for Tagger {
        async fn infer(&self, text: &str) -> Result<String> {
            if text.contains("poison") {
                return Err(Error::Inference {
                    model: self.0.clone(),
                    reason: "bad input".to_string(),
                });
            }
            Ok(format!("{}[{}]", self.0, text))
        }
    }

    struct TaggerLoader;

    #[async_trait]
    impl ModelLoader for TaggerLoader {
        async fn load(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn TranslationModel>> {
            if descriptor.handle() == "missing" {
                return Err(Error::ModelLoad {
                    model: descriptor.handle().to_string(),
                    reason: "no weights".to_string(),
                });
            }
            Ok(Arc::new(Tagger(descriptor.handle().to_string())))
        }

        fn name(&self) -> &'static str {
            "tagger"
        }
    }

    fn model(src: &str, tgt: &str, handle: &str) -> Arc<ModelDescriptor> {
        let registry = LanguageRegistry::builtin();
        Arc::new(ModelDescriptor::new(
            registry.canonicalize(src).unwrap(),
            registry.canonicalize(tgt).unwrap(),
            handle,
        ))
    }

    fn executor() -> Executor {
        Executor::new(Arc::new(ModelCache::new(Arc::new(TaggerLoader))))
    }

    #[tokio::test]
    async fn test_pivot_chains_output_into_next_step() {
        let plan = RoutePlan::two_step(model("hi", "en", "a"), model("en", "zh", "b")).unwrap();
        let result = executor().execute(&plan, "namaste").await;
        assert_eq!(result, TranslationResult::success("b[a[namaste]]".to_string()));
    }

    #[tokio::test]
    async fn test_whitespace_is_preserved() {
        let plan = RoutePlan::direct(model("en", "hi", "a"));
        let result = executor().execute(&plan, "\n  hello \t").await;
        assert_eq!(result.text, "\n  a[hello] \t");
    }

    #[tokio::test]
    async fn test_blank_text_never_loads_a_model() {
        let executor = executor();
        let plan = RoutePlan::direct(model("en", "hi", "missing"));
        for text in ["", "   ", "\n"] {
            let result = executor.execute(&plan, text).await;
            assert!(result.succeeded);
            assert_eq!(result.text, text);
        }
        assert_eq!(executor.cache().stats().acquires, 0);
    }

    #[tokio::test]
    async fn test_failed_first_step_skips_second() {
        let executor = executor();
        let plan = RoutePlan::two_step(model("hi", "en", "missing"), model("en", "zh", "b")).unwrap();
        let result = executor.execute(&plan, "namaste").await;

        assert!(!result.succeeded);
        assert!(result.text.is_empty());
        let failure = result.error.unwrap();
        assert_eq!(failure.kind, ErrorKind::TranslationFailed);
        assert_eq!(failure.step, Some(0));
        assert_eq!(failure.cause, Some(ErrorKind::ModelLoad));
        assert!(failure.message.contains("no weights"));
        assert_eq!(executor.cache().stats().acquires, 1);
    }

    #[tokio::test]
    async fn test_inference_failure_reports_step() {
        let plan = RoutePlan::two_step(model("hi", "en", "a"), model("en", "zh", "b")).unwrap();
        let err = executor().run(&plan, "poison").await.unwrap_err();
        assert_eq!(err.step(), Some(0));
        assert!(matches!(
            err,
            Error::TranslationFailed { ref cause, .. } if matches!(**cause, Error::Inference { .. })
        ));
    }

    #[tokio::test]
    async fn test_inference_failure_cause_is_kept() {
        let plan = RoutePlan::two_step(model("hi", "en", "a"), model("en", "zh", "b")).unwrap();
        let result = executor().execute(&plan, "poison").await;
        let failure = result.error.unwrap();
        assert_eq!(failure.kind, ErrorKind::TranslationFailed);
        assert_eq!(failure.cause, Some(ErrorKind::Inference));
    }
}
