use async_trait::async_trait;
use std::sync::Arc;

use crate::directory::ModelDescriptor;
use crate::error::Result;

/// A loaded model bound to one descriptor
#[async_trait]
pub trait TranslationModel: Send + Sync {
    /// Translate `text` from the model's source into its target language.
    ///
    /// May be slow (seconds). Errors are opaque to the router and get
    /// wrapped as a failed plan step.
    async fn infer(&self, text: &str) -> Result<String>;
}

/// Loads model instances for descriptors
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load the model for `descriptor`.
    ///
    /// Expensive; the model cache calls this at most once per live
    /// instance. Failures should be `Error::ModelLoad`.
    async fn load(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn TranslationModel>>;

    /// Backend name for logs and `--info`
    fn name(&self) -> &'static str;
}
