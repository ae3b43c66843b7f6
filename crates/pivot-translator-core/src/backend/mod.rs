mod http;
mod traits;

pub use http::{HttpModel, HttpModelLoader};
pub use traits::{ModelLoader, TranslationModel};

use crate::config::BackendConfig;
use crate::error::Result;
use crate::language::LanguageRegistry;
use std::sync::Arc;

/// Create a model loader from configuration
pub fn create_loader(
    config: &BackendConfig,
    registry: Arc<LanguageRegistry>,
) -> Result<Arc<dyn ModelLoader>> {
    let loader = HttpModelLoader::new(config.clone(), registry)?;

    Ok(Arc::new(loader))
}
