use async_trait::async_trait;

use crate::error::Result;

/// Information about a translator
#[derive(Debug, Clone)]
pub struct TranslatorInfo {
    /// Human-readable name
    pub name: &'static str,
    /// Whether pairs without a direct model can be served via a pivot
    pub supports_pivot: bool,
}

/// Anything that turns text in one language into another.
///
/// Language codes are free-form; implementations reject codes they do not
/// know with `Error::UnknownLanguage`.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Get information about this translator
    fn info(&self) -> TranslatorInfo;

    /// Get the translator name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Translate text from source language to target language
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}
