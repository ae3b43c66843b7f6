use serde::Serialize;
use thiserror::Error;

/// Unified error type for pivot-translator-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Routing (unknown languages, missing models, no pivot route)
/// - Model lifecycle and inference
/// - Result cache operations
/// - Configuration loading and validation
/// - File translation and general I/O
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Routing Errors
    // ==========================================================================
    /// A language code matched no registry entry or alias
    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    /// No model is registered for this exact pair
    #[error("no direct model for {from} -> {to}")]
    NoDirectModel { from: String, to: String },

    /// Neither a direct model nor a complete pivot path connects the pair
    #[error("no route available for {from} -> {to} (pivot: {pivot})")]
    NoRouteAvailable {
        from: String,
        to: String,
        pivot: String,
    },

    /// Two plan steps do not chain (first target differs from second source)
    #[error("plan steps do not chain: {first} then {second}")]
    InvalidPlan { first: String, second: String },

    // ==========================================================================
    // Model Errors
    // ==========================================================================
    /// Model data could not be loaded
    #[error("failed to load model {model}: {reason}")]
    ModelLoad { model: String, reason: String },

    /// The model was loaded but inference failed
    #[error("inference failed for model {model}: {reason}")]
    Inference { model: String, reason: String },

    /// A plan step failed; `step` is the zero-based index into the plan
    #[error("translation failed at step {step}: {cause}")]
    TranslationFailed {
        step: usize,
        #[source]
        cause: Box<Error>,
    },

    /// The run was cancelled before this unit started
    #[error("translation cancelled")]
    Cancelled,

    // ==========================================================================
    // Backend Transport Errors
    // ==========================================================================
    /// Inference server request failed
    #[error("inference request failed: {0}")]
    Request(String),

    /// Invalid response from the inference server
    #[error("invalid inference response: {0}")]
    InvalidResponse(String),

    /// Rate limited by the inference server
    #[error("rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    /// Inference request timed out
    #[error("inference request timed out")]
    Timeout,

    // ==========================================================================
    // Cache Errors
    // ==========================================================================
    /// Failed to initialize the cache
    #[error("failed to initialize cache: {0}")]
    CacheInit(String),

    /// Failed to write to cache
    #[error("failed to write to cache: {0}")]
    CacheWrite(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // File Errors
    // ==========================================================================
    /// File extension or forced format is not supported
    #[error("unsupported file format: {0} (supported: txt, json, csv)")]
    UnsupportedFormat(String),

    /// JSON document could not be parsed or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV document could not be parsed or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`], attached to per-unit results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownLanguage,
    NoDirectModel,
    NoRouteAvailable,
    ModelLoad,
    Inference,
    TranslationFailed,
    Cancelled,
    Cache,
    Config,
    File,
    Io,
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownLanguage(_) => ErrorKind::UnknownLanguage,
            Self::NoDirectModel { .. } => ErrorKind::NoDirectModel,
            Self::NoRouteAvailable { .. } | Self::InvalidPlan { .. } => {
                ErrorKind::NoRouteAvailable
            }
            Self::ModelLoad { .. } => ErrorKind::ModelLoad,
            Self::Inference { .. }
            | Self::Request(_)
            | Self::InvalidResponse(_)
            | Self::RateLimited { .. }
            | Self::Timeout => ErrorKind::Inference,
            Self::TranslationFailed { .. } => ErrorKind::TranslationFailed,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::CacheInit(_) | Self::CacheWrite(_) => ErrorKind::Cache,
            Self::ConfigLoad(_) | Self::ConfigInvalid { .. } => ErrorKind::Config,
            Self::UnsupportedFormat(_) | Self::Json(_) | Self::Csv(_) => ErrorKind::File,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Plan step that failed, if this error came out of the executor
    pub const fn step(&self) -> Option<usize> {
        match self {
            Self::TranslationFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Kind of the underlying step error, e.g. `ModelLoad` vs `Inference`
    pub fn cause_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::TranslationFailed { cause, .. } => Some(cause.kind()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_failed_carries_step_and_cause() {
        let err = Error::TranslationFailed {
            step: 1,
            cause: Box::new(Error::ModelLoad {
                model: "opus-mt-en-zh".to_string(),
                reason: "weights missing".to_string(),
            }),
        };

        assert_eq!(err.kind(), ErrorKind::TranslationFailed);
        assert_eq!(err.cause_kind(), Some(ErrorKind::ModelLoad));
        assert_eq!(err.step(), Some(1));
        let message = err.to_string();
        assert!(message.contains("step 1"));
        assert!(message.contains("weights missing"));
    }

    #[test]
    fn test_rate_limited_message() {
        let err = Error::RateLimited { retry_after: Some(7) };
        assert_eq!(err.to_string(), "rate limited, retry after 7 seconds");
        assert_eq!(Error::RateLimited { retry_after: None }.to_string(), "rate limited");
    }
}
