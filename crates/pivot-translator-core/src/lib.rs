//! Pivot Translator Core Library
//!
//! This library routes text between languages using a fixed set of
//! bilingual models:
//! - Language code canonicalization (FLORES-style codes and aliases)
//! - Route planning, direct or through a single pivot language
//! - A shared cache of loaded models with single instantiation per model
//! - Batch execution with per-unit failure isolation
//! - Result caching (memory and disk)
//! - Plain text, JSON and CSV document translation

pub mod backend;
pub mod batch;
pub mod cache;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod executor;
pub mod file;
pub mod language;
pub mod model_cache;
pub mod planner;
pub mod translator;
pub mod util;

pub use backend::{HttpModelLoader, ModelLoader, TranslationModel, create_loader};
pub use batch::{BatchOptions, BatchOutcome, BatchStats, CancelToken, ProgressFn};
pub use cache::{CacheKey, TranslationCache};
pub use config::{AppConfig, DEFAULT_PIVOT_LANG, ModelEntry};
pub use directory::{ModelDescriptor, ModelDirectory};
pub use engine::{Engine, EngineInfo};
pub use error::{Error, ErrorKind, Result};
pub use executor::{TranslationResult, UnitFailure};
pub use file::{FileFormat, FileOptions, FileStats, FileTranslator, default_output_path};
pub use language::{Language, LanguageCode, LanguageEntry, LanguageRegistry};
pub use model_cache::{CacheStats, ModelCache, ModelLease};
pub use planner::{RouteKind, RoutePlan, RoutePlanner};
pub use translator::{Translator, TranslatorInfo};
pub use util::clear_translation_cache;
