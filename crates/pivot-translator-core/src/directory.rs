//! Model directory: which direct models are installed, plus the pivot.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AppConfig, ModelEntry};
use crate::error::{Error, Result};
use crate::language::{LanguageCode, LanguageRegistry};

/// One installed translation model. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModelDescriptor {
    source: LanguageCode,
    target: LanguageCode,
    handle: String,
}

impl ModelDescriptor {
    pub fn new(source: LanguageCode, target: LanguageCode, handle: impl Into<String>) -> Self {
        Self {
            source,
            target,
            handle: handle.into(),
        }
    }

    pub const fn source(&self) -> &LanguageCode {
        &self.source
    }

    pub const fn target(&self) -> &LanguageCode {
        &self.target
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }
}

impl std::fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} -> {})", self.handle, self.source, self.target)
    }
}

/// Read-only table of direct models keyed by (source, target).
#[derive(Debug, Clone)]
pub struct ModelDirectory {
    descriptors: Vec<Arc<ModelDescriptor>>,
    index: HashMap<(LanguageCode, LanguageCode), usize>,
    pivot: LanguageCode,
}

impl ModelDirectory {
    /// Build the directory, canonicalizing every code through `registry`.
    pub fn new(registry: &LanguageRegistry, pivot: &str, models: &[ModelEntry]) -> Result<Self> {
        let pivot = registry.canonicalize(pivot).map_err(|_| Error::ConfigInvalid {
            field: "pivot".to_string(),
            reason: format!("unknown language '{pivot}'"),
        })?;

        let mut directory = Self {
            descriptors: Vec::with_capacity(models.len()),
            index: HashMap::with_capacity(models.len()),
            pivot,
        };

        for entry in models {
            let source = canonical_field(registry, "models.source", &entry.source)?;
            let target = canonical_field(registry, "models.target", &entry.target)?;

            if source == target {
                return Err(Error::ConfigInvalid {
                    field: "models".to_string(),
                    reason: format!("model {} translates {source} into itself", entry.handle),
                });
            }

            let key = (source.clone(), target.clone());
            if directory.index.contains_key(&key) {
                return Err(Error::ConfigInvalid {
                    field: "models".to_string(),
                    reason: format!("duplicate model for {source} -> {target}"),
                });
            }

            directory.index.insert(key, directory.descriptors.len());
            directory
                .descriptors
                .push(Arc::new(ModelDescriptor::new(source, target, entry.handle.trim())));
        }

        tracing::debug!(
            "Model directory: {} models, pivot {}",
            directory.descriptors.len(),
            directory.pivot
        );

        Ok(directory)
    }

    pub fn from_config(config: &AppConfig, registry: &LanguageRegistry) -> Result<Self> {
        Self::new(registry, &config.pivot, &config.models)
    }

    pub fn has_direct(&self, source: &LanguageCode, target: &LanguageCode) -> bool {
        self.index.contains_key(&(source.clone(), target.clone()))
    }

    pub fn lookup_direct(
        &self,
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> Result<&Arc<ModelDescriptor>> {
        self.index
            .get(&(source.clone(), target.clone()))
            .map(|&position| &self.descriptors[position])
            .ok_or_else(|| Error::NoDirectModel {
                from: source.to_string(),
                to: target.to_string(),
            })
    }

    /// Languages usable as an intermediate hop. Always exactly the pivot.
    pub fn pivot_candidates(&self) -> Vec<LanguageCode> {
        vec![self.pivot.clone()]
    }

    pub const fn pivot(&self) -> &LanguageCode {
        &self.pivot
    }

    pub fn descriptors(&self) -> &[Arc<ModelDescriptor>] {
        &self.descriptors
    }

    /// Targets reachable from `source` with a single model
    pub fn direct_targets(&self, source: &LanguageCode) -> Vec<LanguageCode> {
        self.descriptors
            .iter()
            .filter(|d| d.source() == source)
            .map(|d| d.target().clone())
            .collect()
    }
}

fn canonical_field(registry: &LanguageRegistry, field: &str, code: &str) -> Result<LanguageCode> {
    registry.canonicalize(code).map_err(|_| Error::ConfigInvalid {
        field: field.to_string(),
        reason: format!("unknown language '{code}'"),
    })
}
