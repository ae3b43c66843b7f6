//! Route planning over the model directory.
//!
//! Routes are direct (one model) or go through the single configured pivot
//! (two models). There is no general graph search: a pair with neither a
//! direct model nor both pivot legs has no route.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::directory::{ModelDirectory, ModelDescriptor};
use crate::error::{Error, Result};
use crate::language::{LanguageCode, LanguageRegistry};

/// How a plan gets from source to target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Same language: text passes through unchanged
    PassThrough,
    Direct,
    Pivot,
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::PassThrough => "pass-through",
            Self::Direct => "direct",
            Self::Pivot => "multi-step",
        })
    }
}

/// Ordered model steps from a source language to a target language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePlan {
    source: LanguageCode,
    target: LanguageCode,
    steps: Vec<Arc<ModelDescriptor>>,
}

impl RoutePlan {
    /// Zero-step plan
    pub fn pass_through(language: LanguageCode) -> Self {
        Self {
            source: language.clone(),
            target: language,
            steps: Vec::new(),
        }
    }

    pub fn direct(model: Arc<ModelDescriptor>) -> Self {
        Self {
            source: model.source().clone(),
            target: model.target().clone(),
            steps: vec![model],
        }
    }

    /// Two-step plan; `first` must end where `second` starts
    pub fn two_step(first: Arc<ModelDescriptor>, second: Arc<ModelDescriptor>) -> Result<Self> {
        if first.target() != second.source() {
            return Err(Error::InvalidPlan {
                first: first.to_string(),
                second: second.to_string(),
            });
        }

        Ok(Self {
            source: first.source().clone(),
            target: second.target().clone(),
            steps: vec![first, second],
        })
    }

    pub const fn source(&self) -> &LanguageCode {
        &self.source
    }

    pub const fn target(&self) -> &LanguageCode {
        &self.target
    }

    pub fn steps(&self) -> &[Arc<ModelDescriptor>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn kind(&self) -> RouteKind {
        match self.steps.len() {
            0 => RouteKind::PassThrough,
            1 => RouteKind::Direct,
            _ => RouteKind::Pivot,
        }
    }

    /// Language between the two steps of a pivot plan
    pub fn intermediate(&self) -> Option<&LanguageCode> {
        match self.steps.as_slice() {
            [first, _] => Some(first.target()),
            _ => None,
        }
    }

    /// Model handles in step order
    pub fn handles(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.handle()).collect()
    }
}

impl std::fmt::Display for RoutePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)?;
        for step in &self.steps {
            write!(f, " -> {}", step.target())?;
        }
        if self.steps.is_empty() {
            write!(f, " (unchanged)")?;
        }
        Ok(())
    }
}

/// Computes route plans. Stateless over read-only tables, so cheap to share.
#[derive(Debug, Clone)]
pub struct RoutePlanner {
    registry: Arc<LanguageRegistry>,
    directory: Arc<ModelDirectory>,
}

impl RoutePlanner {
    pub const fn new(registry: Arc<LanguageRegistry>, directory: Arc<ModelDirectory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    pub fn plan(&self, source: &str, target: &str) -> Result<RoutePlan> {
        let source = self.registry.canonicalize(source)?;
        let target = self.registry.canonicalize(target)?;
        self.plan_canonical(&source, &target)
    }

    /// Plan between codes that are already canonical
    pub fn plan_canonical(&self, source: &LanguageCode, target: &LanguageCode) -> Result<RoutePlan> {
        if source == target {
            debug!("Route {}: same language, passing through", source);
            return Ok(RoutePlan::pass_through(source.clone()));
        }

        if let Ok(model) = self.directory.lookup_direct(source, target) {
            debug!("Route {} -> {}: direct via {}", source, target, model.handle());
            return Ok(RoutePlan::direct(Arc::clone(model)));
        }

        let pivot = self.directory.pivot();
        let to_pivot = self.directory.lookup_direct(source, pivot);
        let from_pivot = self.directory.lookup_direct(pivot, target);

        match (to_pivot, from_pivot) {
            (Ok(first), Ok(second)) => {
                debug!("Route {} -> {}: via pivot {}", source, target, pivot);
                RoutePlan::two_step(Arc::clone(first), Arc::clone(second))
            }
            _ => Err(Error::NoRouteAvailable {
                from: source.to_string(),
                to: target.to_string(),
                pivot: pivot.to_string(),
            }),
        }
    }

    /// Targets reachable from `source`, directly or also through the pivot
    pub fn available_targets(&self, source: &str, include_multistep: bool) -> Result<Vec<LanguageCode>> {
        let source = self.registry.canonicalize(source)?;

        if !include_multistep {
            return Ok(self.directory.direct_targets(&source));
        }

        Ok(self
            .registry
            .languages()
            .iter()
            .map(|language| &language.code)
            .filter(|&code| code != &source)
            .filter(|&code| self.plan_canonical(&source, code).is_ok())
            .cloned()
            .collect())
    }

    pub fn registry(&self) -> &Arc<LanguageRegistry> {
        &self.registry
    }

    pub fn directory(&self) -> &Arc<ModelDirectory> {
        &self.directory
    }
}
