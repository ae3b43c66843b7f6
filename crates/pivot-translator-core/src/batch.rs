//! Batch driver: applies one route plan to many independent units.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

use crate::cache::{CacheKey, TranslationCache};
use crate::executor::{Executor, TranslationResult};
use crate::planner::RoutePlan;

/// Cooperative cancellation flag, checked before each unit starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Called with (units finished, total units)
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Per-run options
#[derive(Clone)]
pub struct BatchOptions {
    /// Units in flight at once
    pub concurrency: usize,
    pub cancel: Option<CancelToken>,
    pub progress: Option<ProgressFn>,
}

impl BatchOptions {
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Default::default()
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            cancel: None,
            progress: None,
        }
    }
}

impl std::fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOptions")
            .field("concurrency", &self.concurrency)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Counts for one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Units that started (succeeded + failed)
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Units never started because the run was cancelled
    pub skipped: usize,
    pub elapsed_ms: u64,
}

/// Results in input order, plus the run's stats
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: Vec<TranslationResult>,
    pub stats: BatchStats,
}

/// Runs units through the executor, consulting the result cache if any.
#[derive(Clone)]
pub struct BatchDriver {
    executor: Executor,
    result_cache: Option<Arc<TranslationCache>>,
}

impl BatchDriver {
    pub const fn new(executor: Executor, result_cache: Option<Arc<TranslationCache>>) -> Self {
        Self {
            executor,
            result_cache,
        }
    }

    pub const fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Translate one unit with an already computed plan
    pub async fn translate_unit(&self, plan: &RoutePlan, unit: &str) -> TranslationResult {
        let cache = match &self.result_cache {
            Some(cache) if !plan.is_empty() && !unit.trim().is_empty() => cache,
            _ => return self.executor.execute(plan, unit).await,
        };

        let key = CacheKey::new(unit, plan);
        if let Some(hit) = cache.get(&key).await {
            debug!("Result cache hit for {} ({} chars)", plan, unit.len());
            return TranslationResult::success(hit);
        }

        let result = self.executor.execute(plan, unit).await;
        if result.succeeded {
            cache.insert(&key, &result.text).await;
        }
        result
    }

    /// Translate every unit with `plan`.
    ///
    /// One unit's failure never stops the run. `results[i]` always belongs
    /// to `units[i]`, whatever the concurrency.
    pub async fn run<S: AsRef<str>>(
        &self,
        plan: &RoutePlan,
        units: &[S],
        options: &BatchOptions,
    ) -> BatchOutcome {
        let started = Instant::now();
        let total = units.len();
        let finished = AtomicUsize::new(0);

        let report = || {
            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = &options.progress {
                progress(done, total);
            }
        };
        let report = &report;

        let results: Vec<TranslationResult> = stream::iter(units.iter().map(|unit| async move {
            if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                report();
                return TranslationResult::cancelled();
            }

            let result = self.translate_unit(plan, unit.as_ref()).await;
            report();
            result
        }))
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

        let mut stats = BatchStats::default();
        for result in &results {
            if result.succeeded {
                stats.succeeded += 1;
            } else if result.is_cancelled() {
                stats.skipped += 1;
            } else {
                stats.failed += 1;
            }
        }
        stats.attempted = stats.succeeded + stats.failed;
        stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            "Batch {}: {} units, {} succeeded, {} failed, {} skipped in {}ms",
            plan, total, stats.succeeded, stats.failed, stats.skipped, stats.elapsed_ms
        );

        BatchOutcome { results, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_default_options() {
        let options = BatchOptions::default();
        assert_eq!(options.concurrency, 1);
        assert!(options.cancel.is_none());
        assert_eq!(BatchOptions::with_concurrency(4).concurrency, 4);
    }
}
