//! Loaded-model cache.
//!
//! Each descriptor maps to one slot holding a `tokio::sync::OnceCell`.
//! Concurrent acquirers of an unloaded descriptor share the cell, so the
//! loader runs once and every caller gets the same instance. Reference
//! counts live in the slot table behind a synchronous mutex that is never
//! held across an await.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::backend::{ModelLoader, TranslationModel};
use crate::directory::ModelDescriptor;
use crate::error::{Error, Result};

type LoadOutcome = std::result::Result<Arc<dyn TranslationModel>, String>;

struct Slot {
    descriptor: Arc<ModelDescriptor>,
    cell: OnceCell<LoadOutcome>,
}

impl Slot {
    fn is_loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }
}

struct Entry {
    slot: Arc<Slot>,
    refs: usize,
    last_used: u64,
}

/// Counters describing cache activity since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub acquires: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub evictions: u64,
    /// Instances currently live
    pub loaded: usize,
}

#[derive(Default)]
struct Counters {
    acquires: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
}

/// Owns every live model instance.
pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    entries: Mutex<HashMap<ModelDescriptor, Entry>>,
    max_loaded: Option<usize>,
    clock: AtomicU64,
    counters: Counters,
}

impl ModelCache {
    /// Cache that never evicts
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self::with_limit(loader, None)
    }

    /// Cache that evicts idle instances once more than `max_loaded` are live
    pub fn with_limit(loader: Arc<dyn ModelLoader>, max_loaded: Option<usize>) -> Self {
        Self {
            loader,
            entries: Mutex::new(HashMap::new()),
            max_loaded,
            clock: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ModelDescriptor, Entry>> {
        // Bookkeeping stays consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Get the live instance for `descriptor`, loading it if needed.
    ///
    /// The returned lease holds a reference; the instance cannot be
    /// evicted until every lease is dropped.
    pub async fn acquire(&self, descriptor: &Arc<ModelDescriptor>) -> Result<ModelLease<'_>> {
        self.counters.acquires.fetch_add(1, Ordering::Relaxed);

        let slot = {
            let now = self.tick();
            let mut entries = self.entries();
            let entry = entries
                .entry(descriptor.as_ref().clone())
                .or_insert_with(|| Entry {
                    slot: Arc::new(Slot {
                        descriptor: Arc::clone(descriptor),
                        cell: OnceCell::new(),
                    }),
                    refs: 0,
                    last_used: now,
                });
            entry.refs += 1;
            entry.last_used = now;
            Arc::clone(&entry.slot)
        };

        // Released on drop, including when this future is cancelled mid-load
        let guard = RefGuard {
            cache: self,
            slot,
        };

        if guard.slot.cell.initialized() {
            debug!("Using cached model {}", guard.slot.descriptor);
        }

        let outcome = guard
            .slot
            .cell
            .get_or_init(|| self.load(&guard.slot.descriptor))
            .await
            .clone();

        match outcome {
            Ok(model) => {
                self.evict_over_limit();
                Ok(ModelLease { guard, model })
            }
            Err(reason) => Err(Error::ModelLoad {
                model: guard.slot.descriptor.handle().to_string(),
                reason,
            }),
        }
    }

    async fn load(&self, descriptor: &ModelDescriptor) -> LoadOutcome {
        self.counters.loads.fetch_add(1, Ordering::Relaxed);
        info!("Loading model {}", descriptor);
        let start = Instant::now();

        match self.loader.load(descriptor).await {
            Ok(model) => {
                info!(
                    "Model {} loaded in {:.2}s",
                    descriptor.handle(),
                    start.elapsed().as_secs_f64()
                );
                Ok(model)
            }
            Err(e) => {
                self.counters.load_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to load model {}: {}", descriptor, e);
                // Keep the loader's reason without repeating the model name
                Err(match e {
                    Error::ModelLoad { reason, .. } => reason,
                    other => other.to_string(),
                })
            }
        }
    }

    fn release(&self, slot: &Slot) {
        let mut entries = self.entries();
        let key = slot.descriptor.as_ref();

        let drop_entry = match entries.get_mut(key) {
            Some(entry) => {
                entry.refs = entry.refs.saturating_sub(1);
                // Failed or abandoned loads are forgotten so a later acquire retries
                entry.refs == 0 && !entry.slot.is_loaded()
            }
            None => false,
        };

        if drop_entry {
            entries.remove(key);
        }
    }

    fn evict_over_limit(&self) {
        let Some(limit) = self.max_loaded else {
            return;
        };

        let mut entries = self.entries();
        let mut loaded = entries.values().filter(|e| e.slot.is_loaded()).count();

        while loaded > limit {
            let victim = entries
                .iter()
                .filter(|(_, e)| e.refs == 0 && e.slot.is_loaded())
                .min_by_key(|(_, e)| e.last_used)
                .map(|(key, _)| key.clone());

            let Some(key) = victim else {
                debug!("{} models loaded (limit {}), none idle", loaded, limit);
                break;
            };

            entries.remove(&key);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            info!("Evicted idle model {}", key);
            loaded -= 1;
        }
    }

    /// Drop the instance for `descriptor` if nothing holds it.
    ///
    /// Returns false if it is in use or was never loaded.
    pub fn unload(&self, descriptor: &ModelDescriptor) -> bool {
        let mut entries = self.entries();
        let idle = entries
            .get(descriptor)
            .is_some_and(|e| e.refs == 0 && e.slot.is_loaded());

        if idle {
            entries.remove(descriptor);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            info!("Unloaded model {}", descriptor);
        }
        idle
    }

    /// Drop every instance nothing holds. Returns how many were dropped.
    pub fn evict_idle(&self) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, e| e.refs > 0);
        let evicted = before - entries.len();
        self.counters
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    pub fn is_loaded(&self, descriptor: &ModelDescriptor) -> bool {
        self.entries()
            .get(descriptor)
            .is_some_and(|e| e.slot.is_loaded())
    }

    /// Active leases on `descriptor`
    pub fn ref_count(&self, descriptor: &ModelDescriptor) -> usize {
        self.entries().get(descriptor).map_or(0, |e| e.refs)
    }

    pub fn loaded_models(&self) -> Vec<ModelDescriptor> {
        let mut loaded: Vec<_> = self
            .entries()
            .iter()
            .filter(|(_, e)| e.slot.is_loaded())
            .map(|(key, _)| key.clone())
            .collect();
        loaded.sort_by(|a, b| a.handle().cmp(b.handle()).then_with(|| a.source().cmp(b.source())));
        loaded
    }

    pub fn stats(&self) -> CacheStats {
        let loaded = self
            .entries()
            .values()
            .filter(|e| e.slot.is_loaded())
            .count();

        CacheStats {
            acquires: self.counters.acquires.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            load_failures: self.counters.load_failures.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            loaded,
        }
    }

    pub fn loader_name(&self) -> &'static str {
        self.loader.name()
    }
}

struct RefGuard<'a> {
    cache: &'a ModelCache,
    slot: Arc<Slot>,
}

impl Drop for RefGuard<'_> {
    fn drop(&mut self) {
        self.cache.release(&self.slot);
    }
}

/// A counted reference to a live model. Dropping it releases the model.
pub struct ModelLease<'a> {
    guard: RefGuard<'a>,
    model: Arc<dyn TranslationModel>,
}

impl ModelLease<'_> {
    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        &self.guard.slot.descriptor
    }

    pub fn model(&self) -> &Arc<dyn TranslationModel> {
        &self.model
    }

    pub async fn infer(&self, text: &str) -> Result<String> {
        self.model.infer(text).await
    }

    /// Release explicitly; equivalent to dropping the lease
    pub fn release(self) {}
}
