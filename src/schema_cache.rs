//! Registry of generated models, keyed by struct identity.
//!
//! Reads take a shared lock only; the exclusive lock is held just long enough to re-check
//! and insert a freshly built model, never while building. A model is published fully
//! built and never replaced, so every reader of an entry sees the same `Arc<Model>`.
//!
//! Self-referential struct graphs are handled with a per-thread in-flight set: when a
//! build reaches a struct that the same thread is already building, the cache hands out a
//! [`ForwardRef`] instead of recursing. The forward reference resolves through the
//! registry once the outer build has been published.

use crate::config::BridgeConfig;
use crate::descriptor::{Struct, StructId, StructType};
use crate::error::{BridgeError, Result};
use crate::schema_builder::{Model, SchemaBuilder};
use crate::type_mapper::{select_mapper, StructResolver, TypeAnnotation, TypeMapper};
use log::{debug, warn};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Registry = RwLock<HashMap<StructId, Arc<Model>>>;

thread_local! {
    /// Structs being built on this thread, per cache
    static IN_FLIGHT: RefCell<HashSet<(u64, StructId)>> = RefCell::new(HashSet::new());
}

static GLOBAL_CACHE: Lazy<SchemaCache> = Lazy::new(|| {
    let config = BridgeConfig::from_env().unwrap_or_else(|e| {
        warn!("Ignoring invalid schema bridge environment: {}", e);
        BridgeConfig::default()
    });
    SchemaCache::with_config(config)
});

/// Outcome of a cache lookup-or-build
#[derive(Debug, Clone)]
pub enum SchemaRef {
    Model(Arc<Model>),
    Forward(ForwardRef),
}

impl SchemaRef {
    pub fn model(&self) -> Option<&Arc<Model>> {
        match self {
            SchemaRef::Model(model) => Some(model),
            SchemaRef::Forward(_) => None,
        }
    }
}

/// Lazily resolved reference to a model that was still being built when it was needed
#[derive(Clone)]
pub struct ForwardRef {
    model_name: String,
    struct_id: StructId,
    registry: Weak<Registry>,
}

impl ForwardRef {
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The published model, once the build that deferred this reference has completed
    pub fn resolve(&self) -> Option<Arc<Model>> {
        let registry = self.registry.upgrade()?;
        let model = registry.read().get(&self.struct_id).cloned();
        model
    }
}

impl fmt::Debug for ForwardRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ForwardRef")
            .field("model_name", &self.model_name)
            .field("struct_id", &self.struct_id)
            .finish()
    }
}

/// Marks a struct as in flight on this thread until dropped
struct InFlightGuard {
    key: (u64, StructId),
}

impl InFlightGuard {
    /// `None` when the struct is already in flight on this thread
    fn enter(cache_id: u64, struct_id: StructId) -> Option<Self> {
        let key = (cache_id, struct_id);
        IN_FLIGHT
            .with(|in_flight| in_flight.borrow_mut().insert(key))
            .then(|| InFlightGuard { key })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        IN_FLIGHT.with(|in_flight| {
            in_flight.borrow_mut().remove(&self.key);
        });
    }
}

/// Schema cache - maps struct types to their generated models
pub struct SchemaCache {
    /// Distinguishes caches in the thread-local in-flight set
    id: u64,
    registry: Arc<Registry>,
    mapper: Box<dyn TypeMapper>,
    config: BridgeConfig,
}

impl SchemaCache {
    /// Create a cache with the default configuration
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        let mapper = select_mapper(config.mapper);
        Self::with_mapper(config, mapper)
    }

    /// Create a cache around an explicit mapper implementation
    pub fn with_mapper(config: BridgeConfig, mapper: Box<dyn TypeMapper>) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!("Initializing SchemaCache {} with {} mapper", id, mapper.name());
        Self {
            id,
            registry: Arc::new(RwLock::new(HashMap::new())),
            mapper,
            config,
        }
    }

    /// The process-wide cache, configured from the environment on first use.
    ///
    /// It is never cleared; tests should create their own caches instead.
    pub fn global() -> &'static SchemaCache {
        &GLOBAL_CACHE
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn mapper(&self) -> &dyn TypeMapper {
        self.mapper.as_ref()
    }

    /// Name of the model generated for `struct_type`
    pub fn model_name(&self, struct_type: &StructType) -> String {
        format!("{}{}", struct_type.name(), self.config.model_suffix)
    }

    /// The cached model for `struct_type`, without building
    pub fn get(&self, struct_type: &StructType) -> Option<Arc<Model>> {
        self.registry.read().get(&struct_type.id()).cloned()
    }

    /// Look up the model for `struct_type`, building it with `builder_fn` on a miss.
    ///
    /// Returns a [`SchemaRef::Forward`] when `struct_type` is already being built further
    /// up this thread's stack. When several threads build the same struct concurrently,
    /// the first insert wins and the others discard their result.
    ///
    /// # Errors
    ///
    /// Whatever `builder_fn` returns; nothing is cached for a failed build.
    pub fn get_or_build<F>(&self, struct_type: &StructType, builder_fn: F) -> Result<SchemaRef>
    where
        F: FnOnce(&StructType) -> Result<Model>,
    {
        if let Some(model) = self.get(struct_type) {
            debug!("Schema for {} already exists", struct_type.name());
            return Ok(SchemaRef::Model(model));
        }

        let Some(_guard) = InFlightGuard::enter(self.id, struct_type.id()) else {
            debug!(
                "{} is already being built on this thread, deferring with a forward reference",
                struct_type.name()
            );
            return Ok(SchemaRef::Forward(ForwardRef {
                model_name: self.model_name(struct_type),
                struct_id: struct_type.id(),
                registry: Arc::downgrade(&self.registry),
            }));
        };

        debug!("Building schema for {}", struct_type.name());
        let model = Arc::new(builder_fn(struct_type)?);

        let mut registry = self.registry.write();
        if let Some(winner) = registry.get(&struct_type.id()) {
            debug!(
                "Schema for {} was published concurrently, discarding duplicate",
                struct_type.name()
            );
            return Ok(SchemaRef::Model(winner.clone()));
        }
        registry.insert(struct_type.id(), model.clone());
        debug!("Published schema {} for {}", model.name, struct_type.name());

        Ok(SchemaRef::Model(model))
    }

    /// The model for `struct_type`, built through [`SchemaBuilder`] on first use
    pub fn model_for(&self, struct_type: &StructType) -> Result<Arc<Model>> {
        let builder = SchemaBuilder::new(self);
        match self.get_or_build(struct_type, |s| builder.build(s))? {
            SchemaRef::Model(model) => Ok(model),
            SchemaRef::Forward(_) => Err(BridgeError::schema_generation(
                struct_type.name(),
                "conversion re-entered while the struct is already being built on this thread",
            )),
        }
    }

    /// The model for a Rust [`Struct`] type
    pub fn model_of<T: Struct>(&self) -> Result<Arc<Model>> {
        self.model_for(&T::struct_type())
    }

    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().is_empty()
    }

    /// Snapshot of every published model, ordered by name
    pub fn models(&self) -> Vec<Arc<Model>> {
        let mut models: Vec<Arc<Model>> = self.registry.read().values().cloned().collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        models
    }

    /// Drop every entry. Meant for test harnesses; production caches are never cleared.
    pub fn clear(&self) {
        debug!("Clearing SchemaCache {}", self.id);
        self.registry.write().clear();
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StructResolver for SchemaCache {
    fn resolve_struct(&self, struct_type: &StructType) -> Result<TypeAnnotation> {
        let builder = SchemaBuilder::new(self);
        Ok(match self.get_or_build(struct_type, |s| builder.build(s))? {
            SchemaRef::Model(model) => TypeAnnotation::Model(model),
            SchemaRef::Forward(forward) => TypeAnnotation::Forward(forward),
        })
    }
}
