//! Hash-memoized, context-scoped lazy evaluation
//!
//! `Engine` owns the graph, the value cache and the hash cache, and answers
//! two questions about any plug in any context:
//!
//! - `hash`: the fingerprint of the plug's value, computed recursively from
//!   upstream hashes, static values and the context variables each node
//!   declares it reads
//! - `get_value`: the value itself, looked up in the value cache by
//!   `(plug, hash)` and computed on a miss
//!
//! # Evaluation protocol
//!
//! For an output plug in a context:
//!
//! 1. Compute its hash (cached per plug and context, validated by the plug's
//!    dirty count).
//! 2. Look up `(plug, hash)` in the value cache; a hit is returned as is.
//! 3. On a miss, exactly one thread runs `compute`, which pulls upstream
//!    values through the same protocol. Concurrent requests for the same key
//!    wait for that result.
//! 4. Successful results are stored; errors are delivered to every waiter
//!    and forgotten.
//!
//! # Locking
//!
//! Each request takes one read lock on the graph for its whole recursive
//! walk. Edits (`Engine::edit`) take the write lock, so they are serialized
//! against evaluations and never observed half-done.

use std::cell::RefCell;
use std::sync::Arc;

use log::{debug, error, warn};
use parking_lot::{RwLock, RwLockReadGuard};
use rayon::prelude::*;

use crate::affects::affected_plugs;
use crate::cache::{CacheKey, CacheStats, HashCache, ValueCache};
use crate::cancel::Canceller;
use crate::config::EngineConfig;
use crate::context::{Context, ContextScope};
use crate::edit::GraphEdit;
use crate::error::{PlugGraphError, Result};
use crate::events::{EventSink, GraphEvent, NullEventSink};
use crate::graph::{Direction, Graph, NodeId, Plug, PlugDefinition, PlugId};
use crate::hash::{compound_hash, converted_hash, static_value_hash, Fingerprint, FingerprintHasher};
use crate::node::{CachePolicy, ComputeContext, ComputeNode};
use crate::validation::{validate_graph, ValidationError};
use crate::value::{FromPlugValue, PlugValue};

/// The evaluation engine
pub struct Engine {
    graph: RwLock<Graph>,
    cache: Arc<ValueCache>,
    hash_cache: HashCache,
    events: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine with its own value cache
    pub fn new(config: EngineConfig) -> Self {
        let cache = Arc::new(ValueCache::new(config.value_cache_capacity));
        Self::with_cache(config, cache)
    }

    /// Create an engine sharing an existing value cache.
    ///
    /// Plug handles are only meaningful within one graph, so a shared cache
    /// should only be shared between engines built by replaying the same
    /// edits.
    pub fn with_cache(config: EngineConfig, cache: Arc<ValueCache>) -> Self {
        Self {
            graph: RwLock::new(Graph::new()),
            cache,
            hash_cache: HashCache::new(config.hash_cache_capacity),
            events: Arc::new(NullEventSink),
            config,
        }
    }

    /// Replace the event sink
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ValueCache> {
        &self.cache
    }

    /// Shared read access to the graph.
    ///
    /// Edits block while the guard is held.
    pub fn graph(&self) -> RwLockReadGuard<'_, Graph> {
        self.graph.read()
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Run a batch of edits under the write lock.
    ///
    /// Dependency propagation runs once for everything the batch changed,
    /// including operations that succeeded before a failing one, and events
    /// are delivered after the lock is released.
    pub fn edit<R>(&self, f: impl FnOnce(&mut GraphEdit<'_>) -> Result<R>) -> Result<R> {
        let (result, events) = {
            let mut graph = self.graph.write();
            let mut edit = GraphEdit::new(&mut graph);
            let result = f(&mut edit);
            let (changed, mut events) = edit.into_parts();

            if !changed.is_empty() {
                let affected = affected_plugs(&graph, &changed);
                graph.bump_dirty(&affected);
                debug!("Edit affected {} plugs", affected.len());
                events.push(GraphEvent::PlugsDirtied {
                    plugs: affected.iter().map(|p| graph.display_name(*p)).collect(),
                });
            }
            (result, events)
        };

        for event in events {
            if let Err(e) = self.events.send(event) {
                warn!("Failed to deliver graph event: {}", e);
            }
        }
        result
    }

    pub fn add_node(&self, name: &str, node: Arc<dyn ComputeNode>) -> Result<NodeId> {
        self.edit(|e| e.add_node(name, node))
    }

    pub fn remove_node(&self, node: NodeId) -> Result<()> {
        self.edit(|e| e.remove_node(node))
    }

    /// Resolve a full plug path (`node.plug.child`)
    pub fn plug(&self, path: &str) -> Result<PlugId> {
        self.graph.read().plug_by_path(path)
    }

    /// Connect `dest` to `source`, or disconnect it with `None`
    pub fn set_input(&self, dest: PlugId, source: Option<PlugId>) -> Result<()> {
        self.edit(|e| e.set_input(dest, source))
    }

    pub fn connect(&self, source: PlugId, dest: PlugId) -> Result<()> {
        self.edit(|e| e.connect(source, dest))
    }

    pub fn disconnect(&self, dest: PlugId) -> Result<()> {
        self.edit(|e| e.disconnect(dest))
    }

    pub fn set_value(&self, plug: PlugId, value: impl Into<PlugValue>) -> Result<()> {
        let value = value.into();
        self.edit(|e| e.set_value(plug, value))
    }

    pub fn set_to_default(&self, plug: PlugId) -> Result<()> {
        self.edit(|e| e.set_to_default(plug))
    }

    pub fn add_child(&self, parent: PlugId, child: PlugDefinition) -> Result<PlugId> {
        self.edit(|e| e.add_child(parent, child))
    }

    pub fn remove_child(&self, child: PlugId) -> Result<()> {
        self.edit(|e| e.remove_child(child))
    }

    pub fn accepts_input(&self, dest: PlugId, source: PlugId) -> bool {
        self.graph.read().accepts_input(dest, source)
    }

    pub fn accepts_child(&self, parent: PlugId, child: &PlugDefinition) -> bool {
        self.graph.read().accepts_child(parent, child)
    }

    /// Transitive affected set of `changed`, as an edit would compute it
    pub fn affected_plugs(&self, changed: &[PlugId]) -> Vec<PlugId> {
        affected_plugs(&self.graph.read(), changed)
    }

    /// Structural problems in the current graph, see `validate_graph`
    pub fn validate(&self) -> Vec<ValidationError> {
        validate_graph(&self.graph.read())
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    fn evaluator<'g>(&'g self, graph: &'g Graph, canceller: &'g Canceller) -> Evaluator<'g> {
        Evaluator {
            graph,
            cache: &self.cache,
            hash_cache: &self.hash_cache,
            canceller,
            events: self.events.as_ref(),
            config: &self.config,
            stack: RefCell::new(Vec::new()),
        }
    }

    pub fn hash(&self, plug: PlugId, context: &Context) -> Result<Fingerprint> {
        self.hash_with(plug, context, &Canceller::new())
    }

    pub fn hash_with(&self, plug: PlugId, context: &Context, canceller: &Canceller) -> Result<Fingerprint> {
        let graph = self.graph.read();
        self.evaluator(&graph, canceller).hash(plug, context)
    }

    pub fn get_value(&self, plug: PlugId, context: &Context) -> Result<Arc<PlugValue>> {
        self.get_value_with(plug, context, &Canceller::new())
    }

    /// Get a value, observing `canceller` in every `compute` and while
    /// waiting on other threads' computations
    pub fn get_value_with(&self, plug: PlugId, context: &Context, canceller: &Canceller) -> Result<Arc<PlugValue>> {
        let graph = self.graph.read();
        self.evaluator(&graph, canceller).value(plug, context)
    }

    /// Typed value access
    pub fn get<T: FromPlugValue>(&self, plug: PlugId, context: &Context) -> Result<T> {
        let value = self.get_value(plug, context)?;
        T::from_plug_value(&value).ok_or_else(|| {
            PlugGraphError::Internal(format!(
                "{} holds {}, not {}",
                self.graph.read().display_name(plug),
                value.plug_type().name(),
                T::expected()
            ))
        })
    }

    /// Evaluate several plugs in parallel on the rayon pool.
    ///
    /// All requests share one read lock; results are in request order.
    pub fn get_values_parallel(&self, plugs: &[PlugId], context: &Context) -> Vec<Result<Arc<PlugValue>>> {
        let canceller = Canceller::new();
        let graph = self.graph.read();
        let graph: &Graph = &graph;
        plugs
            .par_iter()
            .map(|plug| self.evaluator(graph, &canceller).value(*plug, context))
            .collect()
    }

    /// Evaluate on tokio's blocking pool
    pub async fn get_value_async(
        self: Arc<Self>,
        plug: PlugId,
        context: Context,
        canceller: Canceller,
    ) -> Result<Arc<PlugValue>> {
        tokio::task::spawn_blocking(move || self.get_value_with(plug, &context, &canceller))
            .await
            .map_err(|e| PlugGraphError::Internal(format!("evaluation task failed: {e}")))?
    }

    /// Drop all cached values and hashes
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.hash_cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Hash,
    Value,
}

/// State of one evaluation request.
///
/// Holds the read-locked graph and the stack of in-progress outputs used to
/// detect a node requesting (directly or not) its own output.
pub(crate) struct Evaluator<'g> {
    graph: &'g Graph,
    cache: &'g ValueCache,
    hash_cache: &'g HashCache,
    canceller: &'g Canceller,
    events: &'g dyn EventSink,
    config: &'g EngineConfig,
    stack: RefCell<Vec<(PlugId, Fingerprint, Phase)>>,
}

/// Pops the evaluation stack on drop
struct StackGuard<'e> {
    stack: &'e RefCell<Vec<(PlugId, Fingerprint, Phase)>>,
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

impl<'g> Evaluator<'g> {
    pub(crate) fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub(crate) fn canceller(&self) -> &'g Canceller {
        self.canceller
    }

    fn enter(&self, plug: PlugId, context: &Context, phase: Phase) -> Result<StackGuard<'_>> {
        let frame = (plug, context.hash(), phase);
        let mut stack = self.stack.borrow_mut();
        if stack.contains(&frame) {
            return Err(PlugGraphError::compute(
                self.graph.display_name(plug),
                "cyclic dependency: output depends on itself",
            ));
        }
        if stack.len() >= self.config.max_evaluation_depth {
            return Err(PlugGraphError::compute(
                self.graph.display_name(plug),
                format!("maximum evaluation depth ({}) exceeded", self.config.max_evaluation_depth),
            ));
        }
        stack.push(frame);
        Ok(StackGuard { stack: &self.stack })
    }

    /// Fingerprint of `id` in `context`
    pub(crate) fn hash(&self, id: PlugId, context: &Context) -> Result<Fingerprint> {
        let plug = self.graph.plug(id)?;

        if plug.plug_type().is_compound() {
            let children = plug
                .children()
                .iter()
                .map(|child| -> Result<(&'g str, Fingerprint)> {
                    Ok((self.graph.plug(*child)?.name(), self.hash(*child, context)?))
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(compound_hash(plug.plug_type(), &children));
        }

        if let Some(input) = plug.input() {
            let source = self.graph.plug(input)?;
            let hash = self.hash(input, context)?;
            return Ok(if source.plug_type() == plug.plug_type() {
                hash
            } else {
                converted_hash(hash, plug.plug_type())
            });
        }

        match plug.direction() {
            Direction::In => {
                let value = plug.static_value().ok_or_else(|| {
                    PlugGraphError::Internal(format!("{} has no value", self.graph.display_name(id)))
                })?;
                Ok(static_value_hash(plug.plug_type(), value))
            }
            Direction::Out => self.compute_hash(id, plug, context),
        }
    }

    fn compute_hash(&self, id: PlugId, plug: &Plug, context: &Context) -> Result<Fingerprint> {
        let context_hash = context.hash();
        if let Some(hash) = self.hash_cache.get(id, context_hash, plug.dirty_count()) {
            return Ok(hash);
        }

        let _guard = self.enter(id, context, Phase::Hash)?;
        let node = self.graph.node(plug.node())?;
        let behaviour = node.behaviour();
        let output = self.graph.relative_name(id)?;
        let full_name = self.graph.display_name(id);
        let ctx = ComputeContext::new(self, plug.node(), id, context.clone());
        let _scope = ContextScope::new(context.clone());

        let result = match behaviour.pass_through(&output, &ctx) {
            Ok(Some(source)) => self.pass_through_source(plug, &source).and_then(|source| {
                let hash = self.hash(source, context)?;
                let source_type = self.graph.plug(source)?.plug_type();
                Ok(if source_type == plug.plug_type() {
                    hash
                } else {
                    converted_hash(hash, plug.plug_type())
                })
            }),
            Ok(None) => {
                let mut h = FingerprintHasher::with_domain("compute");
                h.append_str(behaviour.type_name())
                    .append_u64(behaviour.type_version() as u64)
                    .append_str(&output);
                behaviour.hash(&output, &ctx, &mut h).map(|()| h.finish())
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(hash) => {
                self.hash_cache.insert(id, context_hash, plug.dirty_count(), hash);
                Ok(hash)
            }
            Err(e) => Err(self.fail(&full_name, e)),
        }
    }

    /// Value of `id` in `context`
    pub(crate) fn value(&self, id: PlugId, context: &Context) -> Result<Arc<PlugValue>> {
        let plug = self.graph.plug(id)?;

        if plug.plug_type().is_compound() {
            let mut children = Vec::with_capacity(plug.children().len());
            for child in plug.children() {
                let name = self.graph.plug(*child)?.name().to_string();
                children.push((name, (*self.value(*child, context)?).clone()));
            }
            return Ok(Arc::new(PlugValue::Compound(children)));
        }

        if let Some(input) = plug.input() {
            let value = self.value(input, context)?;
            return self.convert(id, plug, value);
        }

        match plug.direction() {
            Direction::In => plug
                .static_value()
                .cloned()
                .map(Arc::new)
                .ok_or_else(|| PlugGraphError::Internal(format!("{} has no value", self.graph.display_name(id)))),
            Direction::Out => self.compute_value(id, plug, context),
        }
    }

    fn compute_value(&self, id: PlugId, plug: &Plug, context: &Context) -> Result<Arc<PlugValue>> {
        let _guard = self.enter(id, context, Phase::Value)?;
        let node = self.graph.node(plug.node())?;
        let behaviour = node.behaviour();
        let output = self.graph.relative_name(id)?;
        let full_name = self.graph.display_name(id);
        let ctx = ComputeContext::new(self, plug.node(), id, context.clone());

        let pass_through = {
            let _scope = ContextScope::new(context.clone());
            behaviour.pass_through(&output, &ctx)
        };
        match pass_through {
            Ok(Some(source)) => {
                let source = self
                    .pass_through_source(plug, &source)
                    .map_err(|e| self.fail(&full_name, e))?;
                let value = self.value(source, context)?;
                return self.convert(id, plug, value);
            }
            Ok(None) => {}
            Err(e) => return Err(self.fail(&full_name, e)),
        }

        let compute = || {
            let _scope = ContextScope::new(context.clone());
            self.canceller.check()?;
            debug!("Computing {}", full_name);
            behaviour
                .compute(&output, &ctx)
                .map_err(|e| e.into_compute(&full_name))
        };

        let result = match behaviour.cache_policy(&output) {
            CachePolicy::Uncached => compute().map(Arc::new),
            CachePolicy::Standard => {
                let hash = self.hash(id, context)?;
                self.cache.get_or_compute(
                    CacheKey { plug: id, hash },
                    self.canceller,
                    self.config.wait_poll_interval(),
                    compute,
                )
            }
        };

        let value = result.map_err(|e| self.fail(&full_name, e))?;
        self.check_type(&full_name, plug, value)
    }

    /// Resolve the plug named by `pass_through`, which must be able to feed `plug`
    fn pass_through_source(&self, plug: &Plug, source: &str) -> Result<PlugId> {
        let id = self.graph.find_plug(plug.node(), source)?;
        let source_type = self.graph.plug(id)?.plug_type();
        if !plug.plug_type().accepts(source_type) {
            return Err(PlugGraphError::IncompatibleInput(format!(
                "cannot pass {} through to {}",
                source_type.name(),
                plug.plug_type().name()
            )));
        }
        Ok(id)
    }

    /// Convert an upstream value to the type of `plug`
    fn convert(&self, id: PlugId, plug: &Plug, value: Arc<PlugValue>) -> Result<Arc<PlugValue>> {
        if value.plug_type() == plug.plug_type() {
            return Ok(value);
        }
        value.convert_to(plug.plug_type()).map(Arc::new).ok_or_else(|| {
            PlugGraphError::Internal(format!(
                "{} cannot take a {} value",
                self.graph.display_name(id),
                value.plug_type().name()
            ))
        })
    }

    /// Computed (or cached) values must have exactly the output's type
    fn check_type(&self, full_name: &str, plug: &Plug, value: Arc<PlugValue>) -> Result<Arc<PlugValue>> {
        if value.plug_type() == plug.plug_type() {
            return Ok(value);
        }
        error!(
            "{} produced a {} value for a {} plug. Is the hash being computed correctly?",
            full_name,
            value.plug_type().name(),
            plug.plug_type().name()
        );
        Err(PlugGraphError::Internal(format!(
            "{} produced a {} value for a {} plug",
            full_name,
            value.plug_type().name(),
            plug.plug_type().name()
        )))
    }

    /// Attribute an error to `plug`, reporting it where it originated
    fn fail(&self, plug: &str, e: PlugGraphError) -> PlugGraphError {
        let e = e.into_compute(plug);
        if let PlugGraphError::Compute { plug: origin, message } = &e {
            if origin == plug {
                debug!("{} failed: {}", plug, message);
                if let Err(send_error) = self.events.send(GraphEvent::compute_failed(plug, message)) {
                    warn!("Failed to deliver graph event: {}", send_error);
                }
            }
        }
        e
    }
}
