//! Plug Graph - Context-scoped, hash-memoized lazy computation
//!
//! This crate provides a dependency graph of typed plugs owned by compute
//! nodes. Values are pulled on demand and memoized by fingerprint:
//!
//! - Every plug has a 128-bit hash in a given `Context`; equal hashes mean
//!   equal values, so unrelated requests share cached results
//! - Edits propagate dirtiness through `affects()` declarations instead of
//!   invalidating the value cache
//! - Concurrent requests for the same value are coalesced into one
//!   computation
//! - Compound plugs (including splines) expose their parts as child plugs
//!   that can be connected individually
//!
//! # Architecture
//!
//! - `Graph`: arena of nodes and plugs, mutated through `GraphEdit`
//! - `Engine`: owns the graph behind a read/write lock, the caches and the
//!   event sink; answers `hash` and `get_value` requests
//! - `ComputeNode`: the node authoring contract (`affects`, `hash`,
//!   `compute`); nodes reach their inputs through `ComputeContext`
//! - `ValueCache`: bounded LRU of computed values keyed by (plug, hash)
//! - `EventSink`: change notifications, independent of any host
//!
//! # Example
//!
//! ```ignore
//! use plug_graph::{Context, Engine, NodeRegistry};
//!
//! let registry = NodeRegistry::with_builtins();
//! let engine = Engine::default();
//! let node = engine.add_node("grade1", registry.create("Grade")?)?;
//! let out = engine.plug("grade1.out")?;
//! let value: f64 = engine.get(out, &Context::new().with("frame", 12.0))?;
//! ```

pub mod affects;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod edit;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod hash;
pub mod node;
pub mod registry;
pub mod spline;
pub mod spline_plug;
pub mod validation;
pub mod value;

#[cfg(test)]
mod test_nodes;

// Re-export key types
pub use affects::affected_plugs;
pub use cache::{CacheStats, ValueCache};
pub use cancel::Canceller;
pub use config::EngineConfig;
pub use context::{keys, Context, ContextScope, ContextValue, FromContextValue};
pub use descriptor::{NodeCategory, NodeDescriptor, NodeMetadata, PlugMetadata};
pub use edit::GraphEdit;
pub use engine::Engine;
pub use error::{PlugGraphError, Result};
pub use events::{EventError, EventSink, GraphEvent, NullEventSink, VecEventSink};
pub use graph::{ChildPolicy, Direction, Graph, NodeId, Plug, PlugDefinition, PlugId};
pub use hash::{Fingerprint, FingerprintHasher};
pub use node::{CachePolicy, ComputeContext, ComputeNode};
pub use registry::{NodeFactory, NodeRegistration, NodeRegistry};
pub use spline::{Spline, SplineDefinition, SplineInterpolation};
pub use spline_plug::SplinePlug;
pub use validation::{validate_graph, ValidationError};
pub use value::{FromPlugValue, PlugType, PlugValue};

// Node crates submit `NodeRegistration`s through this
pub use inventory;
