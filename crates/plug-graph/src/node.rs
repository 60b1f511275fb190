//! Node authoring contract
//!
//! Domain behaviour plugs into the engine through three functions:
//!
//! - `affects`: which outputs may change when a given input changes
//! - `hash`: a cheap fingerprint of what `compute` would produce
//! - `compute`: the actual value
//!
//! All plug names passed to and returned from these functions are paths
//! relative to the node, e.g. `in`, `curve.p0.x`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cancel::Canceller;
use crate::context::Context;
use crate::engine::Evaluator;
use crate::error::{PlugGraphError, Result};
use crate::graph::{NodeId, Plug, PlugDefinition, PlugId};
use crate::hash::{Fingerprint, FingerprintHasher};
use crate::spline::SplineDefinition;
use crate::value::{FromPlugValue, PlugValue};

/// Whether computed values of an output go through the value cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CachePolicy {
    #[default]
    Standard,
    /// Recompute on every request, bypassing the value cache
    Uncached,
}

/// Behaviour of a node type.
///
/// Implementations must be stateless with respect to evaluation: everything
/// `compute` reads has to be reachable through the `ComputeContext`, and
/// everything that can change its result has to be appended in `hash`.
pub trait ComputeNode: Send + Sync {
    /// Registered type name, part of every output hash
    fn type_name(&self) -> &str;

    /// Bump when the node's algorithm changes, to invalidate old hashes
    fn type_version(&self) -> u32 {
        1
    }

    /// Plugs created for each instance
    fn plugs(&self) -> Vec<PlugDefinition>;

    /// Outputs that may change when `input` changes.
    ///
    /// Must depend only on the plug name, never on values or context. Listing
    /// too much costs recomputation; listing too little serves stale hashes.
    fn affects(&self, input: &str) -> Vec<String>;

    /// Append everything `compute(output)` depends on to `h`.
    ///
    /// The engine has already appended the node type, version and output
    /// name. Only context variables that `compute` actually reads may be
    /// appended.
    fn hash(&self, output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()>;

    /// Compute the value of `output`
    fn compute(&self, output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue>;

    /// Whether `plug` may take `source` as its input
    fn accepts_input(&self, _plug: &str, _source: &Plug) -> bool {
        true
    }

    /// Input whose value `output` should forward unchanged, if any.
    ///
    /// Checked before hashing and computing; a pass-through output has the
    /// hash and value of the named plug.
    fn pass_through(&self, _output: &str, _ctx: &ComputeContext<'_>) -> Result<Option<String>> {
        Ok(None)
    }

    fn cache_policy(&self, _output: &str) -> CachePolicy {
        CachePolicy::Standard
    }
}

/// Access to the rest of the graph from inside `hash`/`compute`
pub struct ComputeContext<'a> {
    evaluator: &'a Evaluator<'a>,
    node: NodeId,
    output: PlugId,
    context: Context,
}

impl<'a> ComputeContext<'a> {
    pub(crate) fn new(evaluator: &'a Evaluator<'a>, node: NodeId, output: PlugId, context: Context) -> Self {
        Self {
            evaluator,
            node,
            output,
            context,
        }
    }

    /// The context this output is evaluated in
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Same node and output, different context.
    ///
    /// Used by nodes that evaluate their inputs at other frames or views.
    pub fn with_context(&self, context: Context) -> ComputeContext<'a> {
        ComputeContext {
            evaluator: self.evaluator,
            node: self.node,
            output: self.output,
            context,
        }
    }

    pub fn node_name(&self) -> &str {
        self.evaluator
            .graph()
            .node(self.node)
            .map(|n| n.name())
            .unwrap_or("")
    }

    /// Full name of the output being hashed or computed
    pub fn output_name(&self) -> String {
        self.evaluator.graph().display_name(self.output)
    }

    /// Resolve a plug on this node
    pub fn plug(&self, path: &str) -> Result<PlugId> {
        self.evaluator.graph().find_plug(self.node, path)
    }

    /// The plug's metadata, e.g. to check whether an input is connected
    pub fn plug_info(&self, path: &str) -> Result<&'a Plug> {
        let id = self.plug(path)?;
        self.evaluator.graph().plug(id)
    }

    /// Value of a plug on this node in the current context
    pub fn get_value(&self, path: &str) -> Result<Arc<PlugValue>> {
        let id = self.plug(path)?;
        self.evaluator.value(id, &self.context)
    }

    /// Typed value of a plug on this node
    pub fn get<T: FromPlugValue>(&self, path: &str) -> Result<T> {
        let value = self.get_value(path)?;
        T::from_plug_value(&value).ok_or_else(|| {
            PlugGraphError::compute(
                self.output_name(),
                format!(
                    "plug '{}' holds {}, expected {}",
                    path,
                    value.plug_type().name(),
                    T::expected()
                ),
            )
        })
    }

    /// Spline value of a spline plug on this node
    pub fn get_spline(&self, path: &str) -> Result<SplineDefinition> {
        SplineDefinition::from_plug_value(&*self.get_value(path)?)
    }

    pub fn hash_plug(&self, path: &str) -> Result<Fingerprint> {
        let id = self.plug(path)?;
        self.evaluator.hash(id, &self.context)
    }

    /// Append the hash of a plug on this node
    pub fn append_plug_hash(&self, path: &str, h: &mut FingerprintHasher) -> Result<()> {
        h.append_fingerprint(self.hash_plug(path)?);
        Ok(())
    }

    /// Append one context variable (or its absence)
    pub fn append_context_variable(&self, key: &str, h: &mut FingerprintHasher) {
        self.context.hash_variable(key, h);
    }

    pub fn canceller(&self) -> &Canceller {
        self.evaluator.canceller()
    }

    /// `Err(Cancelled)` once the request has been cancelled
    pub fn check_cancelled(&self) -> Result<()> {
        self.evaluator.canceller().check()
    }

    /// A compute error attributed to the current output
    pub fn error(&self, message: impl Into<String>) -> PlugGraphError {
        PlugGraphError::compute(self.output_name(), message)
    }
}
