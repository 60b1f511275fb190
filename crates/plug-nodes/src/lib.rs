//! Plug Nodes
//!
//! Node implementations for the plug-graph engine. Each node declares its
//! plugs, which inputs affect which outputs, how its outputs are hashed and
//! how they are computed. Values are small numeric stand-ins for the images
//! and scenes a production node set would process.
//!
//! # Categories
//!
//! - **Source**: Nodes that produce values from their plugs or the context
//! - **Processing**: Nodes that transform upstream values
//! - **Context**: Nodes that evaluate their input in a modified context
//!
//! Every node registers itself through `inventory`, so
//! `NodeRegistry::with_builtins()` lists them all once this crate is linked.

pub mod context;
pub mod processing;
pub mod source;

// Re-export all nodes for convenience
pub use context::*;
pub use processing::*;
pub use source::*;
