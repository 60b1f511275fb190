//! Source nodes
//!
//! Nodes that produce values from their own plugs or from the context.

mod checkerboard;
mod constant;
mod context_query;
mod frame;

pub use checkerboard::{Checkerboard, TILE_SIZE};
pub use constant::Constant;
pub use context_query::ContextQuery;
pub use frame::Frame;
