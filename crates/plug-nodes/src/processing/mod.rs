//! Processing nodes
//!
//! Nodes that transform upstream values.

mod arithmetic;
mod curve_remap;
mod grade;

pub use arithmetic::{Arithmetic, Operation};
pub use curve_remap::CurveRemap;
pub use grade::Grade;
