//! Context nodes
//!
//! Nodes that evaluate their input in a modified context.

mod select_view;
mod time_warp;

pub use select_view::SelectView;
pub use time_warp::TimeWarp;
