#![forbid(unsafe_code)]

//! Test host for `tether`: a deterministic, synchronous view tree.
//!
//! The integration suites under `tests/` drive connected components through
//! [`ViewTree`] and assert on the recorded [`TreeEvent`] order.

pub mod view_tree;

pub use view_tree::{EventLog, NodeSpec, Probe, TreeEvent, ViewNode, ViewTree};
