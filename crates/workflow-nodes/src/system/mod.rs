//! System nodes
//!
//! Executors for action nodes: named handlers run in-process.

mod action;

pub use action::{ActionExecutor, ActionHandler};
