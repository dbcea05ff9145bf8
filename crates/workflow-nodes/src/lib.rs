//! Workflow Nodes
//!
//! Built-in `NodeExecutor` implementations for the workflow engine's
//! delegating node types.
//!
//! # Categories
//!
//! - **HTTP**: Webhook calls
//! - **Output**: Notifications to people and chat channels
//! - **System**: Named in-process actions
//!
//! Agent nodes have no built-in executor; hosts register their own.

pub mod http;
pub mod output;
pub mod setup;
pub mod system;

#[cfg(test)]
mod test_server;

// Re-export all executors for convenience
pub use http::*;
pub use output::*;
pub use setup::{builtin_registry, BuiltinExecutors};
pub use system::*;
