//! Engine-wide constants
//!
//! Single source of truth for limits and configuration defaults.

/// Default values for engine configuration
pub mod defaults {
    /// Iteration cap for loop nodes that do not set `maxIterations`
    pub const LOOP_MAX_ITERATIONS: u32 = 100;
    /// Maximum node visits in one run before it is failed
    pub const MAX_STEPS: u32 = 10_000;
    /// Snapshots kept on each of the undo and redo stacks
    pub const HISTORY_LIMIT: usize = 20;
    /// zstd level used for history snapshots
    pub const SNAPSHOT_COMPRESSION_LEVEL: i32 = 3;
}

/// Hard limits on evaluation
pub mod limits {
    /// Deepest nesting of parentheses and unary minus in a calculation
    pub const CALCULATION_DEPTH: usize = 64;
}

/// Prefixes for generated identifiers
pub mod id_prefixes {
    pub const NODE: &str = "node";
    pub const EDGE: &str = "edge";
    pub const EXECUTION: &str = "exec";
}

/// File names used by file-backed storage
pub mod files {
    /// Extension of persisted workflow documents
    pub const WORKFLOW_EXTENSION: &str = "json";
}
