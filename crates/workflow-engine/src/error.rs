//! Error types for the workflow engine

use thiserror::Error;

use crate::validation::ValidationReport;

/// Result type alias using WorkflowEngineError
pub type Result<T> = std::result::Result<T, WorkflowEngineError>;

/// Errors returned to callers of the engine
///
/// Node-level failures never surface here: they are captured on the
/// `WorkflowExecution` record. This enum only carries programmer errors
/// (running an invalid graph) and boundary failures (storage, config, codecs).
#[derive(Debug, Error)]
pub enum WorkflowEngineError {
    /// The workflow has validation errors and cannot be executed
    #[error("Workflow '{workflow_id}' failed validation with {} error(s)", report.errors.len())]
    ValidationFailed {
        workflow_id: String,
        report: ValidationReport,
    },

    /// A workflow with the given ID does not exist
    #[error("Workflow not found: {0}")]
    NotFound(String),

    /// Storage backend failure
    #[error("Repository error: {0}")]
    Repository(String),

    /// Configuration could not be loaded or saved
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowEngineError {
    /// Create a repository error with a message
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}

/// Failure of a single node visit
///
/// Raised by node handlers and `NodeExecutor` implementations, then caught at
/// the dispatch boundary and converted into `execution.error`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NodeError {
    /// The external executor reported a failure
    #[error("{0}")]
    Executor(String),

    /// A condition could not be evaluated against the context
    #[error("Condition evaluation failed: {0}")]
    Evaluation(String),

    /// A transformation could not be applied
    #[error("Transform failed: {0}")]
    Transform(String),

    /// The node's configuration could not be interpreted
    #[error("Invalid node configuration: {0}")]
    InvalidConfig(String),

    /// No executor is registered for a delegating node type
    #[error("No executor registered for '{0}' nodes")]
    MissingExecutor(String),

    /// The node did not finish within its own timeout
    #[error("Node timed out after {0} ms")]
    Timeout(u64),

    /// An agent reported more tokens than its `maxTokens` allowance
    #[error("Agent used {used} tokens, exceeding its limit of {limit}")]
    TokenLimit { used: u64, limit: u64 },

    /// The workflow's token budget cannot cover this call
    #[error("token budget exceeded")]
    BudgetExceeded,
}

impl NodeError {
    /// Create an executor failure with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Executor(msg.into())
    }

    /// Whether a retry policy may re-attempt the node after this error
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::MissingExecutor(_) | Self::InvalidConfig(_) | Self::BudgetExceeded
        )
    }
}
