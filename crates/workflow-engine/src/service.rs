//! Stored-workflow operations
//!
//! `WorkflowService` ties a repository to an executor: it loads a workflow
//! by ID, runs it, folds the finished run into the workflow's counters and
//! saves the workflow back.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::execution::WorkflowExecution;
use crate::executor::WorkflowExecutor;
use crate::repository::{WorkflowRepository, WorkflowSummary};
use crate::types::Workflow;
use crate::validation::{validate, ValidationReport};

pub struct WorkflowService {
    repository: Arc<dyn WorkflowRepository>,
    executor: Arc<WorkflowExecutor>,
}

impl WorkflowService {
    pub fn new(repository: Arc<dyn WorkflowRepository>, executor: Arc<WorkflowExecutor>) -> Self {
        Self {
            repository,
            executor,
        }
    }

    pub fn executor(&self) -> &WorkflowExecutor {
        &self.executor
    }

    pub fn repository(&self) -> &dyn WorkflowRepository {
        self.repository.as_ref()
    }

    pub async fn get(&self, id: &str) -> Result<Workflow> {
        self.repository.load(id).await
    }

    pub async fn list(&self) -> Result<Vec<WorkflowSummary>> {
        self.repository.list().await
    }

    /// Save a workflow, bumping its `updated_at`.
    pub async fn save(&self, workflow: &mut Workflow) -> Result<()> {
        workflow.touch();
        self.repository.save(workflow).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.repository.delete(id).await
    }

    /// Validate a stored workflow.
    pub async fn validate(&self, id: &str) -> Result<ValidationReport> {
        let workflow = self.repository.load(id).await?;
        Ok(validate(&workflow))
    }

    /// Run a stored workflow and persist its updated run counters.
    pub async fn run(
        &self,
        id: &str,
        trigger_data: Value,
        cancel: CancellationToken,
    ) -> Result<WorkflowExecution> {
        let mut workflow = self.repository.load(id).await?;
        let execution = self.executor.execute(&workflow, trigger_data, cancel).await?;

        if workflow.record_execution(&execution) {
            self.repository.save(&workflow).await?;
            log::debug!(
                "Workflow '{}' has now run {} time(s)",
                workflow.id,
                workflow.execution_count
            );
        }
        Ok(execution)
    }
}
