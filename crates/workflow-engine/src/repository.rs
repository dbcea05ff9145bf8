//! Workflow storage with optional file persistence.
//!
//! The engine never reaches for storage on its own: callers inject a
//! `WorkflowRepository` into `WorkflowService`. Two implementations ship
//! with the crate, an in-memory map for tests and embedding, and a
//! directory of pretty-printed JSON documents, one file per workflow.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;

use crate::constants::files;
use crate::error::{Result, WorkflowEngineError};
use crate::types::{Workflow, WorkflowStatus};

/// Metadata for a stored workflow (for listing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: WorkflowStatus,
    pub node_count: usize,
    pub execution_count: u64,
}

impl From<&Workflow> for WorkflowSummary {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id.clone(),
            name: workflow.name.clone(),
            description: workflow.description.clone(),
            status: workflow.status,
            node_count: workflow.nodes.len(),
            execution_count: workflow.execution_count,
        }
    }
}

/// Storage backend for workflow documents
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Load a workflow by ID
    async fn load(&self, id: &str) -> Result<Workflow>;

    /// Insert or replace a workflow
    async fn save(&self, workflow: &Workflow) -> Result<()>;

    /// Summaries of all stored workflows, sorted by name
    async fn list(&self) -> Result<Vec<WorkflowSummary>>;

    /// Remove a workflow. Returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Workflows kept in memory only
#[derive(Debug, Default)]
pub struct InMemoryWorkflowRepository {
    workflows: RwLock<HashMap<String, Workflow>>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored workflows
    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workflows.read().await.is_empty()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn load(&self, id: &str) -> Result<Workflow> {
        self.workflows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowEngineError::NotFound(id.to_string()))
    }

    async fn save(&self, workflow: &Workflow) -> Result<()> {
        self.workflows
            .write()
            .await
            .insert(workflow.id.clone(), workflow.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorkflowSummary>> {
        let mut summaries: Vec<WorkflowSummary> = self
            .workflows
            .read()
            .await
            .values()
            .map(WorkflowSummary::from)
            .collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.workflows.write().await.remove(id).is_some())
    }
}

/// One `<id>.json` document per workflow in a directory
///
/// The directory is created on first save.
///
/// # Example
///
/// ```ignore
/// use workflow_engine::{FileWorkflowRepository, WorkflowRepository};
///
/// let repository = FileWorkflowRepository::new(".flows");
/// repository.save(&workflow).await?;
/// let summaries = repository.list().await?;
/// ```
#[derive(Debug, Clone)]
pub struct FileWorkflowRepository {
    root: PathBuf,
}

impl FileWorkflowRepository {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        // IDs become file names, so nothing that could escape the directory
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(WorkflowEngineError::repository(format!(
                "'{}' cannot be used as a file name",
                id
            )));
        }
        Ok(self
            .root
            .join(format!("{}.{}", id, files::WORKFLOW_EXTENSION)))
    }
}

#[async_trait]
impl WorkflowRepository for FileWorkflowRepository {
    async fn load(&self, id: &str) -> Result<Workflow> {
        let path = self.path_for(id)?;
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkflowEngineError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    async fn save(&self, workflow: &Workflow) -> Result<()> {
        let path = self.path_for(&workflow.id)?;
        fs::create_dir_all(&self.root).await?;
        let contents = serde_json::to_string_pretty(workflow)?;
        fs::write(&path, contents).await?;
        log::debug!("Saved workflow '{}' to {:?}", workflow.id, path);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorkflowSummary>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_path = entry.path();
            if file_path
                .extension()
                .map_or(true, |e| e != files::WORKFLOW_EXTENSION)
            {
                continue;
            }
            let content = fs::read_to_string(&file_path).await?;
            match serde_json::from_str::<Workflow>(&content) {
                Ok(workflow) => summaries.push(WorkflowSummary::from(&workflow)),
                Err(e) => {
                    log::warn!("Skipping unreadable workflow {:?}: {}", file_path, e);
                }
            }
        }
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                log::debug!("Deleted workflow '{}' from {:?}", id, path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn sort_summaries(summaries: &mut [WorkflowSummary]) {
    summaries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let repository = InMemoryWorkflowRepository::new();
        let workflow = Workflow::with_id("wf-1", "Onboarding");

        repository.save(&workflow).await.unwrap();
        assert_eq!(repository.len().await, 1);
        assert_eq!(repository.load("wf-1").await.unwrap(), workflow);

        assert!(repository.delete("wf-1").await.unwrap());
        assert!(!repository.delete("wf-1").await.unwrap());
        assert!(matches!(
            repository.load("wf-1").await,
            Err(WorkflowEngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_file_repository_persists() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileWorkflowRepository::new(dir.path().join("flows"));

        assert!(repository.list().await.unwrap().is_empty());

        let mut first = Workflow::with_id("wf-b", "Billing");
        first.description = "Monthly invoices".to_string();
        let second = Workflow::with_id("wf-a", "Alerts");
        repository.save(&first).await.unwrap();
        repository.save(&second).await.unwrap();

        let reopened = FileWorkflowRepository::new(dir.path().join("flows"));
        assert_eq!(reopened.load("wf-b").await.unwrap(), first);

        let names: Vec<_> = reopened
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Alerts", "Billing"]);

        assert!(reopened.delete("wf-a").await.unwrap());
        assert_eq!(reopened.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_repository_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileWorkflowRepository::new(dir.path());
        repository
            .save(&Workflow::with_id("wf-1", "Kept"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), "hello")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("broken.json"), "{")
            .await
            .unwrap();

        let summaries = repository.list().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, "wf-1");
    }

    #[tokio::test]
    async fn test_file_repository_rejects_path_ids() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileWorkflowRepository::new(dir.path());
        assert!(matches!(
            repository.load("../escape").await,
            Err(WorkflowEngineError::Repository(_))
        ));
        assert!(matches!(
            repository.load("missing").await,
            Err(WorkflowEngineError::NotFound(_))
        ));
    }
}
