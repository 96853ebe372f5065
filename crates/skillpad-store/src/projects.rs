//! Tracked project directories.
//!
//! The list is persisted under [`PROJECTS_KEY`] in user-controlled order;
//! every write stores the list verbatim.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::document::{DocumentStore, PROJECTS_KEY};
use crate::error::{StoreError, StoreResult};

/// A project directory whose local skills SkillPad manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier (UUID v7).
    pub id: String,
    /// Display name: the final path segment.
    pub name: String,
    /// Absolute directory path.
    pub path: String,
}

/// CRUD over the project list.
#[derive(Clone)]
pub struct ProjectStore {
    store: DocumentStore,
}

impl ProjectStore {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// All projects in stored order.
    pub async fn list(&self) -> Vec<Project> {
        self.store.get(PROJECTS_KEY).await.unwrap_or_default()
    }

    /// Look a project up by id.
    pub async fn find(&self, id: &str) -> Option<Project> {
        self.list().await.into_iter().find(|p| p.id == id)
    }

    /// Append a project for `path`.
    #[instrument(skip(self))]
    pub async fn add(&self, path: &str) -> StoreResult<Project> {
        let path = path.trim();
        if path.is_empty() {
            return Err(StoreError::InvalidArgument("project path is empty".into()));
        }

        let project = Project {
            id: Uuid::now_v7().to_string(),
            name: display_name(path),
            path: path.to_owned(),
        };

        let mut projects = self.list().await;
        projects.push(project.clone());
        self.store.put(PROJECTS_KEY, &projects).await?;

        info!(id = %project.id, name = %project.name, "project added");
        Ok(project)
    }

    /// Remove the project with `id`.  Unknown ids are a no-op.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> StoreResult<()> {
        let projects: Vec<Project> = self.list().await.into_iter().filter(|p| p.id != id).collect();
        self.store.put(PROJECTS_KEY, &projects).await?;
        info!(id, "project removed");
        Ok(())
    }

    /// Replace the list with `projects`, preserving the given order.
    pub async fn reorder(&self, projects: &[Project]) -> StoreResult<()> {
        self.store.put(PROJECTS_KEY, projects).await?;
        info!(count = projects.len(), "projects reordered");
        Ok(())
    }

    /// Move the project with `id` to position `to` (clamped).
    pub async fn move_to(&self, id: &str, to: usize) -> StoreResult<Vec<Project>> {
        let mut projects = self.list().await;
        let from = projects
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "project",
                id: id.to_owned(),
            })?;
        let project = projects.remove(from);
        let to = to.min(projects.len());
        projects.insert(to, project);
        self.reorder(&projects).await?;
        Ok(projects)
    }
}

/// Final path segment, or the whole path when it has none.
fn display_name(path: &str) -> String {
    Path::new(path.trim_end_matches(['/', '\\']))
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| path.to_owned())
}
