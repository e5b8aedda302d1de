use std::path::Path;

use flowgate_core::engine::ModuleGrants;
use flowgate_core::{Case, Stage, UserContext, Workflow};
use flowgate_storage::{EntityStore, StorageError};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub workflows: Vec<Workflow>,
    pub stages: Vec<Stage>,
    pub cases: Vec<Case>,
    pub users: Vec<FixtureUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureUser {
    #[serde(flatten)]
    pub context: UserContext,
    /// Falls back to the configured module grants when absent.
    #[serde(default)]
    pub modules: Option<ModuleGrants>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FixtureError::Read(path.display().to_string(), e.to_string()))?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        serde_json::from_str(json).map_err(|e| FixtureError::Parse(e.to_string()))
    }

    /// Inserts workflows, then stages, then cases.
    pub async fn populate<S: EntityStore>(&self, store: &S) -> Result<(), FixtureError> {
        for workflow in &self.workflows {
            store.insert_workflow(workflow.clone()).await?;
        }
        for stage in &self.stages {
            store.insert_stage(stage.clone()).await?;
        }
        for case in &self.cases {
            store.insert_case(case.clone()).await?;
        }
        Ok(())
    }

    pub fn user(&self, user_id: &str) -> Option<&FixtureUser> {
        let user_id = user_id.trim();
        self.users.iter().find(|u| u.context.user_id == user_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read fixture file '{0}': {1}")]
    Read(String, String),

    #[error("failed to parse fixture JSON: {0}")]
    Parse(String),

    #[error("failed to store fixture entity: {0}")]
    Storage(#[from] StorageError),
}
