use std::sync::Arc;

use flowgate_core::engine::{CaseReader, LookupError, StageReader, WorkflowReader};
use flowgate_core::{Case, EntityId, Stage, Workflow};
use flowgate_storage::EntityStore;

/// Serves the engines' parent lookups from a tenant store.
pub struct StoreEntityReader<S: EntityStore> {
    store: Arc<S>,
}

impl<S: EntityStore> StoreEntityReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: EntityStore> WorkflowReader for StoreEntityReader<S> {
    async fn workflow(&self, id: EntityId) -> Result<Option<Workflow>, LookupError> {
        self.store
            .get_workflow(id)
            .await
            .map_err(|e| LookupError::Storage(e.to_string()))
    }
}

impl<S: EntityStore> StageReader for StoreEntityReader<S> {
    async fn stage(&self, id: EntityId) -> Result<Option<Stage>, LookupError> {
        self.store
            .get_stage(id)
            .await
            .map_err(|e| LookupError::Storage(e.to_string()))
    }
}

impl<S: EntityStore> CaseReader for StoreEntityReader<S> {
    async fn case(&self, id: EntityId) -> Result<Option<Case>, LookupError> {
        self.store
            .get_case(id)
            .await
            .map_err(|e| LookupError::Storage(e.to_string()))
    }
}
