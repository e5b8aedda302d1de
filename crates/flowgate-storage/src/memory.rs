use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use flowgate_core::{Case, EntityId, Stage, Workflow};

use crate::traits::{EntityStore, StorageError, StoreFactory};

#[derive(Debug, Default)]
struct InnerState {
    workflows: BTreeMap<EntityId, Workflow>,
    stages: BTreeMap<EntityId, Stage>,
    cases: BTreeMap<EntityId, Case>,
}

fn insert_new<T>(
    map: &mut BTreeMap<EntityId, T>,
    kind: &'static str,
    id: EntityId,
    entity: T,
) -> Result<(), StorageError> {
    if id <= 0 {
        return Err(StorageError::InvalidId { kind, id });
    }
    if map.contains_key(&id) {
        return Err(StorageError::DuplicateEntity { kind, id });
    }
    map.insert(id, entity);
    tracing::debug!(kind, id, "entity stored");
    Ok(())
}

/// Tenant-scoped entity store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<InnerState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, InnerState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Internal(format!("store lock poisoned: {e}")))
    }
}

impl EntityStore for InMemoryStore {
    async fn insert_workflow(&self, workflow: Workflow) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        insert_new(&mut state.workflows, "workflow", workflow.id, workflow)
    }

    async fn insert_stage(&self, stage: Stage) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        insert_new(&mut state.stages, "stage", stage.id, stage)
    }

    async fn insert_case(&self, case: Case) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        insert_new(&mut state.cases, "case", case.id, case)
    }

    async fn get_workflow(&self, id: EntityId) -> Result<Option<Workflow>, StorageError> {
        Ok(self.lock()?.workflows.get(&id).cloned())
    }

    async fn get_stage(&self, id: EntityId) -> Result<Option<Stage>, StorageError> {
        Ok(self.lock()?.stages.get(&id).cloned())
    }

    async fn get_case(&self, id: EntityId) -> Result<Option<Case>, StorageError> {
        Ok(self.lock()?.cases.get(&id).cloned())
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StorageError> {
        Ok(self.lock()?.workflows.values().cloned().collect())
    }

    async fn list_stages(&self, workflow_id: Option<EntityId>) -> Result<Vec<Stage>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .stages
            .values()
            .filter(|s| workflow_id.is_none_or(|id| s.workflow_id == id))
            .cloned()
            .collect())
    }

    async fn list_cases(&self, workflow_id: Option<EntityId>) -> Result<Vec<Case>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .cases
            .values()
            .filter(|c| workflow_id.is_none_or(|id| c.workflow_id == id))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStoreFactory {
    stores: Mutex<HashMap<String, InMemoryStore>>,
}

impl InMemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreFactory for InMemoryStoreFactory {
    type Store = InMemoryStore;

    fn for_tenant(&self, tenant_id: &str) -> InMemoryStore {
        // Poisoning leaves the map intact.
        let mut stores = self
            .stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        stores
            .entry(tenant_id.to_string())
            .or_insert_with(InMemoryStore::new)
            .clone()
    }
}
