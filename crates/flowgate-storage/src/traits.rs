use flowgate_core::{Case, EntityId, Stage, Workflow};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("{kind} {id} already exists")]
    DuplicateEntity { kind: &'static str, id: EntityId },
    #[error("{kind} id must be positive, got {id}")]
    InvalidId { kind: &'static str, id: EntityId },
    #[error("internal storage error: {0}")]
    Internal(String),
}

pub trait EntityStore: Send + Sync {
    fn insert_workflow(
        &self,
        workflow: Workflow,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn insert_stage(&self, stage: Stage) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn insert_case(&self, case: Case) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn get_workflow(
        &self,
        id: EntityId,
    ) -> impl Future<Output = Result<Option<Workflow>, StorageError>> + Send;

    fn get_stage(
        &self,
        id: EntityId,
    ) -> impl Future<Output = Result<Option<Stage>, StorageError>> + Send;

    fn get_case(&self, id: EntityId)
    -> impl Future<Output = Result<Option<Case>, StorageError>> + Send;

    fn list_workflows(&self) -> impl Future<Output = Result<Vec<Workflow>, StorageError>> + Send;

    /// Stages ordered by id, optionally restricted to one workflow.
    fn list_stages(
        &self,
        workflow_id: Option<EntityId>,
    ) -> impl Future<Output = Result<Vec<Stage>, StorageError>> + Send;

    fn list_cases(
        &self,
        workflow_id: Option<EntityId>,
    ) -> impl Future<Output = Result<Vec<Case>, StorageError>> + Send;
}

pub trait StoreFactory: Send + Sync {
    type Store: EntityStore;

    fn for_tenant(&self, tenant_id: &str) -> Self::Store;
}
