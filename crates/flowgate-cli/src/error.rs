use flowgate_storage::StorageError;

use crate::config::ConfigError;
use crate::fixture::FixtureError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("fixture error: {0}")]
    Fixture(#[from] FixtureError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no fixture given (use --fixture or set fixture.path)")]
    NoFixture,
}
