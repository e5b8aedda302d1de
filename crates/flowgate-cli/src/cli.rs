use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use flowgate_core::EntityId;

use crate::service::ResourceType;

#[derive(Debug, Parser)]
#[command(name = "flowgate", version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// JSON fixture with workflows, stages, cases and users.
    #[arg(short, long, global = true)]
    pub fixture: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check a single operation on one entity.
    Check {
        #[arg(value_enum)]
        resource: ResourceType,
        #[arg(allow_hyphen_values = true)]
        id: EntityId,
        #[arg(long = "as", value_name = "USER_ID")]
        user: String,
        #[arg(long, default_value = "view")]
        operation: String,
    },
    /// Report view and operate together for one entity.
    Access {
        #[arg(value_enum)]
        resource: ResourceType,
        #[arg(allow_hyphen_values = true)]
        id: EntityId,
        #[arg(long = "as", value_name = "USER_ID")]
        user: String,
    },
    /// Annotate every listed entity with the user's permissions.
    List {
        #[arg(value_enum)]
        target: ListTarget,
        #[arg(long = "as", value_name = "USER_ID")]
        user: String,
        #[arg(long)]
        workflow: Option<EntityId>,
    },
    /// Teams that may be assigned work on a stage.
    Teams {
        stage_id: EntityId,
        #[arg(long)]
        tenant: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListTarget {
    Workflows,
    Stages,
    Cases,
}
