use std::sync::Arc;

use clap::Parser;
use flowgate_cli::audit;
use flowgate_cli::cli::{Cli, Command, ListTarget};
use flowgate_cli::config::{AppConfig, LogFormat};
use flowgate_cli::error::CliError;
use flowgate_cli::fixture::Fixture;
use flowgate_cli::service::{PermissionService, ResourceType};
use flowgate_core::engine::ModuleGrants;
use flowgate_core::{EntityId, OperationType, PermissionResult, UserContext};
use flowgate_storage::{InMemoryStoreFactory, StoreFactory};
use serde::Serialize;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type Service = PermissionService<InMemoryStoreFactory>;

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    // stdout carries the command output.
    let registry = tracing_subscriber::registry().with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr);
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr);
            registry.with(fmt_layer).init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config);

    let fixture_path = cli
        .fixture
        .or_else(|| config.fixture.path.clone())
        .ok_or(CliError::NoFixture)?;
    let fixture = Fixture::load(&fixture_path)?;

    let factory = Arc::new(InMemoryStoreFactory::new());
    let tenant_id = config.tenant.default_id.as_str();
    fixture.populate(&factory.for_tenant(tenant_id)).await?;
    audit::audit_fixture_loaded(
        tenant_id,
        fixture.workflows.len(),
        fixture.stages.len(),
        fixture.cases.len(),
    );

    let service = PermissionService::new(factory);

    match cli.command {
        Command::Check {
            resource,
            id,
            user,
            operation,
        } => run_check(&service, &fixture, &config, resource, id, &user, &operation).await?,
        Command::Access { resource, id, user } => {
            let (ctx, grants) = resolve_user(&fixture, &config, &user);
            let permission = service
                .check_resource_permission(resource, &ctx, id, grants)
                .await;
            print_json(&permission)?;
        }
        Command::List {
            target,
            user,
            workflow,
        } => run_list(&service, &fixture, &config, target, &user, workflow).await?,
        Command::Teams { stage_id, tenant } => {
            let tenant = tenant.unwrap_or_else(|| config.tenant.default_id.clone());
            let teams = service.authorized_teams(&tenant, stage_id).await;
            print_json(&teams)?;
        }
    }

    Ok(())
}

async fn run_check(
    service: &Service,
    fixture: &Fixture,
    config: &AppConfig,
    resource: ResourceType,
    id: EntityId,
    user: &str,
    operation: &str,
) -> Result<(), CliError> {
    let operation = match operation.parse::<OperationType>() {
        Ok(op) => op,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting check");
            return print_json(&PermissionResult::unsupported_operation(&e.0));
        }
    };

    let (ctx, grants) = resolve_user(fixture, config, user);
    let result = service
        .check_access(resource, &ctx, id, operation, grants)
        .await;
    print_json(&result)
}

async fn run_list(
    service: &Service,
    fixture: &Fixture,
    config: &AppConfig,
    target: ListTarget,
    user: &str,
    workflow: Option<EntityId>,
) -> Result<(), CliError> {
    let (ctx, grants) = resolve_user(fixture, config, user);
    let infos = match target {
        ListTarget::Workflows => service.annotate_workflows(&ctx, grants).await?,
        ListTarget::Stages => service.annotate_stages(&ctx, workflow, grants).await?,
        ListTarget::Cases => service.annotate_cases(&ctx, workflow, grants).await?,
    };
    print_json(&infos)
}

/// Unknown users are checked with no teams and the configured module grants.
fn resolve_user(
    fixture: &Fixture,
    config: &AppConfig,
    user_id: &str,
) -> (UserContext, ModuleGrants) {
    let (mut ctx, grants) = match fixture.user(user_id) {
        Some(user) => (
            user.context.clone(),
            user.modules.unwrap_or_else(|| config.module_grants()),
        ),
        None => {
            tracing::warn!(user_id, "user not found in fixture");
            (UserContext::new(user_id), config.module_grants())
        }
    };
    if ctx.tenant_id.is_none() {
        ctx.tenant_id = Some(config.tenant.default_id.clone());
    }
    (ctx, grants)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
