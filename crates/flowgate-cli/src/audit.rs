use flowgate_core::{EntityId, OperationType, PermissionResult, UserContext};

use crate::service::ResourceType;

pub fn audit_permission_check(
    ctx: &UserContext,
    resource: ResourceType,
    entity_id: EntityId,
    operation: OperationType,
    result: &PermissionResult,
) {
    if result.success() {
        tracing::info!(
            target: "audit",
            event = "permission_check",
            user_id = %ctx.user_id,
            tenant_id = ctx.tenant_id(),
            level = resource.as_str(),
            entity_id = entity_id,
            operation = operation.as_str(),
            success = true,
            can_view = result.can_view(),
            can_operate = result.can_operate(),
            reason = result.reason(),
            "permission granted"
        );
    } else {
        tracing::warn!(
            target: "audit",
            event = "permission_check",
            user_id = %ctx.user_id,
            tenant_id = ctx.tenant_id(),
            level = resource.as_str(),
            entity_id = entity_id,
            operation = operation.as_str(),
            success = false,
            can_view = result.can_view(),
            can_operate = false,
            reason = result.reason(),
            error = result.error_message().unwrap_or(""),
            "permission denied"
        );
    }
}

pub fn audit_list_annotation(
    ctx: &UserContext,
    resource: ResourceType,
    total: usize,
    visible: usize,
) {
    tracing::info!(
        target: "audit",
        event = "list_annotation",
        user_id = %ctx.user_id,
        tenant_id = ctx.tenant_id(),
        level = resource.as_str(),
        total = total,
        visible = visible,
        "list annotated with permissions"
    );
}

pub fn audit_fixture_loaded(tenant_id: &str, workflows: usize, stages: usize, cases: usize) {
    tracing::info!(
        target: "audit",
        event = "fixture_loaded",
        tenant_id = tenant_id,
        workflows = workflows,
        stages = stages,
        cases = cases,
        "fixture loaded into store"
    );
}
