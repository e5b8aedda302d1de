use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    View,
    Operate,
    /// Checked exactly like [`OperationType::Operate`].
    Delete,
}

impl OperationType {
    pub fn requires_operate(self) -> bool {
        matches!(self, OperationType::Operate | OperationType::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::View => "view",
            OperationType::Operate => "operate",
            OperationType::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported operation type: '{0}'")]
pub struct UnsupportedOperation(pub String);

impl FromStr for OperationType {
    type Err = UnsupportedOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" => Ok(OperationType::View),
            "operate" => Ok(OperationType::Operate),
            "delete" => Ok(OperationType::Delete),
            _ => Err(UnsupportedOperation(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantReason {
    SystemAdmin,
    TenantAdmin,
    Owner,
    AssignedTo,
    ViewPermission,
    OperatePermission,
    InheritedFromWorkflow,
    WorkflowAndStageViewPermission,
    WorkflowAndStageOperatePermission,
    WorkflowInheritedViewPermission,
    WorkflowInheritedOperatePermission,
    CaseViewPermission,
    CaseOperatePermission,
}

impl GrantReason {
    pub fn as_str(self) -> &'static str {
        match self {
            GrantReason::SystemAdmin => "SystemAdmin",
            GrantReason::TenantAdmin => "TenantAdmin",
            GrantReason::Owner => "Owner",
            GrantReason::AssignedTo => "AssignedTo",
            GrantReason::ViewPermission => "ViewPermission",
            GrantReason::OperatePermission => "OperatePermission",
            GrantReason::InheritedFromWorkflow => "InheritedFromWorkflow",
            GrantReason::WorkflowAndStageViewPermission => "WorkflowAndStageViewPermission",
            GrantReason::WorkflowAndStageOperatePermission => "WorkflowAndStageOperatePermission",
            GrantReason::WorkflowInheritedViewPermission => "WorkflowInheritedViewPermission",
            GrantReason::WorkflowInheritedOperatePermission => {
                "WorkflowInheritedOperatePermission"
            }
            GrantReason::CaseViewPermission => "CaseViewPermission",
            GrantReason::CaseOperatePermission => "CaseOperatePermission",
        }
    }
}

impl fmt::Display for GrantReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ViewPermissionDenied,
    OperatePermissionDenied,
    WorkflowViewPermissionDenied,
    WorkflowOperatePermissionDenied,
    PermissionDenied,
    UnsupportedOperation,
    InvalidInput,
    ModulePermissionDenied,
    WorkflowNotFound,
    StageNotFound,
    CaseNotFound,
    PermissionCheckError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ViewPermissionDenied => "VIEW_PERMISSION_DENIED",
            ErrorCode::OperatePermissionDenied => "OPERATE_PERMISSION_DENIED",
            ErrorCode::WorkflowViewPermissionDenied => "WORKFLOW_VIEW_PERMISSION_DENIED",
            ErrorCode::WorkflowOperatePermissionDenied => "WORKFLOW_OPERATE_PERMISSION_DENIED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::ModulePermissionDenied => "MODULE_PERMISSION_DENIED",
            ErrorCode::WorkflowNotFound => "WORKFLOW_NOT_FOUND",
            ErrorCode::StageNotFound => "STAGE_NOT_FOUND",
            ErrorCode::CaseNotFound => "CASE_NOT_FOUND",
            ErrorCode::PermissionCheckError => "PERMISSION_CHECK_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single permission check.
///
/// Fields are private so `can_operate` can never be set without
/// `can_view`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionResult {
    success: bool,
    can_view: bool,
    can_operate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    grant_reason: Option<GrantReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorCode>,
}

impl PermissionResult {
    pub fn view_granted(reason: GrantReason) -> Self {
        Self {
            success: true,
            can_view: true,
            can_operate: false,
            grant_reason: Some(reason),
            error_message: None,
            error_code: None,
        }
    }

    pub fn full_access(reason: GrantReason) -> Self {
        Self {
            success: true,
            can_view: true,
            can_operate: true,
            grant_reason: Some(reason),
            error_message: None,
            error_code: None,
        }
    }

    pub fn denied(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            success: false,
            can_view: false,
            can_operate: false,
            grant_reason: None,
            error_message: Some(message.into()),
            error_code: Some(code),
        }
    }

    /// Denied operate while view stays granted.
    pub fn view_only(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            can_view: true,
            ..Self::denied(message, code)
        }
    }

    pub fn unsupported_operation(op: &str) -> Self {
        Self::denied(
            format!("Unsupported operation type: '{op}'"),
            ErrorCode::UnsupportedOperation,
        )
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn can_view(&self) -> bool {
        self.can_view
    }

    pub fn can_operate(&self) -> bool {
        self.can_operate
    }

    pub fn grant_reason(&self) -> Option<GrantReason> {
        self.grant_reason
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error_code
    }

    /// Grant reason on success, error code otherwise.
    pub fn reason(&self) -> &'static str {
        match (self.grant_reason, self.error_code) {
            (Some(reason), _) => reason.as_str(),
            (None, Some(code)) => code.as_str(),
            (None, None) => "",
        }
    }
}

/// Permission annotation attached to a row of a list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionInfo {
    can_view: bool,
    can_operate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl PermissionInfo {
    pub fn full_access() -> Self {
        Self {
            can_view: true,
            can_operate: true,
            error_message: None,
        }
    }

    pub fn visible(can_operate: bool) -> Self {
        Self {
            can_view: true,
            can_operate,
            error_message: None,
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            can_view: false,
            can_operate: false,
            error_message: Some(message.into()),
        }
    }

    pub fn can_view(&self) -> bool {
        self.can_view
    }

    pub fn can_operate(&self) -> bool {
        self.can_operate
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

impl From<&PermissionResult> for PermissionInfo {
    fn from(result: &PermissionResult) -> Self {
        if !result.can_view {
            return Self::denied(
                result
                    .error_message()
                    .unwrap_or("User is not allowed to view this entity"),
            );
        }
        Self::visible(result.can_operate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_parses_case_insensitively() {
        assert_eq!("View".parse::<OperationType>().unwrap(), OperationType::View);
        assert_eq!(" operate ".parse::<OperationType>().unwrap(), OperationType::Operate);
        assert_eq!("DELETE".parse::<OperationType>().unwrap(), OperationType::Delete);
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let err = "archive".parse::<OperationType>().unwrap_err();
        assert_eq!(err, UnsupportedOperation("archive".to_string()));
        assert!(err.to_string().contains("archive"));
    }

    #[test]
    fn delete_requires_operate() {
        assert!(OperationType::Delete.requires_operate());
        assert!(OperationType::Operate.requires_operate());
        assert!(!OperationType::View.requires_operate());
    }

    #[test]
    fn view_only_keeps_can_view() {
        let result = PermissionResult::view_only("no operate", ErrorCode::OperatePermissionDenied);

        assert!(!result.success());
        assert!(result.can_view());
        assert!(!result.can_operate());
        assert_eq!(result.reason(), "OPERATE_PERMISSION_DENIED");
    }

    #[test]
    fn denied_clears_all_flags() {
        let result = PermissionResult::denied("nope", ErrorCode::ViewPermissionDenied);

        assert!(!result.success());
        assert!(!result.can_view());
        assert!(!result.can_operate());
        assert_eq!(result.error_message(), Some("nope"));
        assert_eq!(result.error_code(), Some(ErrorCode::ViewPermissionDenied));
    }

    #[test]
    fn full_access_implies_view() {
        let result = PermissionResult::full_access(GrantReason::Owner);

        assert!(result.success() && result.can_view() && result.can_operate());
        assert_eq!(result.reason(), "Owner");
    }

    #[test]
    fn unsupported_operation_result_has_code() {
        let result = PermissionResult::unsupported_operation("archive");
        assert_eq!(result.error_code(), Some(ErrorCode::UnsupportedOperation));
        assert_eq!(result.reason(), "UNSUPPORTED_OPERATION");
    }

    #[test]
    fn result_serializes_codes_as_screaming_snake_case() {
        let result = PermissionResult::denied("x", ErrorCode::WorkflowOperatePermissionDenied);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["error_code"], "WORKFLOW_OPERATE_PERMISSION_DENIED");
        assert!(json.get("grant_reason").is_none());
    }

    #[test]
    fn serde_names_match_as_str() {
        for code in [
            ErrorCode::ViewPermissionDenied,
            ErrorCode::PermissionCheckError,
            ErrorCode::WorkflowNotFound,
        ] {
            assert_eq!(serde_json::to_value(code).unwrap(), code.as_str());
        }
        for reason in [
            GrantReason::InheritedFromWorkflow,
            GrantReason::WorkflowInheritedOperatePermission,
        ] {
            assert_eq!(serde_json::to_value(reason).unwrap(), reason.as_str());
        }
    }

    #[test]
    fn info_from_result_preserves_partial_grant() {
        let view_only = PermissionResult::view_only("x", ErrorCode::OperatePermissionDenied);
        let info = PermissionInfo::from(&view_only);
        assert!(info.can_view());
        assert!(!info.can_operate());
        assert!(info.error_message().is_none());

        let denied = PermissionResult::denied("hidden", ErrorCode::ViewPermissionDenied);
        let info = PermissionInfo::from(&denied);
        assert!(!info.can_view());
        assert_eq!(info.error_message(), Some("hidden"));
    }
}
