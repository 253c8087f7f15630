use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Principal, TextField};

/// Outcome of a content mutation. Non-admin writes are reported, not raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateContentResult {
    Success,
    NotAdmin,
}

/// Outcome of an admin-slot or password-protection operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum AdminResult {
    Success,
    Error(String),
}

impl AdminResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AdminResult::Success)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextValue {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesBody {
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdminStatus {
    pub admin_exists: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CallerAdmin {
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitializeAdminRequest {
    #[serde(default)]
    pub admin_token: String,
    #[serde(default)]
    pub user_provided_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetAdminRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PasswordVerdict {
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityLoginRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityLoginResponse {
    pub principal: Principal,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

pub fn text_route(field: TextField) -> String {
    format!("/content/text/{}", field.as_str())
}

pub const FEATURES_ROUTE: &str = "/content/features";
pub const DETAILS_ROUTE: &str = "/content/details";
pub const ADMIN_STATUS_ROUTE: &str = "/admin/status";
pub const ADMIN_CALLER_ROUTE: &str = "/admin/caller";
pub const ADMIN_INITIALIZE_ROUTE: &str = "/admin/initialize";
pub const ADMIN_RESET_ROUTE: &str = "/admin/reset";
pub const PROFILE_ROUTE: &str = "/profile";
pub const PASSWORD_VERIFY_ROUTE: &str = "/password/verify";
pub const PASSWORD_ENABLE_ROUTE: &str = "/password/enable";
pub const PASSWORD_DISABLE_ROUTE: &str = "/password/disable";
pub const IDENTITY_LOGIN_ROUTE: &str = "/identity/login";
pub const HEALTH_ROUTE: &str = "/healthz";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_result_uses_tagged_layout() {
        let json = serde_json::to_value(AdminResult::error("slot taken")).expect("serialize");
        assert_eq!(json["type"], "error");
        assert_eq!(json["payload"], "slot taken");

        let parsed: AdminResult =
            serde_json::from_str(r#"{"type":"success"}"#).expect("deserialize");
        assert!(parsed.is_success());
    }

    #[test]
    fn reset_request_omits_missing_recovery_token() {
        let json = serde_json::to_string(&ResetAdminRequest::default()).expect("serialize");
        assert_eq!(json, "{}");
    }

    #[test]
    fn text_route_uses_snake_case_field_name() {
        assert_eq!(
            text_route(TextField::BodyTextColor),
            "/content/text/body_text_color"
        );
    }
}
