pub mod password;

use shared::{
    domain::{
        is_hex_color, normalize_features, GameDetails, Principal, TextField, UserProfile,
        MAX_FEATURES,
    },
    error::{ApiError, ErrorCode},
    protocol::{AdminResult, InitializeAdminRequest, UpdateContentResult},
};
use storage::{ClaimOutcome, Storage};
use tracing::{info, warn};

/// Deployment-level secrets that gate the admin slot.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    /// When set, `initialize_admin` requires a matching `user_provided_token`.
    pub setup_token: Option<String>,
    /// When set, a caller presenting it may clear an occupied slot.
    pub recovery_token: Option<String>,
}

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub admin: AdminPolicy,
}

impl ApiContext {
    pub fn new(storage: Storage, admin: AdminPolicy) -> Self {
        Self { storage, admin }
    }
}

pub async fn get_text_field(ctx: &ApiContext, field: TextField) -> Result<String, ApiError> {
    ctx.storage.text_field(field).await.map_err(internal)
}

pub async fn update_text_field(
    ctx: &ApiContext,
    caller: Option<&Principal>,
    field: TextField,
    value: &str,
) -> Result<UpdateContentResult, ApiError> {
    if !caller_is_admin(ctx, caller).await? {
        return Ok(UpdateContentResult::NotAdmin);
    }
    if field == TextField::BodyTextColor && !is_hex_color(value) {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "body text color must be a #rrggbb hex value",
        ));
    }
    ctx.storage
        .set_text_field(field, value)
        .await
        .map_err(internal)?;
    info!(field = field.as_str(), "content: text field updated");
    Ok(UpdateContentResult::Success)
}

pub async fn get_features(ctx: &ApiContext) -> Result<Vec<String>, ApiError> {
    ctx.storage.features().await.map_err(internal)
}

pub async fn update_features(
    ctx: &ApiContext,
    caller: Option<&Principal>,
    items: &[String],
) -> Result<UpdateContentResult, ApiError> {
    if !caller_is_admin(ctx, caller).await? {
        return Ok(UpdateContentResult::NotAdmin);
    }
    if items.len() > MAX_FEATURES {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("at most {MAX_FEATURES} features are allowed"),
        ));
    }
    let normalized = normalize_features(items);
    ctx.storage
        .set_features(&normalized)
        .await
        .map_err(internal)?;
    info!(count = normalized.len(), "content: features updated");
    Ok(UpdateContentResult::Success)
}

pub async fn get_game_details(ctx: &ApiContext) -> Result<GameDetails, ApiError> {
    ctx.storage.game_details().await.map_err(internal)
}

pub async fn update_game_details(
    ctx: &ApiContext,
    caller: Option<&Principal>,
    details: &GameDetails,
) -> Result<UpdateContentResult, ApiError> {
    if !caller_is_admin(ctx, caller).await? {
        return Ok(UpdateContentResult::NotAdmin);
    }
    ctx.storage
        .set_game_details(details)
        .await
        .map_err(internal)?;
    info!("content: game details updated");
    Ok(UpdateContentResult::Success)
}

pub async fn admin_status(ctx: &ApiContext) -> Result<bool, ApiError> {
    Ok(ctx
        .storage
        .admin_principal()
        .await
        .map_err(internal)?
        .is_some())
}

pub async fn is_caller_admin(
    ctx: &ApiContext,
    caller: Option<&Principal>,
) -> Result<bool, ApiError> {
    caller_is_admin(ctx, caller).await
}

/// Claims the empty admin slot for `caller`.
pub async fn initialize_admin(
    ctx: &ApiContext,
    caller: Option<&Principal>,
    request: &InitializeAdminRequest,
) -> Result<AdminResult, ApiError> {
    let caller = require_caller(caller)?;

    if let Some(expected) = ctx.admin.setup_token.as_deref() {
        if !password::constant_time_eq(
            expected.as_bytes(),
            request.user_provided_token.as_bytes(),
        ) {
            warn!(principal = %caller, "admin: setup token mismatch");
            return Ok(AdminResult::error("Invalid admin setup token"));
        }
    }

    match ctx.storage.claim_admin(caller).await.map_err(internal)? {
        ClaimOutcome::Claimed => {
            info!(principal = %caller, "admin: slot claimed");
            Ok(AdminResult::Success)
        }
        ClaimOutcome::AlreadyOwner => Ok(AdminResult::Success),
        ClaimOutcome::Occupied(_) => {
            info!(principal = %caller, "admin: claim rejected, slot occupied");
            Ok(AdminResult::error("Admin has already been initialized"))
        }
    }
}

/// Clears the admin slot.
///
/// An empty slot can be reset by any signed-in caller. An occupied slot can
/// be cleared by its holder, or by anyone presenting the deployment's
/// recovery token.
pub async fn reset_admin(
    ctx: &ApiContext,
    caller: Option<&Principal>,
    recovery_token: Option<&str>,
) -> Result<(), ApiError> {
    let caller = require_caller(caller)?;
    let current = ctx.storage.admin_principal().await.map_err(internal)?;

    let allowed = match &current {
        None => true,
        Some(holder) if holder == caller => true,
        Some(_) => recovery_token_matches(&ctx.admin, recovery_token),
    };
    if !allowed {
        warn!(principal = %caller, "admin: reset refused");
        return Err(ApiError::new(
            ErrorCode::Forbidden,
            "only the current admin or a recovery token holder can reset admin access",
        ));
    }

    let previous = ctx.storage.clear_admin().await.map_err(internal)?;
    info!(
        principal = %caller,
        previous = previous.as_ref().map(Principal::as_str).unwrap_or("<none>"),
        "admin: slot reset"
    );
    Ok(())
}

pub async fn caller_user_profile(
    ctx: &ApiContext,
    caller: Option<&Principal>,
) -> Result<Option<UserProfile>, ApiError> {
    let caller = require_caller(caller)?;
    ctx.storage.user_profile(caller).await.map_err(internal)
}

pub async fn save_caller_user_profile(
    ctx: &ApiContext,
    caller: Option<&Principal>,
    profile: &UserProfile,
) -> Result<(), ApiError> {
    let caller = require_caller(caller)?;
    if profile.name.trim().is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "name must not be empty"));
    }
    ctx.storage
        .save_user_profile(caller, profile)
        .await
        .map_err(internal)
}

/// True when protection is off, or when `candidate` matches the stored password.
pub async fn verify_password(ctx: &ApiContext, candidate: &str) -> Result<bool, ApiError> {
    let credential = ctx.storage.password_credential().await.map_err(internal)?;
    Ok(match credential {
        None => true,
        Some(credential) => password::verify_password(&credential, candidate),
    })
}

pub async fn enable_password_protection(
    ctx: &ApiContext,
    caller: Option<&Principal>,
    new_password: &str,
) -> Result<AdminResult, ApiError> {
    if !caller_is_admin(ctx, caller).await? {
        return Ok(AdminResult::error(
            "Only the admin can change password protection",
        ));
    }
    if new_password.trim().is_empty() {
        return Ok(AdminResult::error("Password must not be empty"));
    }
    let credential = password::hash_password(new_password).map_err(internal)?;
    ctx.storage
        .set_password_credential(&credential)
        .await
        .map_err(internal)?;
    info!("password: protection enabled");
    Ok(AdminResult::Success)
}

pub async fn disable_password_protection(
    ctx: &ApiContext,
    caller: Option<&Principal>,
) -> Result<AdminResult, ApiError> {
    if !caller_is_admin(ctx, caller).await? {
        return Ok(AdminResult::error(
            "Only the admin can change password protection",
        ));
    }
    let removed = ctx
        .storage
        .clear_password_credential()
        .await
        .map_err(internal)?;
    info!(was_enabled = removed, "password: protection disabled");
    Ok(AdminResult::Success)
}

async fn caller_is_admin(ctx: &ApiContext, caller: Option<&Principal>) -> Result<bool, ApiError> {
    let Some(caller) = caller else {
        return Ok(false);
    };
    let admin = ctx.storage.admin_principal().await.map_err(internal)?;
    Ok(admin.as_ref() == Some(caller))
}

fn require_caller(caller: Option<&Principal>) -> Result<&Principal, ApiError> {
    caller.ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "sign in required"))
}

fn recovery_token_matches(policy: &AdminPolicy, presented: Option<&str>) -> bool {
    match (policy.recovery_token.as_deref(), presented) {
        (Some(expected), Some(presented)) if !expected.is_empty() => {
            password::constant_time_eq(expected.as_bytes(), presented.as_bytes())
        }
        _ => false,
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
