use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use server_api::{AdminPolicy, ApiContext};
use shared::{
    domain::{GameDetails, Principal, TextField, UserProfile},
    error::{ApiError, ErrorCode},
    protocol::{
        AdminResult, AdminStatus, CallerAdmin, FeaturesBody, IdentityLoginRequest,
        IdentityLoginResponse, InitializeAdminRequest, PasswordRequest, PasswordVerdict,
        ResetAdminRequest, TextValue, UpdateContentResult,
    },
};
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

mod app_state;
mod config;
mod identity;

use app_state::AppState;
use config::{load_settings, prepare_database_url};
use identity::{mint_session_token, principal_for_username, verify_session_token, IdentityConfig};

const MAX_BODY_BYTES: usize = 64 * 1024;

type HandlerError = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    if settings.admin_recovery_token.is_none() {
        info!("admin: no recovery token configured, only the current admin can reset the slot");
    }
    let api = ApiContext::new(
        storage,
        AdminPolicy {
            setup_token: settings.admin_setup_token,
            recovery_token: settings.admin_recovery_token,
        },
    );
    let state = AppState {
        api,
        identity: IdentityConfig {
            secret: settings.identity_secret,
            ttl_seconds: settings.identity_ttl_seconds,
        },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/identity/login", post(identity_login))
        .route("/content/text/:field", get(get_text).put(put_text))
        .route("/content/features", get(get_features).put(put_features))
        .route("/content/details", get(get_details).put(put_details))
        .route("/admin/status", get(admin_status))
        .route("/admin/caller", get(caller_admin))
        .route("/admin/initialize", post(initialize_admin))
        .route("/admin/reset", post(reset_admin))
        .route("/profile", get(get_profile).put(put_profile))
        .route("/password/verify", post(verify_password))
        .route("/password/enable", post(enable_password))
        .route("/password/disable", post(disable_password))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HandlerError> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %e, "health: storage check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn identity_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdentityLoginRequest>,
) -> Result<Json<IdentityLoginResponse>, HandlerError> {
    if req.username.trim().is_empty() {
        return Err(api_failure(ApiError::new(
            ErrorCode::Validation,
            "username must not be empty",
        )));
    }
    let principal = principal_for_username(&req.username);
    let (token, expires_at) = mint_session_token(&state.identity, &principal).map_err(|e| {
        api_failure(ApiError::new(
            ErrorCode::Internal,
            format!("token mint failed: {e}"),
        ))
    })?;
    info!(%principal, "identity: session issued");
    Ok(Json(IdentityLoginResponse {
        principal,
        token,
        expires_at,
    }))
}

async fn get_text(
    State(state): State<Arc<AppState>>,
    Path(field): Path<String>,
) -> Result<Json<TextValue>, HandlerError> {
    let field = parse_text_field(&field)?;
    let value = server_api::get_text_field(&state.api, field)
        .await
        .map_err(api_failure)?;
    Ok(Json(TextValue { value }))
}

async fn put_text(
    State(state): State<Arc<AppState>>,
    Path(field): Path<String>,
    headers: HeaderMap,
    Json(body): Json<TextValue>,
) -> Result<Json<UpdateContentResult>, HandlerError> {
    let field = parse_text_field(&field)?;
    let caller = caller_from_headers(&state, &headers)?;
    let result = server_api::update_text_field(&state.api, caller.as_ref(), field, &body.value)
        .await
        .map_err(api_failure)?;
    Ok(Json(result))
}

async fn get_features(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FeaturesBody>, HandlerError> {
    let items = server_api::get_features(&state.api)
        .await
        .map_err(api_failure)?;
    Ok(Json(FeaturesBody { items }))
}

async fn put_features(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<FeaturesBody>,
) -> Result<Json<UpdateContentResult>, HandlerError> {
    let caller = caller_from_headers(&state, &headers)?;
    let result = server_api::update_features(&state.api, caller.as_ref(), &body.items)
        .await
        .map_err(api_failure)?;
    Ok(Json(result))
}

async fn get_details(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GameDetails>, HandlerError> {
    let details = server_api::get_game_details(&state.api)
        .await
        .map_err(api_failure)?;
    Ok(Json(details))
}

async fn put_details(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(details): Json<GameDetails>,
) -> Result<Json<UpdateContentResult>, HandlerError> {
    let caller = caller_from_headers(&state, &headers)?;
    let result = server_api::update_game_details(&state.api, caller.as_ref(), &details)
        .await
        .map_err(api_failure)?;
    Ok(Json(result))
}

async fn admin_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AdminStatus>, HandlerError> {
    let admin_exists = server_api::admin_status(&state.api)
        .await
        .map_err(api_failure)?;
    Ok(Json(AdminStatus { admin_exists }))
}

async fn caller_admin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CallerAdmin>, HandlerError> {
    let caller = caller_from_headers(&state, &headers)?;
    let is_admin = server_api::is_caller_admin(&state.api, caller.as_ref())
        .await
        .map_err(api_failure)?;
    Ok(Json(CallerAdmin { is_admin }))
}

async fn initialize_admin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<InitializeAdminRequest>,
) -> Result<Json<AdminResult>, HandlerError> {
    let caller = caller_from_headers(&state, &headers)?;
    let result = server_api::initialize_admin(&state.api, caller.as_ref(), &req)
        .await
        .map_err(api_failure)?;
    Ok(Json(result))
}

async fn reset_admin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ResetAdminRequest>,
) -> Result<StatusCode, HandlerError> {
    let caller = caller_from_headers(&state, &headers)?;
    server_api::reset_admin(&state.api, caller.as_ref(), req.recovery_token.as_deref())
        .await
        .map_err(api_failure)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Option<UserProfile>>, HandlerError> {
    let caller = caller_from_headers(&state, &headers)?;
    let profile = server_api::caller_user_profile(&state.api, caller.as_ref())
        .await
        .map_err(api_failure)?;
    Ok(Json(profile))
}

async fn put_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(profile): Json<UserProfile>,
) -> Result<StatusCode, HandlerError> {
    let caller = caller_from_headers(&state, &headers)?;
    server_api::save_caller_user_profile(&state.api, caller.as_ref(), &profile)
        .await
        .map_err(api_failure)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn verify_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordRequest>,
) -> Result<Json<PasswordVerdict>, HandlerError> {
    let valid = server_api::verify_password(&state.api, &req.password)
        .await
        .map_err(api_failure)?;
    Ok(Json(PasswordVerdict { valid }))
}

async fn enable_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<PasswordRequest>,
) -> Result<Json<AdminResult>, HandlerError> {
    let caller = caller_from_headers(&state, &headers)?;
    let result = server_api::enable_password_protection(&state.api, caller.as_ref(), &req.password)
        .await
        .map_err(api_failure)?;
    Ok(Json(result))
}

async fn disable_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AdminResult>, HandlerError> {
    let caller = caller_from_headers(&state, &headers)?;
    let result = server_api::disable_password_protection(&state.api, caller.as_ref())
        .await
        .map_err(api_failure)?;
    Ok(Json(result))
}

/// No `Authorization` header means an anonymous caller; a bad token is rejected.
fn caller_from_headers(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Principal>, HandlerError> {
    let Some(raw) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let token = raw
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            api_failure(ApiError::new(
                ErrorCode::Unauthorized,
                "authorization header must be a bearer token",
            ))
        })?;
    verify_session_token(&state.identity, token)
        .map(Some)
        .map_err(|e| {
            warn!(error = %e, "identity: rejected session token");
            api_failure(ApiError::new(
                ErrorCode::Unauthorized,
                "invalid or expired session token",
            ))
        })
}

fn parse_text_field(raw: &str) -> Result<TextField, HandlerError> {
    TextField::from_str(raw)
        .map_err(|e| api_failure(ApiError::new(ErrorCode::NotFound, e.to_string())))
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_failure(err: ApiError) -> HandlerError {
    (status_for(err.code), Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
