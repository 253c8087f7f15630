use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{GameDetails, TextField, UserProfile},
    error::{ApiError, ApiException},
    protocol::{
        text_route, AdminResult, AdminStatus, CallerAdmin, FeaturesBody, InitializeAdminRequest,
        PasswordRequest, PasswordVerdict, ResetAdminRequest, TextValue, UpdateContentResult,
        ADMIN_CALLER_ROUTE, ADMIN_INITIALIZE_ROUTE, ADMIN_RESET_ROUTE, ADMIN_STATUS_ROUTE,
        DETAILS_ROUTE, FEATURES_ROUTE, PASSWORD_DISABLE_ROUTE, PASSWORD_ENABLE_ROUTE,
        PASSWORD_VERIFY_ROUTE, PROFILE_ROUTE,
    },
};
use tracing::warn;
use url::Url;

use crate::identity::IdentityProvider;

/// Content and admin service the pages talk to, acting as the current caller.
#[async_trait]
pub trait PressKitBackend: Send + Sync {
    async fn get_text(&self, field: TextField) -> Result<String>;
    async fn get_features(&self) -> Result<Vec<String>>;
    async fn get_game_details(&self) -> Result<GameDetails>;
    async fn get_admin_status(&self) -> Result<bool>;
    async fn is_caller_admin(&self) -> Result<bool>;
    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>>;
    async fn verify_password(&self, password: &str) -> Result<bool>;

    async fn update_text(&self, field: TextField, value: &str) -> Result<UpdateContentResult>;
    async fn update_features(&self, items: &[String]) -> Result<UpdateContentResult>;
    async fn update_game_details(&self, details: &GameDetails) -> Result<UpdateContentResult>;
    async fn save_caller_user_profile(&self, name: &str) -> Result<()>;
    async fn initialize_admin(
        &self,
        admin_token: &str,
        user_provided_token: &str,
    ) -> Result<AdminResult>;
    async fn reset_admin(&self, recovery_token: Option<&str>) -> Result<()>;
    async fn enable_password_protection(&self, password: &str) -> Result<AdminResult>;
    async fn disable_password_protection(&self) -> Result<AdminResult>;
}

/// Stand-in used when no server is configured; every call fails.
pub struct UnavailableBackend;

fn unavailable<T>() -> Result<T> {
    Err(anyhow!("press kit backend unavailable: no server configured"))
}

#[async_trait]
impl PressKitBackend for UnavailableBackend {
    async fn get_text(&self, _field: TextField) -> Result<String> {
        unavailable()
    }

    async fn get_features(&self) -> Result<Vec<String>> {
        unavailable()
    }

    async fn get_game_details(&self) -> Result<GameDetails> {
        unavailable()
    }

    async fn get_admin_status(&self) -> Result<bool> {
        unavailable()
    }

    async fn is_caller_admin(&self) -> Result<bool> {
        unavailable()
    }

    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>> {
        unavailable()
    }

    async fn verify_password(&self, _password: &str) -> Result<bool> {
        unavailable()
    }

    async fn update_text(&self, _field: TextField, _value: &str) -> Result<UpdateContentResult> {
        unavailable()
    }

    async fn update_features(&self, _items: &[String]) -> Result<UpdateContentResult> {
        unavailable()
    }

    async fn update_game_details(&self, _details: &GameDetails) -> Result<UpdateContentResult> {
        unavailable()
    }

    async fn save_caller_user_profile(&self, _name: &str) -> Result<()> {
        unavailable()
    }

    async fn initialize_admin(
        &self,
        _admin_token: &str,
        _user_provided_token: &str,
    ) -> Result<AdminResult> {
        unavailable()
    }

    async fn reset_admin(&self, _recovery_token: Option<&str>) -> Result<()> {
        unavailable()
    }

    async fn enable_password_protection(&self, _password: &str) -> Result<AdminResult> {
        unavailable()
    }

    async fn disable_password_protection(&self) -> Result<AdminResult> {
        unavailable()
    }
}

/// JSON-over-HTTP client for the reference server.
pub struct HttpBackend {
    http: Client,
    base_url: Url,
    identity: Arc<dyn IdentityProvider>,
}

impl HttpBackend {
    pub fn new(base_url: Url, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            identity,
        }
    }

    fn url(&self, route: &str) -> Result<Url> {
        join_route(&self.base_url, route)
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.identity.identity().await {
            Some(identity) => request.bearer_auth(identity.session_token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T> {
        let request = self.authorized(self.http.get(self.url(route)?)).await;
        decode(request.send().await.with_context(|| format!("GET {route}"))?).await
    }

    async fn send_json<B: serde::Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        route: &str,
        body: &B,
    ) -> Result<T> {
        let request = self
            .authorized(self.http.request(method.clone(), self.url(route)?))
            .await
            .json(body);
        decode(
            request
                .send()
                .await
                .with_context(|| format!("{method} {route}"))?,
        )
        .await
    }

    async fn send_empty<B: serde::Serialize + Sync>(
        &self,
        method: reqwest::Method,
        route: &str,
        body: &B,
    ) -> Result<()> {
        let request = self
            .authorized(self.http.request(method.clone(), self.url(route)?))
            .await
            .json(body);
        let response = request
            .send()
            .await
            .with_context(|| format!("{method} {route}"))?;
        check_status(response).await?;
        Ok(())
    }
}

/// Joins an absolute route onto `base`, keeping any path prefix on the base.
pub(crate) fn join_route(base: &Url, route: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(route.trim_start_matches('/'))
        .with_context(|| format!("invalid route '{route}' for base url '{base}'"))
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(error) => {
            warn!(%status, %error, "backend: failed to read error body");
            return Err(anyhow!("backend returned {status}: unreadable body: {error}"));
        }
    };
    match serde_json::from_slice::<ApiError>(&body) {
        Ok(api_error) => Err(ApiException::from(api_error).into()),
        Err(_) => Err(anyhow!("backend returned {status}")),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .context("backend returned an unexpected body")
}

#[async_trait]
impl PressKitBackend for HttpBackend {
    async fn get_text(&self, field: TextField) -> Result<String> {
        let body: TextValue = self.get_json(&text_route(field)).await?;
        Ok(body.value)
    }

    async fn get_features(&self) -> Result<Vec<String>> {
        let body: FeaturesBody = self.get_json(FEATURES_ROUTE).await?;
        Ok(body.items)
    }

    async fn get_game_details(&self) -> Result<GameDetails> {
        self.get_json(DETAILS_ROUTE).await
    }

    async fn get_admin_status(&self) -> Result<bool> {
        let body: AdminStatus = self.get_json(ADMIN_STATUS_ROUTE).await?;
        Ok(body.admin_exists)
    }

    async fn is_caller_admin(&self) -> Result<bool> {
        let body: CallerAdmin = self.get_json(ADMIN_CALLER_ROUTE).await?;
        Ok(body.is_admin)
    }

    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>> {
        self.get_json(PROFILE_ROUTE).await
    }

    async fn verify_password(&self, password: &str) -> Result<bool> {
        let verdict: PasswordVerdict = self
            .send_json(
                reqwest::Method::POST,
                PASSWORD_VERIFY_ROUTE,
                &PasswordRequest {
                    password: password.to_string(),
                },
            )
            .await?;
        Ok(verdict.valid)
    }

    async fn update_text(&self, field: TextField, value: &str) -> Result<UpdateContentResult> {
        self.send_json(
            reqwest::Method::PUT,
            &text_route(field),
            &TextValue {
                value: value.to_string(),
            },
        )
        .await
    }

    async fn update_features(&self, items: &[String]) -> Result<UpdateContentResult> {
        self.send_json(
            reqwest::Method::PUT,
            FEATURES_ROUTE,
            &FeaturesBody {
                items: items.to_vec(),
            },
        )
        .await
    }

    async fn update_game_details(&self, details: &GameDetails) -> Result<UpdateContentResult> {
        self.send_json(reqwest::Method::PUT, DETAILS_ROUTE, details)
            .await
    }

    async fn save_caller_user_profile(&self, name: &str) -> Result<()> {
        self.send_empty(
            reqwest::Method::PUT,
            PROFILE_ROUTE,
            &UserProfile {
                name: name.to_string(),
            },
        )
        .await
    }

    async fn initialize_admin(
        &self,
        admin_token: &str,
        user_provided_token: &str,
    ) -> Result<AdminResult> {
        self.send_json(
            reqwest::Method::POST,
            ADMIN_INITIALIZE_ROUTE,
            &InitializeAdminRequest {
                admin_token: admin_token.to_string(),
                user_provided_token: user_provided_token.to_string(),
            },
        )
        .await
    }

    async fn reset_admin(&self, recovery_token: Option<&str>) -> Result<()> {
        self.send_empty(
            reqwest::Method::POST,
            ADMIN_RESET_ROUTE,
            &ResetAdminRequest {
                recovery_token: recovery_token.map(str::to_string),
            },
        )
        .await
    }

    async fn enable_password_protection(&self, password: &str) -> Result<AdminResult> {
        self.send_json(
            reqwest::Method::POST,
            PASSWORD_ENABLE_ROUTE,
            &PasswordRequest {
                password: password.to_string(),
            },
        )
        .await
    }

    async fn disable_password_protection(&self) -> Result<AdminResult> {
        self.send_json(
            reqwest::Method::POST,
            PASSWORD_DISABLE_ROUTE,
            &serde_json::json!({}),
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
