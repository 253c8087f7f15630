use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use shared::{
    domain::Principal,
    protocol::{IdentityLoginRequest, IdentityLoginResponse, IDENTITY_LOGIN_ROUTE},
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

use crate::backend::join_route;

/// An authenticated session with the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub principal: Principal,
    pub session_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Initializing,
    Idle,
    LoggingIn,
    Success,
    LoginError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("user is already authenticated")]
    AlreadyAuthenticated,
    #[error("login popup was blocked")]
    PopupBlocked,
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn login(&self) -> Result<Identity, LoginError>;
    async fn clear(&self);
    async fn identity(&self) -> Option<Identity>;
    async fn status(&self) -> LoginStatus;

    async fn principal(&self) -> Option<Principal> {
        self.identity().await.map(|identity| identity.principal)
    }
}

struct ProviderState {
    identity: Option<Identity>,
    status: LoginStatus,
}

/// Logs in against the development identity route of the reference server.
pub struct HttpIdentityProvider {
    http: Client,
    base_url: Url,
    username: Option<String>,
    state: RwLock<ProviderState>,
}

impl HttpIdentityProvider {
    pub fn new(base_url: Url, username: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            username: username.filter(|name| !name.trim().is_empty()),
            state: RwLock::new(ProviderState {
                identity: None,
                status: LoginStatus::Idle,
            }),
        }
    }

    async fn request_session(&self, username: &str) -> Result<Identity, LoginError> {
        let url = join_route(&self.base_url, IDENTITY_LOGIN_ROUTE)
            .map_err(|e| LoginError::Other(e.to_string()))?;
        let response: IdentityLoginResponse = self
            .http
            .post(url)
            .json(&IdentityLoginRequest {
                username: username.to_string(),
            })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| LoginError::Other(e.to_string()))?
            .json()
            .await
            .map_err(|e| LoginError::Other(e.to_string()))?;
        Ok(Identity {
            principal: response.principal,
            session_token: response.token,
            expires_at: Some(response.expires_at),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn login(&self) -> Result<Identity, LoginError> {
        {
            let mut guard = self.state.write().await;
            if guard.identity.is_some() {
                return Err(LoginError::AlreadyAuthenticated);
            }
            guard.status = LoginStatus::LoggingIn;
        }

        let result = match self.username.as_deref() {
            Some(username) => self.request_session(username).await,
            None => Err(LoginError::Other(
                "no username configured for sign-in".to_string(),
            )),
        };

        let mut guard = self.state.write().await;
        match &result {
            Ok(identity) => {
                info!(principal = %identity.principal, "identity: signed in");
                guard.identity = Some(identity.clone());
                guard.status = LoginStatus::Success;
            }
            Err(err) => {
                warn!(error = %err, "identity: sign-in failed");
                guard.status = LoginStatus::LoginError;
            }
        }
        result
    }

    async fn clear(&self) {
        let mut guard = self.state.write().await;
        guard.identity = None;
        guard.status = LoginStatus::Idle;
    }

    async fn identity(&self) -> Option<Identity> {
        let guard = self.state.read().await;
        let identity = guard.identity.clone()?;
        match identity.expires_at {
            Some(expires_at) if expires_at <= Utc::now() => None,
            _ => Some(identity),
        }
    }

    async fn status(&self) -> LoginStatus {
        self.state.read().await.status
    }
}
