//! Admin bootstrap: turns identity and admin-role queries into one screen
//! and owns the one-time admin claim for each signed-in session.

use std::{sync::Arc, time::Duration};

use shared::{domain::Principal, protocol::AdminResult};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    accessor::ContentAccessor,
    error::ClientError,
    identity::{IdentityProvider, LoginError, LoginStatus},
};

pub const LOGIN_RETRY_DELAY: Duration = Duration::from_millis(300);
pub const POPUP_BLOCKED_MESSAGE: &str =
    "Popup blocked. Please allow popups for this site and try again.";
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please try again.";
pub const ACCESS_DENIED_MESSAGE: &str = "Your account does not have admin privileges.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimLatch {
    NotAttempted,
    Attempted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState<T> {
    Loading,
    Ready(T),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingMutation {
    Claim,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckingReason {
    Loading,
    SettingUpAdmin,
    Resetting,
}

impl CheckingReason {
    pub fn message(self) -> &'static str {
        match self {
            CheckingReason::Loading => "Loading...",
            CheckingReason::SettingUpAdmin => "Initializing admin...",
            CheckingReason::Resetting => "Resetting admin access...",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminScreen {
    Checking(CheckingReason),
    SignIn {
        login_error: Option<String>,
        signing_in: bool,
    },
    Unavailable {
        message: String,
    },
    ClaimFailed {
        message: String,
        notice: Option<String>,
    },
    Denied {
        notice: Option<String>,
    },
    Dashboard {
        principal: Principal,
    },
}

impl AdminScreen {
    /// Reset-and-reclaim is offered only on the access-denied screens.
    pub fn can_reset(&self) -> bool {
        matches!(
            self,
            AdminScreen::ClaimFailed { .. } | AdminScreen::Denied { .. }
        )
    }
}

/// Setup tokens passed to the claim call. Empty by default.
#[derive(Debug, Clone, Default)]
pub struct AdminTokens {
    pub admin_token: String,
    pub user_provided_token: String,
}

/// Everything the screen decision depends on, captured at one instant.
#[derive(Debug, Clone)]
pub struct BootstrapSnapshot {
    pub identity_initializing: bool,
    pub principal: Option<Principal>,
    pub admin_exists: QueryState<bool>,
    pub caller_is_admin: QueryState<bool>,
    pub latch: ClaimLatch,
    pub pending: Option<PendingMutation>,
    pub login_error: Option<String>,
    pub signing_in: bool,
    pub notice: Option<String>,
}

impl BootstrapSnapshot {
    pub fn should_auto_claim(&self) -> bool {
        self.principal.is_some()
            && self.admin_exists == QueryState::Ready(false)
            && self.latch == ClaimLatch::NotAttempted
            && self.pending.is_none()
    }

    /// First matching state wins.
    pub fn screen(&self) -> AdminScreen {
        if self.identity_initializing {
            return AdminScreen::Checking(CheckingReason::Loading);
        }
        match self.pending {
            Some(PendingMutation::Claim) => {
                return AdminScreen::Checking(CheckingReason::SettingUpAdmin)
            }
            Some(PendingMutation::Reset) => {
                return AdminScreen::Checking(CheckingReason::Resetting)
            }
            None => {}
        }
        if self.admin_exists == QueryState::Loading
            || (self.principal.is_some() && self.caller_is_admin == QueryState::Loading)
        {
            return AdminScreen::Checking(CheckingReason::Loading);
        }
        if self.should_auto_claim() {
            return AdminScreen::Checking(CheckingReason::SettingUpAdmin);
        }

        let Some(principal) = &self.principal else {
            return AdminScreen::SignIn {
                login_error: self.login_error.clone(),
                signing_in: self.signing_in,
            };
        };

        if let QueryState::Failed(message) = &self.admin_exists {
            return AdminScreen::Unavailable {
                message: message.clone(),
            };
        }
        if let ClaimLatch::Failed(message) = &self.latch {
            return AdminScreen::ClaimFailed {
                message: message.clone(),
                notice: self.notice.clone(),
            };
        }
        if self.caller_is_admin == QueryState::Ready(true) {
            return AdminScreen::Dashboard {
                principal: principal.clone(),
            };
        }
        AdminScreen::Denied {
            notice: self.notice.clone(),
        }
    }
}

struct SessionState {
    observed: Option<Principal>,
    generation: u64,
    latch: ClaimLatch,
    pending: Option<PendingMutation>,
    admin_exists: QueryState<bool>,
    caller_is_admin: QueryState<bool>,
    login_error: Option<String>,
    signing_in: bool,
    notice: Option<String>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            observed: None,
            generation: 0,
            latch: ClaimLatch::NotAttempted,
            pending: None,
            admin_exists: QueryState::Loading,
            caller_is_admin: QueryState::Loading,
            login_error: None,
            signing_in: false,
            notice: None,
        }
    }

    fn snapshot(&self, identity_initializing: bool) -> BootstrapSnapshot {
        BootstrapSnapshot {
            identity_initializing,
            principal: self.observed.clone(),
            admin_exists: self.admin_exists.clone(),
            caller_is_admin: self.caller_is_admin.clone(),
            latch: self.latch.clone(),
            pending: self.pending,
            login_error: self.login_error.clone(),
            signing_in: self.signing_in,
            notice: self.notice.clone(),
        }
    }
}

pub struct AdminBootstrap {
    accessor: Arc<ContentAccessor>,
    identity: Arc<dyn IdentityProvider>,
    tokens: AdminTokens,
    state: Mutex<SessionState>,
}

impl AdminBootstrap {
    pub fn new(accessor: Arc<ContentAccessor>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_tokens(accessor, identity, AdminTokens::default())
    }

    pub fn with_tokens(
        accessor: Arc<ContentAccessor>,
        identity: Arc<dyn IdentityProvider>,
        tokens: AdminTokens,
    ) -> Self {
        Self {
            accessor,
            identity,
            tokens,
            state: Mutex::new(SessionState::new()),
        }
    }

    pub fn accessor(&self) -> &Arc<ContentAccessor> {
        &self.accessor
    }

    pub async fn snapshot(&self) -> BootstrapSnapshot {
        let initializing = self.identity.status().await == LoginStatus::Initializing;
        self.state.lock().await.snapshot(initializing)
    }

    pub async fn screen(&self) -> AdminScreen {
        self.snapshot().await.screen()
    }

    /// Re-reads identity and admin queries, claiming the slot when due.
    pub async fn refresh(&self) -> AdminScreen {
        let generation = self.observe_identity().await;
        self.load_admin_queries(generation).await;
        if self.claim_if_due(generation).await {
            self.load_admin_queries(generation).await;
        }
        self.screen().await
    }

    /// Clears the admin slot, then lets the caller claim it again.
    ///
    /// A failed reset is reported on the resulting screen rather than as an
    /// error; only a missing sign-in is an error.
    pub async fn reset_and_reclaim(
        &self,
        recovery_token: Option<&str>,
    ) -> Result<AdminScreen, ClientError> {
        let generation = self.observe_identity().await;
        {
            let mut state = self.state.lock().await;
            if state.observed.is_none() {
                return Err(ClientError::NotAuthenticated);
            }
            if state.pending.is_some() {
                drop(state);
                return Ok(self.screen().await);
            }
            state.pending = Some(PendingMutation::Reset);
            state.notice = None;
        }

        let result = self.accessor.reset_admin(recovery_token).await;
        let reset = {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                info!("admin: discarding reset result from a previous session");
                false
            } else {
                state.pending = None;
                match result {
                    Ok(()) => {
                        info!("admin: slot reset, reclaiming");
                        state.latch = ClaimLatch::NotAttempted;
                        state.admin_exists = QueryState::Loading;
                        state.caller_is_admin = QueryState::Loading;
                        true
                    }
                    Err(error) => {
                        warn!(%error, "admin: reset failed");
                        state.notice = Some(ClientError::from_backend(error).to_string());
                        false
                    }
                }
            }
        };

        if reset {
            self.load_admin_queries(generation).await;
            if self.claim_if_due(generation).await {
                self.load_admin_queries(generation).await;
            }
        }
        Ok(self.screen().await)
    }

    /// Clears a failed claim and re-evaluates from fresh queries.
    pub async fn retry(&self) -> AdminScreen {
        {
            let mut state = self.state.lock().await;
            if state.pending.is_none() {
                state.latch = ClaimLatch::NotAttempted;
            }
            state.notice = None;
            state.admin_exists = QueryState::Loading;
            state.caller_is_admin = QueryState::Loading;
        }
        self.accessor.invalidate_admin_queries().await;
        self.refresh().await
    }

    pub async fn sign_in(&self) -> AdminScreen {
        {
            let mut state = self.state.lock().await;
            state.signing_in = true;
            state.login_error = None;
        }

        let outcome = match self.identity.login().await {
            Err(LoginError::AlreadyAuthenticated) => {
                info!("identity: stale session, clearing and retrying sign-in");
                self.identity.clear().await;
                tokio::time::sleep(LOGIN_RETRY_DELAY).await;
                self.identity.login().await
            }
            other => other,
        };

        {
            let mut state = self.state.lock().await;
            state.signing_in = false;
            if let Err(error) = &outcome {
                warn!(%error, "identity: sign-in failed");
                state.login_error = Some(login_error_message(error).to_string());
            }
        }
        self.refresh().await
    }

    pub async fn sign_out(&self) -> AdminScreen {
        self.identity.clear().await;
        self.accessor.invalidate_all().await;
        self.refresh().await
    }

    /// Records the current principal, starting a new session when it changed.
    async fn observe_identity(&self) -> u64 {
        let principal = self.identity.principal().await;
        let mut state = self.state.lock().await;
        if state.observed != principal {
            info!(
                principal = principal.as_ref().map(Principal::as_str).unwrap_or("<anonymous>"),
                "admin: identity changed, resetting claim latch"
            );
            state.observed = principal;
            state.generation += 1;
            state.latch = ClaimLatch::NotAttempted;
            state.pending = None;
            state.notice = None;
            state.admin_exists = QueryState::Loading;
            state.caller_is_admin = QueryState::Loading;
            drop(state);
            self.accessor.invalidate_admin_queries().await;
            return self.state.lock().await.generation;
        }
        state.generation
    }

    async fn load_admin_queries(&self, generation: u64) {
        let authenticated = self.state.lock().await.observed.is_some();
        let (admin_exists, caller_is_admin) = tokio::join!(
            self.accessor.admin_status(),
            async {
                if authenticated {
                    self.accessor.is_caller_admin().await
                } else {
                    Ok(false)
                }
            }
        );

        let mut state = self.state.lock().await;
        if state.generation != generation {
            return;
        }
        state.admin_exists = match admin_exists {
            Ok(exists) => QueryState::Ready(exists),
            Err(error) => {
                warn!(%error, "admin: status query failed");
                QueryState::Failed(ClientError::from_backend(error).to_string())
            }
        };
        state.caller_is_admin = match caller_is_admin {
            Ok(is_admin) => QueryState::Ready(is_admin),
            Err(error) => {
                warn!(%error, "admin: caller role query failed, treating as non-admin");
                QueryState::Ready(false)
            }
        };
    }

    /// Invokes the claim at most once per session. Returns whether it succeeded.
    async fn claim_if_due(&self, generation: u64) -> bool {
        {
            let mut state = self.state.lock().await;
            let due = state.generation == generation
                && state.snapshot(false).should_auto_claim();
            if !due {
                return false;
            }
            state.latch = ClaimLatch::Attempted;
            state.pending = Some(PendingMutation::Claim);
        }

        info!("admin: no admin yet, claiming slot");
        let result = self
            .accessor
            .initialize_admin(&self.tokens.admin_token, &self.tokens.user_provided_token)
            .await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            info!("admin: discarding claim result from a previous session");
            return false;
        }
        state.pending = None;
        match result {
            Ok(AdminResult::Success) => {
                info!("admin: claim succeeded");
                state.admin_exists = QueryState::Loading;
                state.caller_is_admin = QueryState::Loading;
                true
            }
            Ok(AdminResult::Error(message)) => {
                warn!(%message, "admin: claim rejected");
                state.latch = ClaimLatch::Failed(message);
                false
            }
            Err(error) => {
                warn!(%error, "admin: claim failed");
                state.latch = ClaimLatch::Failed(ClientError::from_backend(error).to_string());
                false
            }
        }
    }
}

pub fn login_error_message(error: &LoginError) -> &'static str {
    match error {
        LoginError::PopupBlocked => POPUP_BLOCKED_MESSAGE,
        LoginError::AlreadyAuthenticated | LoginError::Other(_) => LOGIN_FAILED_MESSAGE,
    }
}

#[cfg(test)]
#[path = "tests/bootstrap_tests.rs"]
mod tests;
