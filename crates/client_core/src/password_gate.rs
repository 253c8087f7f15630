use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::accessor::ContentAccessor;

/// Never a valid password; verifying it tells whether protection is on.
pub const CHECK_ENABLED_SENTINEL: &str = "__check_enabled__";
pub const INCORRECT_PASSWORD_MESSAGE: &str = "Incorrect password. Please try again.";
pub const CHECK_FAILED_MESSAGE: &str = "Could not check press kit access. Please try again.";
pub const VERIFY_FAILED_MESSAGE: &str = "Could not verify the password. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Locked { error: Option<String> },
    Open,
}

/// Blocks the press kit until the session has entered the password.
///
/// Verification lives in memory only, so a new session is gated again.
/// There is no attempt counting.
pub struct PasswordGate {
    accessor: Arc<ContentAccessor>,
    verified: AtomicBool,
}

impl PasswordGate {
    pub fn new(accessor: Arc<ContentAccessor>) -> Self {
        Self {
            accessor,
            verified: AtomicBool::new(false),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::SeqCst)
    }

    pub async fn check_enabled(&self) -> anyhow::Result<bool> {
        self.accessor.password_protection_enabled().await
    }

    pub async fn state(&self) -> GateState {
        if self.is_verified() {
            return GateState::Open;
        }
        match self.check_enabled().await {
            Ok(false) => GateState::Open,
            Ok(true) => GateState::Locked { error: None },
            Err(error) => {
                warn!(%error, "gate: protection check failed, staying locked");
                GateState::Locked {
                    error: Some(CHECK_FAILED_MESSAGE.to_string()),
                }
            }
        }
    }

    pub async fn verify(&self, password: &SecretString) -> GateState {
        match self.accessor.verify_password(password.expose_secret()).await {
            Ok(true) => {
                self.verified.store(true, Ordering::SeqCst);
                info!("gate: press kit unlocked for this session");
                GateState::Open
            }
            Ok(false) => GateState::Locked {
                error: Some(INCORRECT_PASSWORD_MESSAGE.to_string()),
            },
            Err(error) => {
                warn!(%error, "gate: password verification failed");
                GateState::Locked {
                    error: Some(VERIFY_FAILED_MESSAGE.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/password_gate_tests.rs"]
mod tests;
