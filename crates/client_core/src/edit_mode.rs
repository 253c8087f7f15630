use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::info;

use crate::error::ClientError;

/// Process-wide editing flag shared by every page. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct EditMode {
    enabled: Arc<AtomicBool>,
}

impl EditMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flips the flag. Only the admin may turn editing on.
    pub fn toggle(&self, caller_is_admin: bool) -> Result<bool, ClientError> {
        if !caller_is_admin {
            self.disable();
            return Err(ClientError::NotAdmin);
        }
        let now_enabled = !self.enabled.fetch_xor(true, Ordering::SeqCst);
        info!(enabled = now_enabled, "edit mode: toggled");
        Ok(now_enabled)
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Drops out of editing when the caller lost the admin role.
    pub fn sync_with_role(&self, caller_is_admin: bool) {
        if !caller_is_admin {
            self.disable();
        }
    }
}
