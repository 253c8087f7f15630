//! In-process collaborators shared by the unit tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{GameDetails, Principal, TextField, UserProfile},
    error::{ApiException, ErrorCode},
    protocol::{AdminResult, UpdateContentResult},
};
use tokio::sync::Mutex;

use crate::{
    accessor::ContentAccessor,
    backend::PressKitBackend,
    identity::{Identity, IdentityProvider, LoginError, LoginStatus},
};

pub(crate) const RECOVERY_TOKEN: &str = "recover";

#[derive(Default)]
pub(crate) struct WorldState {
    pub admin: Option<Principal>,
    pub text: HashMap<TextField, String>,
    pub features: Vec<String>,
    pub details: GameDetails,
    pub password: Option<String>,
    pub profiles: HashMap<Principal, UserProfile>,
    pub claim_calls: usize,
    pub reset_calls: usize,
    pub fetches: HashMap<&'static str, usize>,
    /// Upcoming reads that fail before succeeding again.
    pub failing_reads: usize,
    pub offline: bool,
    pub fail_updates: bool,
    pub reject_claims: Option<String>,
}

/// Backend state shared by every fake client in a test.
#[derive(Clone, Default)]
pub(crate) struct FakeWorld(pub Arc<Mutex<WorldState>>);

impl FakeWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fetches(&self, name: &str) -> usize {
        self.0.lock().await.fetches.get(name).copied().unwrap_or(0)
    }
}

pub(crate) fn identity_for(name: &str) -> Identity {
    Identity {
        principal: Principal::new(format!("{name}-principal")),
        session_token: format!("{name}-token"),
        expires_at: None,
    }
}

pub(crate) struct FakeIdentity {
    current: Mutex<Option<Identity>>,
    logins: Mutex<VecDeque<Result<Identity, LoginError>>>,
    pub logins_attempted: AtomicUsize,
    pub clears: AtomicUsize,
}

impl FakeIdentity {
    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(None),
            logins: Mutex::new(VecDeque::new()),
            logins_attempted: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        })
    }

    pub fn signed_in(name: &str) -> Arc<Self> {
        let identity = Self::signed_out();
        identity
            .current
            .try_lock()
            .expect("fresh identity lock")
            .replace(identity_for(name));
        identity
    }

    pub async fn switch_to(&self, name: Option<&str>) {
        *self.current.lock().await = name.map(identity_for);
    }

    pub async fn queue_login(&self, result: Result<Identity, LoginError>) {
        self.logins.lock().await.push_back(result);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn login(&self) -> Result<Identity, LoginError> {
        self.logins_attempted.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.lock().await;
        if current.is_some() {
            return Err(LoginError::AlreadyAuthenticated);
        }
        match self.logins.lock().await.pop_front() {
            Some(Ok(identity)) => {
                *current = Some(identity.clone());
                Ok(identity)
            }
            Some(Err(err)) => Err(err),
            None => Err(LoginError::Other("no scripted login".into())),
        }
    }

    async fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().await = None;
    }

    async fn identity(&self) -> Option<Identity> {
        self.current.lock().await.clone()
    }

    async fn status(&self) -> LoginStatus {
        LoginStatus::Idle
    }
}

/// One client's view of the shared world, acting as its identity's caller.
pub(crate) struct FakeBackend {
    world: FakeWorld,
    identity: Arc<FakeIdentity>,
}

impl FakeBackend {
    pub fn new(world: FakeWorld, identity: Arc<FakeIdentity>) -> Self {
        Self { world, identity }
    }

    async fn caller(&self) -> Option<Principal> {
        self.identity.principal().await
    }

    async fn read(&self, name: &'static str) -> Result<tokio::sync::MutexGuard<'_, WorldState>> {
        let mut world = self.world.0.lock().await;
        *world.fetches.entry(name).or_default() += 1;
        if world.offline {
            return Err(anyhow!("connection refused"));
        }
        if world.failing_reads > 0 {
            world.failing_reads -= 1;
            return Err(anyhow!("transient failure"));
        }
        Ok(world)
    }

    async fn write(&self) -> Result<tokio::sync::MutexGuard<'_, WorldState>> {
        let world = self.world.0.lock().await;
        if world.offline || world.fail_updates {
            return Err(anyhow!("connection refused"));
        }
        Ok(world)
    }

    async fn admin_write(&self) -> Result<Option<tokio::sync::MutexGuard<'_, WorldState>>> {
        let caller = self.caller().await;
        let world = self.write().await?;
        let is_admin = caller.is_some() && world.admin == caller;
        Ok(is_admin.then_some(world))
    }
}

pub(crate) fn client(world: &FakeWorld, identity: &Arc<FakeIdentity>) -> Arc<ContentAccessor> {
    Arc::new(ContentAccessor::new(Arc::new(FakeBackend::new(
        world.clone(),
        Arc::clone(identity),
    ))))
}

#[async_trait]
impl PressKitBackend for FakeBackend {
    async fn get_text(&self, field: TextField) -> Result<String> {
        let world = self.read("text").await?;
        Ok(world
            .text
            .get(&field)
            .cloned()
            .unwrap_or_else(|| field.default_value().to_string()))
    }

    async fn get_features(&self) -> Result<Vec<String>> {
        Ok(self.read("features").await?.features.clone())
    }

    async fn get_game_details(&self) -> Result<GameDetails> {
        Ok(self.read("details").await?.details.clone())
    }

    async fn get_admin_status(&self) -> Result<bool> {
        Ok(self.read("admin_status").await?.admin.is_some())
    }

    async fn is_caller_admin(&self) -> Result<bool> {
        let caller = self.caller().await;
        let world = self.read("is_caller_admin").await?;
        Ok(caller.is_some() && world.admin == caller)
    }

    async fn get_caller_user_profile(&self) -> Result<Option<UserProfile>> {
        let caller = self
            .caller()
            .await
            .ok_or_else(|| ApiException::new(ErrorCode::Unauthorized, "sign in required"))?;
        Ok(self.read("profile").await?.profiles.get(&caller).cloned())
    }

    async fn verify_password(&self, password: &str) -> Result<bool> {
        let world = self.read("verify_password").await?;
        Ok(match &world.password {
            None => true,
            Some(expected) => expected == password,
        })
    }

    async fn update_text(&self, field: TextField, value: &str) -> Result<UpdateContentResult> {
        let Some(mut world) = self.admin_write().await? else {
            return Ok(UpdateContentResult::NotAdmin);
        };
        world.text.insert(field, value.to_string());
        Ok(UpdateContentResult::Success)
    }

    async fn update_features(&self, items: &[String]) -> Result<UpdateContentResult> {
        let Some(mut world) = self.admin_write().await? else {
            return Ok(UpdateContentResult::NotAdmin);
        };
        world.features = items.to_vec();
        Ok(UpdateContentResult::Success)
    }

    async fn update_game_details(&self, details: &GameDetails) -> Result<UpdateContentResult> {
        let Some(mut world) = self.admin_write().await? else {
            return Ok(UpdateContentResult::NotAdmin);
        };
        world.details = details.clone();
        Ok(UpdateContentResult::Success)
    }

    async fn save_caller_user_profile(&self, name: &str) -> Result<()> {
        let caller = self
            .caller()
            .await
            .ok_or_else(|| ApiException::new(ErrorCode::Unauthorized, "sign in required"))?;
        let mut world = self.write().await?;
        world.profiles.insert(
            caller,
            UserProfile {
                name: name.to_string(),
            },
        );
        Ok(())
    }

    async fn initialize_admin(
        &self,
        _admin_token: &str,
        _user_provided_token: &str,
    ) -> Result<AdminResult> {
        let caller = self
            .caller()
            .await
            .ok_or_else(|| ApiException::new(ErrorCode::Unauthorized, "sign in required"))?;
        tokio::task::yield_now().await;
        let mut world = self.write().await?;
        world.claim_calls += 1;
        if let Some(message) = &world.reject_claims {
            return Ok(AdminResult::Error(message.clone()));
        }
        match &world.admin {
            None => {
                world.admin = Some(caller);
                Ok(AdminResult::Success)
            }
            Some(current) if *current == caller => Ok(AdminResult::Success),
            Some(_) => Ok(AdminResult::error("Admin has already been initialized")),
        }
    }

    async fn reset_admin(&self, recovery_token: Option<&str>) -> Result<()> {
        let caller = self
            .caller()
            .await
            .ok_or_else(|| ApiException::new(ErrorCode::Unauthorized, "sign in required"))?;
        let mut world = self.write().await?;
        world.reset_calls += 1;
        let allowed = match &world.admin {
            None => true,
            Some(current) if *current == caller => true,
            Some(_) => recovery_token == Some(RECOVERY_TOKEN),
        };
        if !allowed {
            return Err(ApiException::new(
                ErrorCode::Forbidden,
                "only the current admin or a recovery token holder can reset admin access",
            )
            .into());
        }
        world.admin = None;
        Ok(())
    }

    async fn enable_password_protection(&self, password: &str) -> Result<AdminResult> {
        let Some(mut world) = self.admin_write().await? else {
            return Ok(AdminResult::error(
                "Only the admin can change password protection",
            ));
        };
        if password.is_empty() {
            return Ok(AdminResult::error("Password must not be empty"));
        }
        world.password = Some(password.to_string());
        Ok(AdminResult::Success)
    }

    async fn disable_password_protection(&self) -> Result<AdminResult> {
        let Some(mut world) = self.admin_write().await? else {
            return Ok(AdminResult::error(
                "Only the admin can change password protection",
            ));
        };
        world.password = None;
        Ok(AdminResult::Success)
    }
}
