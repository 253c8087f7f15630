use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use shared::{
    domain::{normalize_features, DetailField, GameDetails, TextField, UserProfile},
    protocol::{AdminResult, UpdateContentResult},
};
use tokio::{sync::RwLock, time::Instant};
use tracing::{debug, warn};

use crate::{backend::PressKitBackend, password_gate::CHECK_ENABLED_SENTINEL};

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(30);
pub const ADMIN_STALE_TIME: Duration = Duration::ZERO;
pub const QUERY_RETRIES: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Text(TextField),
    Features,
    GameDetails,
    AdminStatus,
    IsCallerAdmin,
    PasswordEnabled,
    CallerProfile,
}

impl QueryKey {
    pub fn is_admin_query(self) -> bool {
        matches!(self, QueryKey::AdminStatus | QueryKey::IsCallerAdmin)
    }

    pub fn stale_time(self) -> Duration {
        if self.is_admin_query() {
            ADMIN_STALE_TIME
        } else {
            DEFAULT_STALE_TIME
        }
    }
}

#[derive(Debug, Clone)]
enum CachedValue {
    Text(String),
    Features(Vec<String>),
    Details(GameDetails),
    Flag(bool),
    Profile(Option<UserProfile>),
}

struct CachedEntry {
    value: CachedValue,
    fetched_at: Instant,
}

/// Cached reads and invalidate-on-write mutations over a [`PressKitBackend`].
pub struct ContentAccessor {
    backend: Arc<dyn PressKitBackend>,
    cache: RwLock<HashMap<QueryKey, CachedEntry>>,
}

impl ContentAccessor {
    pub fn new(backend: Arc<dyn PressKitBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn PressKitBackend> {
        &self.backend
    }

    async fn cached<F, Fut>(&self, key: QueryKey, fetch: F) -> Result<CachedValue>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<CachedValue>>,
    {
        if let Some(entry) = self.cache.read().await.get(&key) {
            if entry.fetched_at.elapsed() < key.stale_time() {
                return Ok(entry.value.clone());
            }
        }

        let mut attempt = 0;
        let value = loop {
            match fetch().await {
                Ok(value) => break value,
                Err(err) if attempt < QUERY_RETRIES => {
                    attempt += 1;
                    warn!(?key, error = %err, attempt, "query: fetch failed, retrying");
                }
                Err(err) => return Err(err),
            }
        };

        debug!(?key, "query: fetched");
        self.cache.write().await.insert(
            key,
            CachedEntry {
                value: value.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(value)
    }

    pub async fn invalidate(&self, key: QueryKey) {
        self.cache.write().await.remove(&key);
    }

    pub async fn invalidate_admin_queries(&self) {
        self.cache
            .write()
            .await
            .retain(|key, _| !key.is_admin_query());
    }

    pub async fn invalidate_all(&self) {
        self.cache.write().await.clear();
    }

    pub async fn text(&self, field: TextField) -> Result<String> {
        match self
            .cached(QueryKey::Text(field), || async {
                Ok(CachedValue::Text(self.backend.get_text(field).await?))
            })
            .await?
        {
            CachedValue::Text(value) => Ok(value),
            other => Err(mismatch(QueryKey::Text(field), &other)),
        }
    }

    pub async fn game_title(&self) -> Result<String> {
        self.text(TextField::GameTitle).await
    }

    pub async fn tagline(&self) -> Result<String> {
        self.text(TextField::Tagline).await
    }

    pub async fn about_text(&self) -> Result<String> {
        self.text(TextField::AboutText).await
    }

    pub async fn instagram_link(&self) -> Result<String> {
        self.text(TextField::InstagramLink).await
    }

    pub async fn developer_link(&self) -> Result<String> {
        self.text(TextField::DeveloperLink).await
    }

    pub async fn press_email(&self) -> Result<String> {
        self.text(TextField::PressEmail).await
    }

    pub async fn body_text_color(&self) -> Result<String> {
        self.text(TextField::BodyTextColor).await
    }

    pub async fn features(&self) -> Result<Vec<String>> {
        match self
            .cached(QueryKey::Features, || async {
                Ok(CachedValue::Features(self.backend.get_features().await?))
            })
            .await?
        {
            CachedValue::Features(items) => Ok(items),
            other => Err(mismatch(QueryKey::Features, &other)),
        }
    }

    pub async fn game_details(&self) -> Result<GameDetails> {
        match self
            .cached(QueryKey::GameDetails, || async {
                Ok(CachedValue::Details(self.backend.get_game_details().await?))
            })
            .await?
        {
            CachedValue::Details(details) => Ok(details),
            other => Err(mismatch(QueryKey::GameDetails, &other)),
        }
    }

    pub async fn admin_status(&self) -> Result<bool> {
        self.flag(QueryKey::AdminStatus, || async {
            self.backend.get_admin_status().await
        })
        .await
    }

    pub async fn is_caller_admin(&self) -> Result<bool> {
        self.flag(QueryKey::IsCallerAdmin, || async {
            self.backend.is_caller_admin().await
        })
        .await
    }

    /// Probes with a sentinel that can never be a real password.
    pub async fn password_protection_enabled(&self) -> Result<bool> {
        self.flag(QueryKey::PasswordEnabled, || async {
            let accepted = self.backend.verify_password(CHECK_ENABLED_SENTINEL).await?;
            Ok(!accepted)
        })
        .await
    }

    pub async fn caller_profile(&self) -> Result<Option<UserProfile>> {
        match self
            .cached(QueryKey::CallerProfile, || async {
                Ok(CachedValue::Profile(
                    self.backend.get_caller_user_profile().await?,
                ))
            })
            .await?
        {
            CachedValue::Profile(profile) => Ok(profile),
            other => Err(mismatch(QueryKey::CallerProfile, &other)),
        }
    }

    async fn flag<F, Fut>(&self, key: QueryKey, fetch: F) -> Result<bool>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        match self
            .cached(key, || async { Ok(CachedValue::Flag(fetch().await?)) })
            .await?
        {
            CachedValue::Flag(flag) => Ok(flag),
            other => Err(mismatch(key, &other)),
        }
    }

    /// Uncached; a verification is an action, not a read.
    pub async fn verify_password(&self, password: &str) -> Result<bool> {
        self.backend.verify_password(password).await
    }

    pub async fn update_text(&self, field: TextField, value: &str) -> Result<UpdateContentResult> {
        let result = self.backend.update_text(field, value).await?;
        self.invalidate(QueryKey::Text(field)).await;
        Ok(result)
    }

    /// Sends the list with blank entries removed.
    pub async fn update_features(&self, items: &[String]) -> Result<UpdateContentResult> {
        let normalized = normalize_features(items);
        let result = self.backend.update_features(&normalized).await?;
        self.invalidate(QueryKey::Features).await;
        Ok(result)
    }

    pub async fn update_game_details(&self, details: &GameDetails) -> Result<UpdateContentResult> {
        let result = self.backend.update_game_details(details).await?;
        self.invalidate(QueryKey::GameDetails).await;
        Ok(result)
    }

    /// Replaces one detail, keeping the other two at their current values.
    pub async fn update_detail_field(
        &self,
        field: DetailField,
        value: &str,
    ) -> Result<UpdateContentResult> {
        let current = self.game_details().await?;
        self.update_game_details(&current.with_field(field, value))
            .await
    }

    pub async fn save_caller_user_profile(&self, name: &str) -> Result<()> {
        self.backend.save_caller_user_profile(name).await?;
        self.invalidate(QueryKey::CallerProfile).await;
        Ok(())
    }

    pub async fn initialize_admin(
        &self,
        admin_token: &str,
        user_provided_token: &str,
    ) -> Result<AdminResult> {
        let result = self
            .backend
            .initialize_admin(admin_token, user_provided_token)
            .await?;
        self.invalidate_admin_queries().await;
        Ok(result)
    }

    pub async fn reset_admin(&self, recovery_token: Option<&str>) -> Result<()> {
        self.backend.reset_admin(recovery_token).await?;
        self.invalidate_admin_queries().await;
        Ok(())
    }

    pub async fn enable_password_protection(&self, password: &str) -> Result<AdminResult> {
        let result = self.backend.enable_password_protection(password).await?;
        self.invalidate(QueryKey::PasswordEnabled).await;
        Ok(result)
    }

    pub async fn disable_password_protection(&self) -> Result<AdminResult> {
        let result = self.backend.disable_password_protection().await?;
        self.invalidate(QueryKey::PasswordEnabled).await;
        Ok(result)
    }
}

fn mismatch(key: QueryKey, value: &CachedValue) -> anyhow::Error {
    anyhow!("query cache holds {value:?} under {key:?}")
}

#[cfg(test)]
#[path = "tests/accessor_tests.rs"]
mod tests;
