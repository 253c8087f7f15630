use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{normalize_features, GameDetails, Principal, TextField, UserProfile};

const FEATURES_KEY: &str = "features";
const GAME_DETAILS_KEY: &str = "game_details";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSlot {
    pub principal: Principal,
    pub claimed_at: DateTime<Utc>,
}

/// Result of an attempt to write the single admin slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyOwner,
    Occupied(Principal),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordCredential {
    /// PHC-formatted hash, salt and parameters included.
    pub password_hash: String,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if is_memory_url(database_url) {
            // an in-memory database lives only as long as its last connection
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn raw_field(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM content_fields WHERE field = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    async fn put_raw_field(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO content_fields (field, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(field) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stored value for `field`, or its default when never written.
    pub async fn text_field(&self, field: TextField) -> Result<String> {
        Ok(self
            .raw_field(field.as_str())
            .await?
            .unwrap_or_else(|| field.default_value().to_string()))
    }

    pub async fn set_text_field(&self, field: TextField, value: &str) -> Result<()> {
        self.put_raw_field(field.as_str(), value).await
    }

    pub async fn features(&self) -> Result<Vec<String>> {
        let Some(raw) = self.raw_field(FEATURES_KEY).await? else {
            return Ok(Vec::new());
        };
        let features: Vec<String> =
            serde_json::from_str(&raw).context("stored features list is not valid json")?;
        Ok(features)
    }

    /// Persists the list with blank entries dropped.
    pub async fn set_features(&self, features: &[String]) -> Result<()> {
        let normalized = normalize_features(features);
        let raw = serde_json::to_string(&normalized)?;
        self.put_raw_field(FEATURES_KEY, &raw).await
    }

    pub async fn game_details(&self) -> Result<GameDetails> {
        let Some(raw) = self.raw_field(GAME_DETAILS_KEY).await? else {
            return Ok(GameDetails::default());
        };
        let details: GameDetails =
            serde_json::from_str(&raw).context("stored game details are not valid json")?;
        Ok(details)
    }

    pub async fn set_game_details(&self, details: &GameDetails) -> Result<()> {
        let raw = serde_json::to_string(details)?;
        self.put_raw_field(GAME_DETAILS_KEY, &raw).await
    }

    pub async fn admin_slot(&self) -> Result<Option<AdminSlot>> {
        let row = sqlx::query("SELECT principal, claimed_at FROM admin_slot WHERE slot = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| AdminSlot {
            principal: Principal(r.get::<String, _>(0)),
            claimed_at: r.get::<DateTime<Utc>, _>(1),
        }))
    }

    pub async fn admin_principal(&self) -> Result<Option<Principal>> {
        Ok(self.admin_slot().await?.map(|slot| slot.principal))
    }

    /// Writes the admin slot only when it is empty.
    pub async fn claim_admin(&self, principal: &Principal) -> Result<ClaimOutcome> {
        loop {
            let inserted = sqlx::query(
                "INSERT INTO admin_slot (slot, principal, claimed_at) VALUES (1, ?, ?)
                 ON CONFLICT(slot) DO NOTHING",
            )
            .bind(principal.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?
            .rows_affected();
            if inserted == 1 {
                return Ok(ClaimOutcome::Claimed);
            }

            match self.admin_principal().await? {
                Some(current) if &current == principal => return Ok(ClaimOutcome::AlreadyOwner),
                Some(current) => return Ok(ClaimOutcome::Occupied(current)),
                // cleared between the insert and the read
                None => continue,
            }
        }
    }

    /// Empties the admin slot, returning the previous holder.
    pub async fn clear_admin(&self) -> Result<Option<Principal>> {
        let row = sqlx::query("DELETE FROM admin_slot WHERE slot = 1 RETURNING principal")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Principal(r.get::<String, _>(0))))
    }

    pub async fn password_credential(&self) -> Result<Option<PasswordCredential>> {
        let row =
            sqlx::query("SELECT password_hash FROM press_kit_password WHERE slot = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| PasswordCredential {
            password_hash: r.get::<String, _>(0),
        }))
    }

    pub async fn set_password_credential(&self, credential: &PasswordCredential) -> Result<()> {
        sqlx::query(
            "INSERT INTO press_kit_password (slot, password_hash, updated_at) VALUES (1, ?, ?)
             ON CONFLICT(slot) DO UPDATE SET
                password_hash = excluded.password_hash,
                updated_at = excluded.updated_at",
        )
        .bind(&credential.password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_password_credential(&self) -> Result<bool> {
        let removed = sqlx::query("DELETE FROM press_kit_password WHERE slot = 1")
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed > 0)
    }

    pub async fn user_profile(&self, principal: &Principal) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT name FROM user_profiles WHERE principal = ?")
            .bind(principal.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| UserProfile {
            name: r.get::<String, _>(0),
        }))
    }

    pub async fn save_user_profile(&self, principal: &Principal, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_profiles (principal, name, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(principal) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at",
        )
        .bind(principal.as_str())
        .bind(&profile.name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url == "sqlite::memory:" || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
