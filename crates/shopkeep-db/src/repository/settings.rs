//! # Settings Repository
//!
//! Key/value store configuration, per store.
//!
//! The typed [`StoreProfile`] is assembled in shopkeep-core; this repository
//! only moves rows. Client preferences live under the `ui.` prefix.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use shopkeep_core::settings::{keys, validate_preference_key, StoreProfile};
use shopkeep_core::StoreSetting;

use super::begin_write;
use crate::error::DbResult;

/// Repository for store settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
    store_id: String,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool, store_id: String) -> Self {
        SettingsRepository { pool, store_id }
    }

    /// Every setting row of the store, ordered by key.
    pub async fn all(&self) -> DbResult<Vec<StoreSetting>> {
        let rows = sqlx::query_as::<_, StoreSetting>(
            "SELECT * FROM store_settings WHERE store_id = ?1 ORDER BY key",
        )
        .bind(&self.store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM store_settings WHERE store_id = ?1 AND key = ?2",
        )
        .bind(&self.store_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    /// Inserts or replaces one setting.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        upsert(&mut conn, &self.store_id, key, value).await
    }

    /// Writes several settings atomically.
    pub async fn set_many(&self, pairs: &[(&str, String)]) -> DbResult<()> {
        let mut tx = begin_write(&self.pool).await?;
        for (key, value) in pairs {
            upsert(&mut tx, &self.store_id, key, value).await?;
        }
        tx.commit().await?;

        debug!(count = pairs.len(), "Settings saved");
        Ok(())
    }

    /// The typed store profile; missing keys take their defaults.
    pub async fn profile(&self) -> DbResult<StoreProfile> {
        let rows = self.all().await?;
        Ok(StoreProfile::from_settings(&rows))
    }

    /// Validates and persists a profile. The logo path is left untouched.
    pub async fn save_profile(&self, profile: &StoreProfile) -> DbResult<StoreProfile> {
        profile.validate()?;
        self.set_many(&profile.to_pairs()).await?;

        info!(store = %profile.name, "Store profile updated");
        self.profile().await
    }

    /// Records (or clears) the stored logo path.
    pub async fn set_logo_path(&self, path: Option<&str>) -> DbResult<()> {
        self.set(keys::STORE_LOGO_PATH, path.unwrap_or_default()).await
    }

    /// A client preference value, as stored.
    pub async fn preference(&self, key: &str) -> DbResult<Option<String>> {
        validate_preference_key(key)?;
        self.get(key).await
    }

    pub async fn set_preference(&self, key: &str, value: &str) -> DbResult<()> {
        validate_preference_key(key)?;
        debug!(key = %key, "Saving preference");
        self.set(key, value).await
    }
}

async fn upsert(conn: &mut SqliteConnection, store_id: &str, key: &str, value: &str) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO store_settings (store_id, key, value, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (store_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(store_id)
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::db;
    use crate::DbError;
    use shopkeep_core::CoreError;

    #[tokio::test]
    async fn test_profile_defaults_and_round_trip() {
        let db = db().await;
        let repo = db.settings();

        let profile = repo.profile().await.unwrap();
        assert_eq!(profile, StoreProfile::default());

        let mut changed = profile.clone();
        changed.name = "Empório da Vila".to_string();
        changed.card_surcharge_bps = 450;
        changed.digest_recipients = vec!["dona@emporio.com.br".to_string()];
        let saved = repo.save_profile(&changed).await.unwrap();
        assert_eq!(saved, changed);

        assert_eq!(
            repo.get(keys::CARD_SURCHARGE_BPS).await.unwrap().as_deref(),
            Some("450")
        );
    }

    #[tokio::test]
    async fn test_save_profile_keeps_logo_and_validates() {
        let db = db().await;
        let repo = db.settings();
        repo.set_logo_path(Some("logos/store.png")).await.unwrap();

        let mut profile = repo.profile().await.unwrap();
        assert_eq!(profile.logo_path.as_deref(), Some("logos/store.png"));

        profile.name = "Nova Loja".to_string();
        profile.logo_path = None;
        let saved = repo.save_profile(&profile).await.unwrap();
        assert_eq!(saved.logo_path.as_deref(), Some("logos/store.png"));

        profile.digest_recipients = vec!["invalid".to_string()];
        assert!(matches!(
            repo.save_profile(&profile).await,
            Err(DbError::Business(CoreError::Validation(_)))
        ));
        assert_eq!(repo.profile().await.unwrap().name, "Nova Loja");
    }

    #[tokio::test]
    async fn test_preferences_require_ui_prefix() {
        let db = db().await;
        let repo = db.settings();

        repo.set_preference("ui.cart_widget.position", r#"{"x":10,"y":20}"#)
            .await
            .unwrap();
        assert_eq!(
            repo.preference("ui.cart_widget.position").await.unwrap().as_deref(),
            Some(r#"{"x":10,"y":20}"#)
        );
        assert!(repo.preference("ui.missing").await.unwrap().is_none());
        assert!(repo.set_preference("store.name", "x").await.is_err());
    }
}
