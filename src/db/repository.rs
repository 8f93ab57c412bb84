use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::warn;

pub const DARK_MODE_KEY: &str = "isDarkMode";
pub const ADMIN_PROFILE_KEY: &str = "adminProfile";

/// Display fields the admin may override locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProfileOverride {
    pub name: String,
    pub email: String,
}

pub async fn fetch_setting(db: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT value FROM local_settings WHERE key = ?1")
        .bind(key)
        .fetch_optional(db)
        .await?;
    row.map(|r| r.try_get::<String, _>("value")).transpose()
}

pub async fn upsert_setting(db: &SqlitePool, key: &str, value: &str) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO local_settings (key, value, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}

/// Off unless a `"true"` was saved.
pub async fn fetch_dark_mode(db: &SqlitePool) -> Result<bool, sqlx::Error> {
    Ok(fetch_setting(db, DARK_MODE_KEY).await?.as_deref() == Some("true"))
}

pub async fn save_dark_mode(db: &SqlitePool, enabled: bool) -> Result<(), sqlx::Error> {
    upsert_setting(db, DARK_MODE_KEY, if enabled { "true" } else { "false" }).await
}

pub async fn fetch_admin_profile(db: &SqlitePool) -> Result<Option<AdminProfileOverride>, sqlx::Error> {
    let Some(raw) = fetch_setting(db, ADMIN_PROFILE_KEY).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(profile) => Ok(Some(profile)),
        Err(e) => {
            warn!("Ignoring unreadable admin profile override: {}", e);
            Ok(None)
        }
    }
}

pub async fn save_admin_profile(db: &SqlitePool, profile: &AdminProfileOverride) -> Result<(), sqlx::Error> {
    let raw = serde_json::to_string(profile).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    upsert_setting(db, ADMIN_PROFILE_KEY, &raw).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    #[tokio::test]
    async fn test_dark_mode_defaults_off_and_persists() {
        let db = pool().await;
        assert!(!fetch_dark_mode(&db).await.unwrap());

        save_dark_mode(&db, true).await.unwrap();
        assert!(fetch_dark_mode(&db).await.unwrap());
        assert_eq!(fetch_setting(&db, DARK_MODE_KEY).await.unwrap().as_deref(), Some("true"));

        save_dark_mode(&db, false).await.unwrap();
        assert!(!fetch_dark_mode(&db).await.unwrap());
    }

    #[tokio::test]
    async fn test_admin_profile_override_roundtrip() {
        let db = pool().await;
        assert!(fetch_admin_profile(&db).await.unwrap().is_none());

        let profile = AdminProfileOverride {
            name: "Mudir".to_string(),
            email: "admin123@quran.system".to_string(),
        };
        save_admin_profile(&db, &profile).await.unwrap();
        assert_eq!(fetch_admin_profile(&db).await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn test_corrupt_override_is_ignored() {
        let db = pool().await;
        upsert_setting(&db, ADMIN_PROFILE_KEY, "{not json").await.unwrap();
        assert!(fetch_admin_profile(&db).await.unwrap().is_none());
    }
}
