//! Users repository.
//!
//! Credential issuance and session management live outside this crate's scope (bearer tokens
//! are verified, not minted, per the ambient auth boundary); this table only needs to resolve a
//! JWT subject to a row other tables can reference.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::util::{str_to_uuid, uuid_to_str};

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub uuid: Uuid,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

fn from_row(row: (i64, String, String, DateTime<Utc>)) -> Result<UserRecord> {
    Ok(UserRecord {
        id: row.0,
        uuid: str_to_uuid(&row.1)?,
        display_name: row.2,
        created_at: row.3,
    })
}

pub struct UsersRepository {
    pool: SqlitePool,
}

impl UsersRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user, or return the existing row if `uuid` is already known (JWT subjects are
    /// stable, so first-seen registration is idempotent).
    pub async fn get_or_create(&self, uuid: Uuid, display_name: &str) -> Result<UserRecord> {
        if let Some(existing) = self.get_by_uuid(uuid).await? {
            return Ok(existing);
        }

        sqlx::query("INSERT INTO users (uuid, display_name) VALUES (?, ?)")
            .bind(uuid_to_str(uuid))
            .bind(display_name)
            .execute(&self.pool)
            .await?;

        self.get_by_uuid(uuid)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user vanished immediately after insert"))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, (i64, String, String, DateTime<Utc>)>(
            "SELECT id, uuid, display_name, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }

    pub async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, (i64, String, String, DateTime<Utc>)>(
            "SELECT id, uuid, display_name, created_at FROM users WHERE uuid = ?",
        )
        .bind(uuid_to_str(uuid))
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query_as::<_, (i64, String, String, DateTime<Utc>)>(
            "SELECT id, uuid, display_name, created_at FROM users ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(from_row).collect()
    }

    pub async fn rename(&self, id: i64, display_name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET display_name = ? WHERE id = ?")
            .bind(display_name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
