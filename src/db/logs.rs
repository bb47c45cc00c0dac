//! Application log storage (§4.14 ambient logging): the sink the database tracing layer writes
//! batches into, and the reader the `logs` GraphQL query/subscription surface uses.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub id: i64,
    pub level: String,
    pub target: String,
    pub message: String,
    pub fields: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// A single entry as produced by the tracing layer, before batching.
#[derive(Debug, Clone)]
pub struct CreateLog {
    pub level: String,
    pub target: String,
    pub message: String,
    pub fields: JsonValue,
}

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub levels: Vec<String>,
    pub target_prefix: Option<String>,
    pub keyword: Option<String>,
}

fn from_row(row: (i64, String, String, String, String, DateTime<Utc>)) -> LogRecord {
    LogRecord {
        id: row.0,
        level: row.1,
        target: row.2,
        message: row.3,
        fields: serde_json::from_str(&row.4).unwrap_or(JsonValue::Null),
        created_at: row.5,
    }
}

pub struct AppLogRepository {
    pool: SqlitePool,
}

impl AppLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, log: CreateLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO app_logs (level, target, message, fields_json) VALUES (?, ?, ?, ?)",
        )
        .bind(&log.level)
        .bind(&log.target)
        .bind(&log.message)
        .bind(log.fields.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a batch in a single transaction, as the database logging layer's flush does.
    pub async fn create_batch(&self, logs: Vec<CreateLog>) -> Result<usize> {
        if logs.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let count = logs.len();

        for log in logs {
            sqlx::query(
                "INSERT INTO app_logs (level, target, message, fields_json) VALUES (?, ?, ?, ?)",
            )
            .bind(&log.level)
            .bind(&log.target)
            .bind(&log.message)
            .bind(log.fields.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(count)
    }

    pub async fn list(&self, filter: LogFilter, limit: i64, offset: i64) -> Result<Vec<LogRecord>> {
        let mut conditions = Vec::new();

        if !filter.levels.is_empty() {
            let placeholders = filter.levels.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            conditions.push(format!("level IN ({placeholders})"));
        }
        if filter.target_prefix.is_some() {
            conditions.push("target LIKE ? || '%'".to_string());
        }
        if filter.keyword.is_some() {
            conditions.push("message LIKE '%' || ? || '%'".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT id, level, target, message, fields_json, created_at FROM app_logs {where_clause} \
             ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );

        let mut query = sqlx::query_as::<_, (i64, String, String, String, String, DateTime<Utc>)>(&sql);
        for level in &filter.levels {
            query = query.bind(level);
        }
        if let Some(prefix) = &filter.target_prefix {
            query = query.bind(prefix);
        }
        if let Some(keyword) = &filter.keyword {
            query = query.bind(keyword);
        }
        query = query.bind(limit).bind(offset);

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    pub async fn delete_before(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM app_logs WHERE created_at < ?")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
