//! Hub and detail-field configuration persistence (§4.? hub & detail-field services).

use anyhow::Result;
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;

// ============================================================================
// Hub configurations
// ============================================================================

#[derive(Debug, Clone)]
pub struct HubConfigurationRecord {
    pub id: i64,
    pub context: String,
    pub library_section_id: Option<i64>,
    pub metadata_type: Option<String>,
    pub enabled_hub_types: Vec<String>,
    pub disabled_hub_types: Vec<String>,
}

fn hub_from_row(
    row: (i64, String, Option<i64>, Option<String>, String, String),
) -> Result<HubConfigurationRecord> {
    Ok(HubConfigurationRecord {
        id: row.0,
        context: row.1,
        library_section_id: row.2,
        metadata_type: row.3,
        enabled_hub_types: serde_json::from_str(&row.4)?,
        disabled_hub_types: serde_json::from_str(&row.5)?,
    })
}

const HUB_COLUMNS: &str =
    "id, context, library_section_id, metadata_type, enabled_hub_types_json, disabled_hub_types_json";

pub struct HubConfigurationRepository {
    pool: SqlitePool,
}

impl HubConfigurationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(
        &self,
        context: &str,
        library_section_id: Option<i64>,
        metadata_type: Option<&str>,
    ) -> Result<Option<HubConfigurationRecord>> {
        let row = sqlx::query_as::<_, (i64, String, Option<i64>, Option<String>, String, String)>(
            &format!(
                "SELECT {HUB_COLUMNS} FROM hub_configurations WHERE context = ? AND \
                 library_section_id IS ? AND metadata_type IS ?"
            ),
        )
        .bind(context)
        .bind(library_section_id)
        .bind(metadata_type)
        .fetch_optional(&self.pool)
        .await?;

        row.map(hub_from_row).transpose()
    }

    pub async fn upsert(
        &self,
        context: &str,
        library_section_id: Option<i64>,
        metadata_type: Option<&str>,
        enabled_hub_types: &[String],
        disabled_hub_types: &[String],
    ) -> Result<HubConfigurationRecord> {
        sqlx::query(
            r#"
            INSERT INTO hub_configurations (context, library_section_id, metadata_type, enabled_hub_types_json, disabled_hub_types_json)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (context, library_section_id, metadata_type) DO UPDATE SET
                enabled_hub_types_json = excluded.enabled_hub_types_json,
                disabled_hub_types_json = excluded.disabled_hub_types_json
            "#,
        )
        .bind(context)
        .bind(library_section_id)
        .bind(metadata_type)
        .bind(serde_json::to_string(enabled_hub_types)?)
        .bind(serde_json::to_string(disabled_hub_types)?)
        .execute(&self.pool)
        .await?;

        self.get(context, library_section_id, metadata_type)
            .await?
            .ok_or_else(|| anyhow::anyhow!("hub configuration vanished after upsert"))
    }
}

// ============================================================================
// Custom field definitions
// ============================================================================

#[derive(Debug, Clone)]
pub struct CustomFieldDefinitionRecord {
    pub id: i64,
    pub key: String,
    pub label: String,
    pub widget: String,
    pub applicable_metadata_types: Vec<String>,
    pub sort_order: i64,
    pub enabled: bool,
}

fn custom_field_from_row(
    row: (i64, String, String, String, String, i64, i64),
) -> Result<CustomFieldDefinitionRecord> {
    Ok(CustomFieldDefinitionRecord {
        id: row.0,
        key: row.1,
        label: row.2,
        widget: row.3,
        applicable_metadata_types: serde_json::from_str(&row.4)?,
        sort_order: row.5,
        enabled: row.6 != 0,
    })
}

pub struct CustomFieldDefinitionRepository {
    pool: SqlitePool,
}

impl CustomFieldDefinitionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_enabled(&self) -> Result<Vec<CustomFieldDefinitionRecord>> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, String, i64, i64)>(
            "SELECT id, key, label, widget, applicable_metadata_types_json, sort_order, enabled \
             FROM custom_field_definitions WHERE enabled = 1 ORDER BY sort_order",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(custom_field_from_row).collect()
    }

    pub async fn create(
        &self,
        key: &str,
        label: &str,
        widget: &str,
        applicable_metadata_types: &[String],
    ) -> Result<CustomFieldDefinitionRecord> {
        sqlx::query(
            "INSERT INTO custom_field_definitions (key, label, widget, applicable_metadata_types_json) VALUES (?, ?, ?, ?)",
        )
        .bind(key)
        .bind(label)
        .bind(widget)
        .bind(serde_json::to_string(applicable_metadata_types)?)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, (i64, String, String, String, String, i64, i64)>(
            "SELECT id, key, label, widget, applicable_metadata_types_json, sort_order, enabled \
             FROM custom_field_definitions WHERE key = ?",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        custom_field_from_row(row)
    }

    pub async fn set_enabled(&self, key: &str, enabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE custom_field_definitions SET enabled = ? WHERE key = ?")
            .bind(enabled)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Field groups
// ============================================================================

#[derive(Debug, Clone)]
pub struct FieldGroupRecord {
    pub id: i64,
    pub metadata_type: String,
    pub library_section_id: Option<i64>,
    pub label: String,
    pub layout_type: String,
    pub collapsible: bool,
    pub sort_order: i64,
}

fn field_group_from_row(row: (i64, String, Option<i64>, String, String, i64, i64)) -> FieldGroupRecord {
    FieldGroupRecord {
        id: row.0,
        metadata_type: row.1,
        library_section_id: row.2,
        label: row.3,
        layout_type: row.4,
        collapsible: row.5 != 0,
        sort_order: row.6,
    }
}

pub struct FieldGroupRepository {
    pool: SqlitePool,
}

impl FieldGroupRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_for_type(&self, metadata_type: &str, library_section_id: Option<i64>) -> Result<Vec<FieldGroupRecord>> {
        let rows = sqlx::query_as::<_, (i64, String, Option<i64>, String, String, i64, i64)>(
            "SELECT id, metadata_type, library_section_id, label, layout_type, collapsible, sort_order \
             FROM field_groups WHERE metadata_type = ? AND library_section_id IS ? ORDER BY sort_order",
        )
        .bind(metadata_type)
        .bind(library_section_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(field_group_from_row).collect())
    }

    pub async fn create(
        &self,
        metadata_type: &str,
        library_section_id: Option<i64>,
        label: &str,
        layout_type: &str,
    ) -> Result<FieldGroupRecord> {
        sqlx::query(
            "INSERT INTO field_groups (metadata_type, library_section_id, label, layout_type) VALUES (?, ?, ?, ?)",
        )
        .bind(metadata_type)
        .bind(library_section_id)
        .bind(label)
        .bind(layout_type)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, (i64, String, Option<i64>, String, String, i64, i64)>(
            "SELECT id, metadata_type, library_section_id, label, layout_type, collapsible, sort_order \
             FROM field_groups WHERE metadata_type = ? AND label = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(metadata_type)
        .bind(label)
        .fetch_one(&self.pool)
        .await?;

        Ok(field_group_from_row(row))
    }
}

// ============================================================================
// Detail field configurations
// ============================================================================

#[derive(Debug, Clone)]
pub struct DetailFieldConfigurationRecord {
    pub id: i64,
    pub metadata_type: String,
    pub library_section_id: Option<i64>,
    pub disabled_builtin_types: Vec<String>,
    pub disabled_custom_field_keys: Vec<String>,
    pub field_group_assignments: JsonValue,
}

fn detail_config_from_row(
    row: (i64, String, Option<i64>, String, String, String),
) -> Result<DetailFieldConfigurationRecord> {
    Ok(DetailFieldConfigurationRecord {
        id: row.0,
        metadata_type: row.1,
        library_section_id: row.2,
        disabled_builtin_types: serde_json::from_str(&row.3)?,
        disabled_custom_field_keys: serde_json::from_str(&row.4)?,
        field_group_assignments: serde_json::from_str(&row.5)?,
    })
}

const DETAIL_COLUMNS: &str = "id, metadata_type, library_section_id, disabled_builtin_types_json, \
     disabled_custom_field_keys_json, field_group_assignments_json";

pub struct DetailFieldConfigurationRepository {
    pool: SqlitePool,
}

impl DetailFieldConfigurationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(
        &self,
        metadata_type: &str,
        library_section_id: Option<i64>,
    ) -> Result<Option<DetailFieldConfigurationRecord>> {
        let row = sqlx::query_as::<_, (i64, String, Option<i64>, String, String, String)>(
            &format!("SELECT {DETAIL_COLUMNS} FROM detail_field_configurations WHERE metadata_type = ? AND library_section_id IS ?"),
        )
        .bind(metadata_type)
        .bind(library_section_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(detail_config_from_row).transpose()
    }

    pub async fn upsert(
        &self,
        metadata_type: &str,
        library_section_id: Option<i64>,
        disabled_builtin_types: &[String],
        disabled_custom_field_keys: &[String],
        field_group_assignments: &JsonValue,
    ) -> Result<DetailFieldConfigurationRecord> {
        sqlx::query(
            r#"
            INSERT INTO detail_field_configurations (
                metadata_type, library_section_id, disabled_builtin_types_json,
                disabled_custom_field_keys_json, field_group_assignments_json
            )
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (metadata_type, library_section_id) DO UPDATE SET
                disabled_builtin_types_json = excluded.disabled_builtin_types_json,
                disabled_custom_field_keys_json = excluded.disabled_custom_field_keys_json,
                field_group_assignments_json = excluded.field_group_assignments_json
            "#,
        )
        .bind(metadata_type)
        .bind(library_section_id)
        .bind(serde_json::to_string(disabled_builtin_types)?)
        .bind(serde_json::to_string(disabled_custom_field_keys)?)
        .bind(field_group_assignments.to_string())
        .execute(&self.pool)
        .await?;

        self.get(metadata_type, library_section_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("detail field configuration vanished after upsert"))
    }
}
