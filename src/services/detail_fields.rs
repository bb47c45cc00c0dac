//! Detail-field service (§4.7): mirrors [`crate::services::hub`]'s merge pattern over a field
//! catalog instead of a hub catalog — built-in field definitions per metadata type, overlaid with
//! `CustomFieldDefinitionRecord`s, then the admin `DetailFieldConfigurationRecord` (which can
//! disable built-ins/custom fields and assign each surviving field to a `FieldGroupRecord`).
//! Groups carry their own layout (`Vertical`/`Horizontal`/`Grid`), collapsibility, and sort order.

use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;

use crate::db::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldLayout {
    Vertical,
    Horizontal,
    Grid,
}

impl FieldLayout {
    fn parse(raw: &str) -> FieldLayout {
        match raw {
            "Horizontal" => FieldLayout::Horizontal,
            "Grid" => FieldLayout::Grid,
            _ => FieldLayout::Vertical,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuiltinFieldDef {
    pub key: &'static str,
    pub label: &'static str,
}

const fn field(key: &'static str, label: &'static str) -> BuiltinFieldDef {
    BuiltinFieldDef { key, label }
}

/// The built-in fields every item of `metadata_type` carries in the schema, before any admin
/// disabling or custom-field overlay. Kept small and explicit rather than reflecting over
/// `MetadataItemRecord`, since not every schema column is meant to surface as a detail field
/// (e.g. `locked_fields`, the various hash columns).
fn builtin_fields(metadata_type: &str) -> Vec<BuiltinFieldDef> {
    let mut fields = vec![
        field("title", "Title"),
        field("originalTitle", "Original Title"),
        field("sortTitle", "Sort Title"),
        field("summary", "Summary"),
        field("contentRating", "Content Rating"),
    ];
    match metadata_type {
        "Movie" => {
            fields.push(field("year", "Year"));
            fields.push(field("releaseDate", "Release Date"));
            fields.push(field("tagline", "Tagline"));
            fields.push(field("studio", "Studio"));
            fields.push(field("duration", "Duration"));
        }
        "Show" => {
            fields.push(field("year", "Year"));
            fields.push(field("studio", "Network"));
        }
        "Episode" => {
            fields.push(field("releaseDate", "Air Date"));
            fields.push(field("duration", "Duration"));
        }
        "Album" | "Track" => {
            fields.push(field("year", "Year"));
            fields.push(field("studio", "Label"));
        }
        _ => {}
    }
    fields
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedField {
    pub key: String,
    pub label: String,
    pub is_custom: bool,
    pub widget: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFieldGroup {
    pub label: String,
    pub layout: FieldLayout,
    pub collapsible: bool,
    pub fields: Vec<ResolvedField>,
}

/// The built-in group every ungrouped field lands in, so the layout is always fully populated
/// even before an admin has defined any `FieldGroup` rows.
const UNGROUPED_LABEL: &str = "Details";

pub struct DetailFieldService {
    db: Database,
}

impl DetailFieldService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn resolve(
        &self,
        metadata_type: &str,
        library_section_id: Option<i64>,
    ) -> Result<Vec<ResolvedFieldGroup>> {
        let config = self
            .db
            .detail_field_configurations()
            .get(metadata_type, library_section_id)
            .await?;

        let disabled_builtins: std::collections::HashSet<&str> = config
            .as_ref()
            .map(|c| c.disabled_builtin_types.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let disabled_custom: std::collections::HashSet<&str> = config
            .as_ref()
            .map(|c| c.disabled_custom_field_keys.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let assignments: HashMap<String, String> = config
            .as_ref()
            .and_then(|c| serde_json::from_value(c.field_group_assignments.clone()).ok())
            .unwrap_or_default();

        let mut fields: Vec<ResolvedField> = builtin_fields(metadata_type)
            .into_iter()
            .filter(|f| !disabled_builtins.contains(f.key))
            .map(|f| ResolvedField {
                key: f.key.to_string(),
                label: f.label.to_string(),
                is_custom: false,
                widget: None,
            })
            .collect();

        for custom in self.db.custom_field_definitions().list_enabled().await? {
            if disabled_custom.contains(custom.key.as_str()) {
                continue;
            }
            if !custom.applicable_metadata_types.iter().any(|t| t == metadata_type) {
                continue;
            }
            fields.push(ResolvedField {
                key: custom.key,
                label: custom.label,
                is_custom: true,
                widget: Some(custom.widget),
            });
        }

        let groups = self.db.field_groups().list_for_type(metadata_type, library_section_id).await?;
        let mut by_label: HashMap<String, ResolvedFieldGroup> = groups
            .into_iter()
            .map(|g| {
                (
                    g.label.clone(),
                    ResolvedFieldGroup {
                        label: g.label,
                        layout: FieldLayout::parse(&g.layout_type),
                        collapsible: g.collapsible,
                        fields: Vec::new(),
                    },
                )
            })
            .collect();
        let mut order: Vec<String> = by_label.keys().cloned().collect();
        order.sort_by_key(|label| by_label[label].label.clone());

        for resolved_field in fields {
            let target = assignments.get(&resolved_field.key).cloned().unwrap_or_else(|| UNGROUPED_LABEL.to_string());
            by_label
                .entry(target.clone())
                .or_insert_with(|| {
                    order.push(target.clone());
                    ResolvedFieldGroup {
                        label: target,
                        layout: FieldLayout::Vertical,
                        collapsible: false,
                        fields: Vec::new(),
                    }
                })
                .fields
                .push(resolved_field);
        }

        Ok(order
            .into_iter()
            .filter_map(|label| by_label.remove(&label))
            .filter(|g| !g.fields.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn memory_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn resolve_falls_back_to_ungrouped_details_by_default() {
        let db = memory_db().await;
        let service = DetailFieldService::new(db);
        let groups = service.resolve("Movie", None).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, UNGROUPED_LABEL);
        assert!(groups[0].fields.iter().any(|f| f.key == "tagline"));
    }

    #[tokio::test]
    async fn disabled_builtin_is_excluded() {
        let db = memory_db().await;
        db.detail_field_configurations()
            .upsert("Movie", None, &["tagline".to_string()], &[], &json!({}))
            .await
            .unwrap();
        let service = DetailFieldService::new(db);
        let groups = service.resolve("Movie", None).await.unwrap();
        assert!(!groups[0].fields.iter().any(|f| f.key == "tagline"));
    }

    #[tokio::test]
    async fn custom_field_for_non_applicable_type_is_skipped() {
        let db = memory_db().await;
        db.custom_field_definitions()
            .create("rating_locale", "Rating Locale", "text", &["Show".to_string()])
            .await
            .unwrap();
        let service = DetailFieldService::new(db);
        let groups = service.resolve("Movie", None).await.unwrap();
        assert!(!groups[0].fields.iter().any(|f| f.key == "rating_locale"));
        let groups = service.resolve("Show", None).await.unwrap();
        assert!(groups[0].fields.iter().any(|f| f.key == "rating_locale"));
    }
}
