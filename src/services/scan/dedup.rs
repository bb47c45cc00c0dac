//! Dedup service (§4.4 Scan Pipeline, dedup stage).
//!
//! Resolves `(metadataType, provider, externalId, librarySection)` to an existing `MetadataItem`
//! or invokes a factory to create one, keeping an in-scan cache so the same external id seen
//! twice in one batch (e.g. two files of a multi-part movie) never creates two items. The cache
//! is scoped to one `DedupService` instance; callers build a fresh one per scan.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;

use crate::db::metadata::{CreateMetadataItem, MetadataItemRecord};
use crate::db::Database;

#[derive(Clone)]
pub struct DedupService {
    db: Database,
    cache: Arc<DashMap<(i64, String, String), i64>>,
}

impl DedupService {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Finds an existing item by any of `external_ids` (any match wins; ties broken by earliest
    /// row id), or creates one via `factory` and registers every id against it.
    pub async fn resolve_or_create<F, Fut>(
        &self,
        library_section_id: i64,
        external_ids: &[(String, String)],
        factory: F,
    ) -> Result<MetadataItemRecord>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CreateMetadataItem>>,
    {
        for (provider, external_id) in external_ids {
            let key = (library_section_id, provider.clone(), external_id.clone());
            if let Some(id) = self.cache.get(&key) {
                if let Some(existing) = self.db.metadata_items().get_by_id(*id).await? {
                    return Ok(existing);
                }
            }
        }

        if let Some(existing) = self.find_by_any_id(library_section_id, external_ids).await? {
            for (provider, external_id) in external_ids {
                self.cache
                    .insert((library_section_id, provider.clone(), external_id.clone()), existing.id);
            }
            return Ok(existing);
        }

        let created = self.db.metadata_items().create(factory().await?).await?;
        for (provider, external_id) in external_ids {
            self.cache
                .insert((library_section_id, provider.clone(), external_id.clone()), created.id);
        }
        Ok(created)
    }

    async fn find_by_any_id(
        &self,
        library_section_id: i64,
        external_ids: &[(String, String)],
    ) -> Result<Option<MetadataItemRecord>> {
        let mut best: Option<MetadataItemRecord> = None;
        for (provider, external_id) in external_ids {
            if let Some(item) = self
                .db
                .metadata_items()
                .find_by_external_id(library_section_id, provider, external_id)
                .await?
            {
                best = Some(match best {
                    Some(current) if current.id <= item.id => current,
                    _ => item,
                });
            }
        }
        Ok(best)
    }

    /// Dropped at scan end, since the cache is meant to prevent duplicate creation within one
    /// batch only — carrying it across scans risks stale hits after out-of-band deletes.
    pub fn clear(&self) {
        self.cache.clear();
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

    async fn section(db: &Database) -> i64 {
        db.library_sections()
            .create(crate::db::library::CreateLibrarySection {
                name: "Movies".into(),
                section_type: "movie".into(),
                settings: json!({}),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn second_resolve_with_same_external_id_reuses_item() {
        let db = memory_db().await;
        let section_id = section(&db).await;
        let dedup = DedupService::new(db.clone());

        let ids = vec![("tmdb".to_string(), "27205".to_string())];
        let first = dedup
            .resolve_or_create(section_id, &ids, || async {
                Ok(CreateMetadataItem {
                    library_section_id: section_id,
                    metadata_type: "Movie".into(),
                    title: "Inception".into(),
                    external_ids: json!({"tmdb": "27205"}),
                    ..Default::default()
                })
            })
            .await
            .unwrap();

        let second = dedup
            .resolve_or_create(section_id, &ids, || async {
                panic!("factory should not be invoked on cache hit")
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn clear_drops_cache_but_db_lookup_still_finds_item() {
        let db = memory_db().await;
        let section_id = section(&db).await;
        let dedup = DedupService::new(db.clone());
        let ids = vec![("tmdb".to_string(), "27205".to_string())];

        let first = dedup
            .resolve_or_create(section_id, &ids, || async {
                Ok(CreateMetadataItem {
                    library_section_id: section_id,
                    metadata_type: "Movie".into(),
                    title: "Inception".into(),
                    external_ids: json!({"tmdb": "27205"}),
                    ..Default::default()
                })
            })
            .await
            .unwrap();
        dedup.clear();

        let second = dedup
            .resolve_or_create(section_id, &ids, || async {
                panic!("factory should not be invoked, db row already exists")
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
    }
}
