//! Hub service (§4.7): resolves the ordered hub list for a browsing context by overlaying a
//! metadata-type default template, the admin `HubConfiguration`, and (where permitted) the
//! viewer's own overrides, then runs each surviving hub's type-specific item query, paginated at
//! [`DEFAULT_HUB_PAGE_SIZE`]. Cast/crew/genre/similar hubs reuse `metadata_relations` rows written
//! by the scan pipeline's credit and genre tagging (`services/scan/credits.rs`); there is no
//! separate recommendation engine in the pack, so Similar/Related both fall back to shared-genre
//! overlap, which is the only cross-item signal this schema carries.

use std::collections::HashSet;

use anyhow::Result;
use serde::Serialize;
use uuid::Uuid;

use crate::db::metadata::MetadataItemRecord;
use crate::db::Database;

pub const DEFAULT_HUB_PAGE_SIZE: i64 = 20;
const GENRE_RELATION: &str = "Genre";
const CAST_RELATIONS: &[&str] = &["Actor", "Guest"];
const CREW_RELATIONS: &[&str] = &["Director", "Writer", "Producer", "Composer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HubType {
    RecentlyAdded,
    ContinueWatching,
    Promoted,
    ByGenre,
    Cast,
    Crew,
    Similar,
    Related,
}

impl HubType {
    fn config_key(self) -> &'static str {
        match self {
            HubType::RecentlyAdded => "RecentlyAdded",
            HubType::ContinueWatching => "ContinueWatching",
            HubType::Promoted => "Promoted",
            HubType::ByGenre => "ByGenre",
            HubType::Cast => "Cast",
            HubType::Crew => "Crew",
            HubType::Similar => "Similar",
            HubType::Related => "Related",
        }
    }

    fn title(self) -> &'static str {
        match self {
            HubType::RecentlyAdded => "Recently Added",
            HubType::ContinueWatching => "Continue Watching",
            HubType::Promoted => "Featured",
            HubType::ByGenre => "More Like This Genre",
            HubType::Cast => "Cast",
            HubType::Crew => "Crew",
            HubType::Similar => "Similar",
            HubType::Related => "Related",
        }
    }

    fn from_config_key(key: &str) -> Option<HubType> {
        ALL_HUB_TYPES.iter().copied().find(|h| h.config_key() == key)
    }
}

const ALL_HUB_TYPES: &[HubType] = &[
    HubType::RecentlyAdded,
    HubType::ContinueWatching,
    HubType::Promoted,
    HubType::ByGenre,
    HubType::Cast,
    HubType::Crew,
    HubType::Similar,
    HubType::Related,
];

/// Default hub ordering per metadata type, before admin/user overrides are applied.
fn default_template(metadata_type: &str) -> Vec<HubType> {
    use HubType::*;
    match metadata_type {
        "Movie" => vec![ContinueWatching, RecentlyAdded, Promoted, Cast, Crew, ByGenre, Similar],
        "Show" | "Episode" => vec![ContinueWatching, RecentlyAdded, Promoted, Cast, ByGenre, Related],
        _ => vec![RecentlyAdded, Promoted],
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HubItem {
    pub metadata_item_id: i64,
    pub uuid: Uuid,
    pub title: String,
    pub thumb_uri: Option<String>,
}

impl From<&MetadataItemRecord> for HubItem {
    fn from(record: &MetadataItemRecord) -> Self {
        Self {
            metadata_item_id: record.id,
            uuid: record.uuid,
            title: record.title.clone(),
            thumb_uri: record.thumb_uri.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedHub {
    pub hub_type: HubType,
    pub title: String,
    pub items: Vec<HubItem>,
}

pub struct HubService {
    db: Database,
}

impl HubService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolves the hub list for `context` (e.g. "library", "home", "item-detail"). `item_id` is
    /// required for the item-scoped hubs (ByGenre/Cast/Crew/Similar/Related) and ignored by the
    /// library-scoped ones; `user_disabled` is the viewer's own opt-outs, applied after the admin
    /// configuration so a hub the admin has force-enabled still can't be hidden by a user toggle
    /// unless the admin configuration also permits it — callers pass an already-filtered set.
    pub async fn resolve(
        &self,
        context: &str,
        library_section_id: Option<i64>,
        metadata_type: &str,
        item_id: Option<i64>,
        user_disabled: &HashSet<HubType>,
    ) -> Result<Vec<ResolvedHub>> {
        let mut hubs = default_template(metadata_type);

        if let Some(config) = self
            .db
            .hub_configurations()
            .get(context, library_section_id, Some(metadata_type))
            .await?
        {
            let enabled: HashSet<&str> = config.enabled_hub_types.iter().map(String::as_str).collect();
            let disabled: HashSet<&str> = config.disabled_hub_types.iter().map(String::as_str).collect();
            hubs.retain(|h| !disabled.contains(h.config_key()));
            for key in &config.enabled_hub_types {
                if let Some(hub_type) = HubType::from_config_key(key) {
                    if !hubs.contains(&hub_type) {
                        hubs.push(hub_type);
                    }
                }
            }
            let _ = enabled;
        }

        hubs.retain(|h| !user_disabled.contains(h));

        let mut resolved = Vec::with_capacity(hubs.len());
        for hub_type in hubs {
            let items = self.items_for(hub_type, library_section_id, metadata_type, item_id).await?;
            if items.is_empty() {
                continue;
            }
            resolved.push(ResolvedHub { hub_type, title: hub_type.title().to_string(), items });
        }
        Ok(resolved)
    }

    async fn items_for(
        &self,
        hub_type: HubType,
        library_section_id: Option<i64>,
        metadata_type: &str,
        item_id: Option<i64>,
    ) -> Result<Vec<HubItem>> {
        let metadata_items = self.db.metadata_items();

        match hub_type {
            HubType::RecentlyAdded => {
                let Some(section) = library_section_id else { return Ok(Vec::new()) };
                Ok(metadata_items
                    .list_recently_added(section, metadata_type, DEFAULT_HUB_PAGE_SIZE)
                    .await?
                    .iter()
                    .map(HubItem::from)
                    .collect())
            }
            HubType::ContinueWatching => {
                let Some(section) = library_section_id else { return Ok(Vec::new()) };
                Ok(metadata_items
                    .list_continue_watching(section, metadata_type, DEFAULT_HUB_PAGE_SIZE)
                    .await?
                    .iter()
                    .map(HubItem::from)
                    .collect())
            }
            HubType::Promoted => {
                let Some(section) = library_section_id else { return Ok(Vec::new()) };
                Ok(metadata_items
                    .list_promoted(section, metadata_type, DEFAULT_HUB_PAGE_SIZE)
                    .await?
                    .iter()
                    .map(HubItem::from)
                    .collect())
            }
            HubType::Cast => match item_id {
                Some(id) => self.relation_hub(id, CAST_RELATIONS).await,
                None => Ok(Vec::new()),
            },
            HubType::Crew => match item_id {
                Some(id) => self.relation_hub(id, CREW_RELATIONS).await,
                None => Ok(Vec::new()),
            },
            HubType::ByGenre => match item_id {
                Some(id) => self.genre_siblings(id).await,
                None => Ok(Vec::new()),
            },
            HubType::Similar | HubType::Related => match item_id {
                Some(id) => self.genre_siblings(id).await,
                None => Ok(Vec::new()),
            },
        }
    }

    /// Resolves the target items of the first `relation_types` that has any rows — cast and crew
    /// are stored as separate relation types per role, but the hub shows whichever apply.
    async fn relation_hub(&self, item_id: i64, relation_types: &[&str]) -> Result<Vec<HubItem>> {
        let relations = self.db.metadata_relations();
        let metadata_items = self.db.metadata_items();

        let mut out = Vec::new();
        for relation_type in relation_types {
            for rel in relations.list_from(item_id, relation_type).await? {
                if let Some(person) = metadata_items.get_by_id(rel.to_item_id).await? {
                    out.push(HubItem::from(&person));
                }
                if out.len() as i64 >= DEFAULT_HUB_PAGE_SIZE {
                    return Ok(out);
                }
            }
        }
        Ok(out)
    }

    /// Other items sharing at least one Genre tag with `item_id`, excluding itself.
    async fn genre_siblings(&self, item_id: i64) -> Result<Vec<HubItem>> {
        let relations = self.db.metadata_relations();
        let metadata_items = self.db.metadata_items();

        let genres = relations.list_from(item_id, GENRE_RELATION).await?;
        let mut seen: HashSet<i64> = HashSet::from([item_id]);
        let mut out = Vec::new();

        for genre in genres {
            for rel in relations.list_to(genre.to_item_id, GENRE_RELATION).await? {
                if !seen.insert(rel.from_item_id) {
                    continue;
                }
                if let Some(sibling) = metadata_items.get_by_id(rel.from_item_id).await? {
                    out.push(HubItem::from(&sibling));
                }
                if out.len() as i64 >= DEFAULT_HUB_PAGE_SIZE {
                    return Ok(out);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::library::CreateLibrarySection;
    use crate::db::metadata::CreateMetadataItem;
    use serde_json::json;

    async fn memory_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn resolve_includes_recently_added_and_respects_user_disable() {
        let db = memory_db().await;
        let section = db
            .library_sections()
            .create(CreateLibrarySection { name: "Movies".into(), section_type: "movie".into(), settings: json!({}) })
            .await
            .unwrap();
        db.metadata_items()
            .create(CreateMetadataItem {
                library_section_id: section.id,
                metadata_type: "Movie".into(),
                title: "Arrival".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let service = HubService::new(db);
        let hubs = service
            .resolve("library", Some(section.id), "Movie", None, &HashSet::new())
            .await
            .unwrap();
        assert!(hubs.iter().any(|h| h.hub_type == HubType::RecentlyAdded));

        let mut disabled = HashSet::new();
        disabled.insert(HubType::RecentlyAdded);
        let hubs = service.resolve("library", Some(section.id), "Movie", None, &disabled).await.unwrap();
        assert!(!hubs.iter().any(|h| h.hub_type == HubType::RecentlyAdded));
    }

    #[tokio::test]
    async fn genre_siblings_excludes_self_and_finds_shared_tag() {
        let db = memory_db().await;
        let section = db
            .library_sections()
            .create(CreateLibrarySection { name: "Movies".into(), section_type: "movie".into(), settings: json!({}) })
            .await
            .unwrap();
        let sci_fi = db
            .metadata_items()
            .create(CreateMetadataItem { library_section_id: section.id, metadata_type: "Genre".into(), title: "Sci-Fi".into(), ..Default::default() })
            .await
            .unwrap();
        let arrival = db
            .metadata_items()
            .create(CreateMetadataItem { library_section_id: section.id, metadata_type: "Movie".into(), title: "Arrival".into(), ..Default::default() })
            .await
            .unwrap();
        let dune = db
            .metadata_items()
            .create(CreateMetadataItem { library_section_id: section.id, metadata_type: "Movie".into(), title: "Dune".into(), ..Default::default() })
            .await
            .unwrap();
        db.metadata_relations().add(arrival.id, sci_fi.id, GENRE_RELATION, 0, None).await.unwrap();
        db.metadata_relations().add(dune.id, sci_fi.id, GENRE_RELATION, 0, None).await.unwrap();

        let service = HubService::new(db);
        let siblings = service.genre_siblings(arrival.id).await.unwrap();
        assert_eq!(siblings.len(), 1);
        assert_eq!(siblings[0].metadata_item_id, dune.id);
    }
}
