//! Credit service (§4.4 Scan Pipeline, credit service).
//!
//! Upserts Person/Group `MetadataItem`s from aggregated agent credit lists and writes typed
//! `MetadataRelation`s (Actor, Director, Writer, Producer, Guest, Band-member, Composer, ...),
//! preserving the order the winning agent returned them in.

use anyhow::Result;

use crate::db::metadata::CreateMetadataItem;
use crate::db::Database;
use crate::services::text_utils::normalize_title;

use super::dedup::DedupService;

#[derive(Debug, Clone)]
pub struct PersonCredit {
    pub name: String,
    pub birth_year: Option<i64>,
    pub external_ids: Vec<(String, String)>,
    /// "Actor" | "Director" | "Writer" | "Producer" | "Guest" | "Composer"
    pub relation_type: String,
    /// Character name, for Actor/Guest credits.
    pub role: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GroupCredit {
    pub name: String,
    pub external_ids: Vec<(String, String)>,
    /// "Band-member" | "Studio" | ...
    pub relation_type: String,
}

fn fallback_id(name: &str, birth_year: Option<i64>) -> (String, String) {
    let normalized = normalize_title(name);
    let key = match birth_year {
        Some(year) => format!("{normalized}:{year}"),
        None => normalized,
    };
    ("name".to_string(), key)
}

/// Upserts every person/group credit for `metadata_item_id` and writes the relation row in the
/// order `people`/`groups` were supplied.
pub async fn apply_credits(
    db: &Database,
    dedup: &DedupService,
    library_section_id: i64,
    metadata_item_id: i64,
    people: &[PersonCredit],
    groups: &[GroupCredit],
) -> Result<()> {
    for (ordering, credit) in people.iter().enumerate() {
        let mut ids = credit.external_ids.clone();
        if ids.is_empty() {
            ids.push(fallback_id(&credit.name, credit.birth_year));
        }
        let name = credit.name.clone();
        let birth_year = credit.birth_year;
        let person = dedup
            .resolve_or_create(library_section_id, &ids, move || async move {
                Ok(CreateMetadataItem {
                    library_section_id,
                    metadata_type: "Person".to_string(),
                    title: name,
                    year: birth_year,
                    ..Default::default()
                })
            })
            .await?;

        db.metadata_relations()
            .add(metadata_item_id, person.id, &credit.relation_type, ordering as i64, credit.role.as_deref())
            .await?;
    }

    for (ordering, credit) in groups.iter().enumerate() {
        let mut ids = credit.external_ids.clone();
        if ids.is_empty() {
            ids.push(fallback_id(&credit.name, None));
        }
        let name = credit.name.clone();
        let group = dedup
            .resolve_or_create(library_section_id, &ids, move || async move {
                Ok(CreateMetadataItem {
                    library_section_id,
                    metadata_type: "Group".to_string(),
                    title: name,
                    ..Default::default()
                })
            })
            .await?;

        db.metadata_relations()
            .add(metadata_item_id, group.id, &credit.relation_type, ordering as i64, None)
            .await?;
    }

    Ok(())
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
    async fn apply_credits_creates_person_and_relation_in_order() {
        let db = memory_db().await;
        let section = db
            .library_sections()
            .create(crate::db::library::CreateLibrarySection {
                name: "Movies".into(),
                section_type: "movie".into(),
                settings: json!({}),
            })
            .await
            .unwrap();
        let movie = db
            .metadata_items()
            .create(CreateMetadataItem {
                library_section_id: section.id,
                metadata_type: "Movie".into(),
                title: "Inception".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let dedup = DedupService::new(db.clone());
        let people = vec![
            PersonCredit {
                name: "Leonardo DiCaprio".into(),
                birth_year: Some(1974),
                external_ids: vec![],
                relation_type: "Actor".into(),
                role: Some("Cobb".into()),
            },
            PersonCredit {
                name: "Christopher Nolan".into(),
                birth_year: Some(1970),
                external_ids: vec![],
                relation_type: "Director".into(),
                role: None,
            },
        ];

        apply_credits(&db, &dedup, section.id, movie.id, &people, &[]).await.unwrap();

        let actors = db.metadata_relations().list_from(movie.id, "Actor").await.unwrap();
        assert_eq!(actors.len(), 1);
        assert_eq!(actors[0].role.as_deref(), Some("Cobb"));

        let directors = db.metadata_relations().list_from(movie.id, "Director").await.unwrap();
        assert_eq!(directors.len(), 1);

        let person = db.metadata_items().get_by_id(actors[0].to_item_id).await.unwrap().unwrap();
        assert_eq!(person.metadata_type, "Person");
        assert_eq!(person.title, "Leonardo DiCaprio");
    }

    #[tokio::test]
    async fn repeat_credit_with_same_name_and_year_reuses_person() {
        let db = memory_db().await;
        let section = db
            .library_sections()
            .create(crate::db::library::CreateLibrarySection {
                name: "Movies".into(),
                section_type: "movie".into(),
                settings: json!({}),
            })
            .await
            .unwrap();
        let movie_a = db
            .metadata_items()
            .create(CreateMetadataItem {
                library_section_id: section.id,
                metadata_type: "Movie".into(),
                title: "Inception".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let movie_b = db
            .metadata_items()
            .create(CreateMetadataItem {
                library_section_id: section.id,
                metadata_type: "Movie".into(),
                title: "Interstellar".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let dedup = DedupService::new(db.clone());
        let credit = PersonCredit {
            name: "Christopher Nolan".into(),
            birth_year: Some(1970),
            external_ids: vec![],
            relation_type: "Director".into(),
            role: None,
        };

        apply_credits(&db, &dedup, section.id, movie_a.id, std::slice::from_ref(&credit), &[])
            .await
            .unwrap();
        apply_credits(&db, &dedup, section.id, movie_b.id, std::slice::from_ref(&credit), &[])
            .await
            .unwrap();

        let a_directors = db.metadata_relations().list_from(movie_a.id, "Director").await.unwrap();
        let b_directors = db.metadata_relations().list_from(movie_b.id, "Director").await.unwrap();
        assert_eq!(a_directors[0].to_item_id, b_directors[0].to_item_id);
    }
}
