//! Playlist service (§4.11): lazily-materialized playback ordering over a seed. Generator cursor
//! and flags live in an in-memory, `parking_lot`-guarded registry keyed by generator uuid — the
//! lock is only ever held across synchronous mutation, never across an `.await`, matching the
//! reference stack's `ParkingRwLock` usage in `services/manager.rs`. The DB row
//! (`db::playlist::PlaylistGeneratorRepository`) is the durable record, refreshed after each
//! mutation; the in-memory copy is what gives concurrent `Next` calls their serialization and
//! 1-second idempotency window.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex as ParkingMutex;
use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::db::Database;

const DEFAULT_CHUNK_SIZE: i64 = 20;
const NEXT_IDEMPOTENCY_WINDOW: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PlaylistSeed {
    Single { item_id: i64 },
    Album { album_id: i64 },
    Season { season_id: i64 },
    Show { show_id: i64 },
    Library { library_section_id: i64, metadata_type: String },
    Explicit { item_ids: Vec<i64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
    Jump,
    Stay,
    Stop,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistChunk {
    pub items: Vec<Option<i64>>,
    pub start_index: i64,
    pub current_index: i64,
    pub total_count: i64,
    pub has_more: bool,
    pub shuffle: bool,
    pub repeat: bool,
}

/// In-memory source of truth for one generator's cursor/flags; `ordered_ids` is the seed's
/// natural ordering, `shuffle_order[i]` is the index into `ordered_ids` shown at position `i`
/// when shuffle is on.
struct GeneratorState {
    ordered_ids: Vec<i64>,
    shuffle_order: Option<Vec<usize>>,
    cursor_index: i64,
    shuffle: bool,
    repeat: bool,
    last_next_at: Option<Instant>,
    last_next_index: i64,
}

impl GeneratorState {
    fn total_count(&self) -> i64 {
        self.ordered_ids.len() as i64
    }

    fn item_at(&self, index: i64) -> Option<i64> {
        if index < 0 || index >= self.total_count() {
            return None;
        }
        let underlying = match &self.shuffle_order {
            Some(order) => order[index as usize],
            None => index as usize,
        };
        self.ordered_ids.get(underlying).copied()
    }

    fn current_item(&self) -> Option<i64> {
        self.item_at(self.cursor_index)
    }
}

static GENERATORS: Lazy<DashMap<Uuid, Arc<ParkingMutex<GeneratorState>>>> = Lazy::new(DashMap::new);

pub struct PlaylistService {
    db: Database,
}

impl PlaylistService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create_playlist(
        &self,
        playback_session_id: i64,
        seed: PlaylistSeed,
    ) -> Result<(Uuid, PlaylistChunk)> {
        let ordered_ids = self.resolve_ordered_ids(&seed).await?;
        let total_count = ordered_ids.len() as i64;

        let record = self
            .db
            .playlist_generators()
            .create(crate::db::playlist::CreatePlaylistGenerator {
                playback_session_id,
                seed: serde_json::to_value(&seed)?,
                total_count,
                shuffle: false,
                repeat: false,
                items: serde_json::json!({}),
            })
            .await?;

        let state = GeneratorState {
            ordered_ids,
            shuffle_order: None,
            cursor_index: 0,
            shuffle: false,
            repeat: false,
            last_next_at: None,
            last_next_index: 0,
        };
        let chunk = self.materialize_and_persist(record.uuid, state).await?;
        Ok((record.uuid, chunk))
    }

    /// Resolves the seed's full natural ordering. Container seeds reuse the already-ordered
    /// (`sort_title, title`) repository queries; `Library` filters by the section's browse type.
    async fn resolve_ordered_ids(&self, seed: &PlaylistSeed) -> Result<Vec<i64>> {
        let metadata_items = self.db.metadata_items();
        Ok(match seed {
            PlaylistSeed::Single { item_id } => vec![*item_id],
            PlaylistSeed::Album { album_id } => metadata_items.list_children(*album_id).await?.iter().map(|i| i.id).collect(),
            PlaylistSeed::Season { season_id } => metadata_items.list_children(*season_id).await?.iter().map(|i| i.id).collect(),
            PlaylistSeed::Show { show_id } => metadata_items.list_children(*show_id).await?.iter().map(|i| i.id).collect(),
            PlaylistSeed::Library { library_section_id, metadata_type } => metadata_items
                .list_roots(*library_section_id, metadata_type)
                .await?
                .iter()
                .map(|i| i.id)
                .collect(),
            PlaylistSeed::Explicit { item_ids } => item_ids.clone(),
        })
    }

    async fn load_state(&self, uuid: Uuid) -> Result<Arc<ParkingMutex<GeneratorState>>> {
        if let Some(existing) = GENERATORS.get(&uuid) {
            return Ok(existing.clone());
        }
        let record = self
            .db
            .playlist_generators()
            .get_by_uuid(uuid)
            .await?
            .ok_or_else(|| anyhow!("playlist generator {uuid} not found"))?;
        let seed: PlaylistSeed = serde_json::from_value(record.seed)?;
        let ordered_ids = self.resolve_ordered_ids(&seed).await?;
        let shuffle_order = if record.shuffle { Some(fisher_yates(ordered_ids.len(), record.cursor_index as usize)) } else { None };

        let state = Arc::new(ParkingMutex::new(GeneratorState {
            ordered_ids,
            shuffle_order,
            cursor_index: record.cursor_index,
            shuffle: record.shuffle,
            repeat: record.repeat,
            last_next_at: None,
            last_next_index: record.cursor_index,
        }));
        GENERATORS.insert(uuid, state.clone());
        Ok(state)
    }

    pub async fn get_chunk(&self, uuid: Uuid, start_index: i64, limit: i64) -> Result<PlaylistChunk> {
        let lock = self.load_state(uuid).await?;
        let guard = lock.lock();
        Ok(chunk_from_state(&guard, start_index, limit))
    }

    pub async fn advance(&self, uuid: Uuid, direction: Direction, jump_index: Option<i64>) -> Result<Option<PlaylistChunk>> {
        let lock = self.load_state(uuid).await?;

        let outcome = {
            let mut guard = lock.lock();
            match direction {
                Direction::Next => {
                    if let Some(last_at) = guard.last_next_at {
                        if last_at.elapsed() < NEXT_IDEMPOTENCY_WINDOW {
                            let idx = guard.last_next_index;
                            return Ok(Some(chunk_from_state(&guard, (idx - DEFAULT_CHUNK_SIZE / 2).max(0), DEFAULT_CHUNK_SIZE)));
                        }
                    }
                    let total = guard.total_count();
                    let next = guard.cursor_index + 1;
                    guard.cursor_index = if next >= total {
                        if guard.repeat { 0 } else { total.max(1) - 1 }
                    } else {
                        next
                    };
                    guard.last_next_at = Some(Instant::now());
                    guard.last_next_index = guard.cursor_index;
                    if next >= total && !guard.repeat {
                        None
                    } else {
                        Some(())
                    }
                }
                Direction::Previous => {
                    let prev = guard.cursor_index - 1;
                    guard.cursor_index = if prev < 0 {
                        if guard.repeat { guard.total_count() - 1 } else { 0 }
                    } else {
                        prev
                    };
                    Some(())
                }
                Direction::Jump => {
                    let target = jump_index.ok_or_else(|| anyhow!("jump direction requires jumpIndex"))?;
                    if target < 0 || target >= guard.total_count() {
                        return Err(anyhow!("jump index {target} out of range"));
                    }
                    guard.cursor_index = target;
                    Some(())
                }
                Direction::Stay => Some(()),
                Direction::Stop => None,
            }
        };

        if outcome.is_none() {
            return Ok(None);
        }

        let snapshot = {
            let guard = lock.lock();
            chunk_from_state(&guard, (guard.cursor_index - DEFAULT_CHUNK_SIZE / 2).max(0), DEFAULT_CHUNK_SIZE)
        };
        self.db.playlist_generators().advance_cursor(uuid, snapshot.current_index).await?;
        self.db.playlist_generators().replace_window(uuid, &items_to_json(&snapshot)).await?;
        Ok(Some(snapshot))
    }

    pub async fn set_shuffle(&self, uuid: Uuid, shuffle: bool) -> Result<()> {
        let lock = self.load_state(uuid).await?;
        {
            let mut guard = lock.lock();
            guard.shuffle = shuffle;
            guard.shuffle_order = if shuffle { Some(fisher_yates(guard.ordered_ids.len(), guard.cursor_index as usize)) } else { None };
        }
        self.db
            .playlist_generators()
            .replace_window(uuid, &serde_json::json!({}))
            .await?;
        Ok(())
    }

    pub async fn set_repeat(&self, uuid: Uuid, repeat: bool) -> Result<()> {
        let lock = self.load_state(uuid).await?;
        lock.lock().repeat = repeat;
        Ok(())
    }

    pub async fn stop(&self, uuid: Uuid) -> Result<()> {
        GENERATORS.remove(&uuid);
        self.db.playlist_generators().deactivate(uuid).await?;
        Ok(())
    }

    async fn materialize_and_persist(&self, uuid: Uuid, state: GeneratorState) -> Result<PlaylistChunk> {
        let chunk = chunk_from_state(&state, 0, DEFAULT_CHUNK_SIZE);
        GENERATORS.insert(uuid, Arc::new(ParkingMutex::new(state)));
        self.db.playlist_generators().replace_window(uuid, &items_to_json(&chunk)).await?;
        Ok(chunk)
    }
}

fn chunk_from_state(state: &GeneratorState, start_index: i64, limit: i64) -> PlaylistChunk {
    let total = state.total_count();
    let start = start_index.clamp(0, total.max(0));
    let end = (start + limit).min(total);
    let items = (start..end).map(|i| state.item_at(i)).collect();
    PlaylistChunk {
        items,
        start_index: start,
        current_index: state.cursor_index,
        total_count: total,
        has_more: end < total,
        shuffle: state.shuffle,
        repeat: state.repeat,
    }
}

fn items_to_json(chunk: &PlaylistChunk) -> serde_json::Value {
    let map: HashMap<String, i64> = chunk
        .items
        .iter()
        .enumerate()
        .filter_map(|(offset, item)| item.map(|id| ((chunk.start_index + offset as i64).to_string(), id)))
        .collect();
    serde_json::to_value(map).unwrap_or_else(|_| serde_json::json!({}))
}

/// Fisher-Yates permutation of `0..len`, with `pin_index` swapped to the front so the item
/// currently playing stays at position 0 of the new shuffled order (§4.11).
fn fisher_yates(len: usize, pin_index: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    let mut rng = thread_rng();
    order.shuffle(&mut rng);
    if let Some(pos) = order.iter().position(|&i| i == pin_index) {
        order.swap(0, pos);
    }
    order
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

    async fn seeded_library(db: &Database, count: usize) -> i64 {
        let section = db
            .library_sections()
            .create(CreateLibrarySection { name: "Movies".into(), section_type: "movie".into(), settings: json!({}) })
            .await
            .unwrap();
        for n in 0..count {
            db.metadata_items()
                .create(CreateMetadataItem {
                    library_section_id: section.id,
                    metadata_type: "Movie".into(),
                    title: format!("Movie {n:02}"),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        section.id
    }

    #[tokio::test]
    async fn create_playlist_materializes_full_library_order() {
        let db = memory_db().await;
        let section_id = seeded_library(&db, 5).await;
        let service = PlaylistService::new(db);
        let (_uuid, chunk) = service
            .create_playlist(1, PlaylistSeed::Library { library_section_id: section_id, metadata_type: "Movie".into() })
            .await
            .unwrap();
        assert_eq!(chunk.total_count, 5);
        assert_eq!(chunk.items.iter().filter(|i| i.is_some()).count(), 5);
    }

    #[tokio::test]
    async fn concurrent_next_within_window_is_idempotent() {
        let db = memory_db().await;
        let section_id = seeded_library(&db, 5).await;
        let service = PlaylistService::new(db);
        let (uuid, _chunk) = service
            .create_playlist(1, PlaylistSeed::Library { library_section_id: section_id, metadata_type: "Movie".into() })
            .await
            .unwrap();

        let first = service.advance(uuid, Direction::Next, None).await.unwrap().unwrap();
        let second = service.advance(uuid, Direction::Next, None).await.unwrap().unwrap();
        assert_eq!(first.current_index, second.current_index);
    }

    #[tokio::test]
    async fn shuffle_pins_current_item_to_position_zero() {
        let db = memory_db().await;
        let section_id = seeded_library(&db, 8).await;
        let service = PlaylistService::new(db);
        let (uuid, _chunk) = service
            .create_playlist(1, PlaylistSeed::Library { library_section_id: section_id, metadata_type: "Movie".into() })
            .await
            .unwrap();
        let before = service.get_chunk(uuid, 0, 1).await.unwrap().items[0];
        service.set_shuffle(uuid, true).await.unwrap();
        let after = service.get_chunk(uuid, 0, 1).await.unwrap().items[0];
        assert_eq!(before, after);
    }
}
