//! GoP Index & BIF Trickplay stores (§3 data model, §5 shared-resource policy).
//!
//! Both artifacts are sharded per `(metadata uuid, part index)` under `Paths::media_cache`
//! and written atomically (`*.tmp` then rename) via [`crate::paths::atomic_write`]. Concurrent
//! writers for the same key are serialized through a per-key lock, matching the reference
//! stack's concurrent-map usage generalized to per-artifact locking.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use quick_xml::de::from_str as xml_from_str;
use quick_xml::se::to_string as xml_to_string;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::paths::{atomic_write, Paths};

/// Per-(uuid, part_index) write locks, shared process-wide so two writers never race on the
/// same artifact's temp-then-rename sequence.
static ARTIFACT_LOCKS: Lazy<DashMap<(Uuid, i32), Arc<AsyncMutex<()>>>> = Lazy::new(DashMap::new);

fn lock_for(uuid: Uuid, part_index: i32) -> Arc<AsyncMutex<()>> {
    ARTIFACT_LOCKS
        .entry((uuid, part_index))
        .or_insert_with(|| Arc::new(AsyncMutex::new(())))
        .clone()
}

// ============================================================================
// GoP index
// ============================================================================

/// One keyframe-delimited chunk boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GopEntry {
    pub pts_ms: i64,
    pub byte_offset: i64,
    pub is_keyframe: bool,
    pub gop_duration_ms: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "gopIndex")]
struct GopIndexXml {
    #[serde(rename = "entry", default)]
    entries: Vec<GopEntry>,
}

/// Sorted sequence of [`GopEntry`] for one media part, used for seek-alignment.
#[derive(Debug, Clone, Default)]
pub struct GopIndex {
    pub entries: Vec<GopEntry>,
}

/// Response shape for a GoP-aware seek (§4.8 Seek).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeekResult {
    pub keyframe_ms: i64,
    pub gop_duration_ms: i64,
    pub has_gop_index: bool,
    pub original_target_ms: i64,
}

impl GopIndex {
    pub fn new(mut entries: Vec<GopEntry>) -> Self {
        entries.sort_by_key(|e| e.pts_ms);
        Self { entries }
    }

    /// Nearest keyframe PTS ≤ `target_ms`; falls back to the earliest keyframe when none is
    /// ≤ target, and to `target_ms` itself (no adjustment) when the index has no keyframes.
    pub fn seek(&self, target_ms: i64) -> SeekResult {
        let keyframes: Vec<&GopEntry> = self.entries.iter().filter(|e| e.is_keyframe).collect();
        if keyframes.is_empty() {
            return SeekResult {
                keyframe_ms: target_ms,
                gop_duration_ms: 0,
                has_gop_index: false,
                original_target_ms: target_ms,
            };
        }

        let chosen = keyframes
            .iter()
            .filter(|e| e.pts_ms <= target_ms)
            .max_by_key(|e| e.pts_ms)
            .copied()
            .unwrap_or(keyframes[0]);

        SeekResult {
            keyframe_ms: chosen.pts_ms,
            gop_duration_ms: chosen.gop_duration_ms,
            has_gop_index: true,
            original_target_ms: target_ms,
        }
    }

    pub async fn write(&self, paths: &Paths, uuid: Uuid, part_index: i32) -> Result<()> {
        let lock = lock_for(uuid, part_index);
        let _guard = lock.lock().await;

        let xml = GopIndexXml {
            entries: self.entries.clone(),
        };
        let body = xml_to_string(&xml).context("failed to serialize GoP index")?;
        let dest = paths.gop_index_path(&uuid, part_index);
        atomic_write(paths, &dest, body.as_bytes()).await
    }

    pub async fn read(paths: &Paths, uuid: Uuid, part_index: i32) -> Result<Option<Self>> {
        let path = paths.gop_index_path(&uuid, part_index);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read GoP index at {}", path.display()))?;
        let parsed: GopIndexXml = xml_from_str(&raw).context("GoP index is not valid XML")?;
        Ok(Some(GopIndex::new(parsed.entries)))
    }
}

// ============================================================================
// BIF trickplay
// ============================================================================

const BIF_MAGIC: [u8; 8] = [0x89, b'B', b'I', b'F', 0x0d, 0x0a, 0x1a, 0x0a];
const BIF_VERSION: u32 = 0;
const BIF_HEADER_LEN: usize = 64;

/// One trickplay thumbnail: frame index and its already-JPEG-encoded bytes.
#[derive(Debug, Clone)]
pub struct BifEntry {
    pub index: u32,
    pub jpeg: Vec<u8>,
}

/// Metadata-only view of a BIF file: interval and per-index sizes, without loading images.
#[derive(Debug, Clone)]
pub struct BifMetadata {
    pub interval_ms: u32,
    pub entry_count: usize,
}

/// Trickplay thumbnail archive for one media part, sampled at roughly `interval_ms` cadence.
#[derive(Debug, Clone)]
pub struct BifFile {
    pub interval_ms: u32,
    pub entries: Vec<BifEntry>,
}

impl BifFile {
    /// Builds a BIF file from raw thumbnail bytes, re-encoding each to a consistent JPEG
    /// quality/size via the `image` crate so source format (PNG frame grabs, etc.) doesn't leak
    /// into the archive.
    pub fn assemble(interval_ms: u32, raw_thumbnails: Vec<(u32, Vec<u8>)>, max_width: u32) -> Result<Self> {
        let mut entries = Vec::with_capacity(raw_thumbnails.len());
        for (index, bytes) in raw_thumbnails {
            let jpeg = reencode_jpeg(&bytes, max_width)
                .with_context(|| format!("failed to re-encode thumbnail at index {index}"))?;
            entries.push(BifEntry { index, jpeg });
        }
        entries.sort_by_key(|e| e.index);
        Ok(Self { interval_ms, entries })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&BIF_MAGIC);
        out.extend_from_slice(&BIF_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.interval_ms.to_le_bytes());
        out.resize(BIF_HEADER_LEN, 0);

        let index_table_len = (self.entries.len() + 1) * 8;
        let mut offset = (BIF_HEADER_LEN + index_table_len) as u32;
        let mut index_table = Vec::with_capacity(index_table_len);
        for entry in &self.entries {
            index_table.extend_from_slice(&entry.index.to_le_bytes());
            index_table.extend_from_slice(&offset.to_le_bytes());
            offset += entry.jpeg.len() as u32;
        }
        // sentinel entry marking end-of-data
        index_table.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
        index_table.extend_from_slice(&offset.to_le_bytes());

        out.extend_from_slice(&index_table);
        for entry in &self.entries {
            out.extend_from_slice(&entry.jpeg);
        }
        out
    }

    fn parse(raw: &[u8]) -> Result<(BifMetadata, Vec<(u32, u32, u32)>)> {
        if raw.len() < BIF_HEADER_LEN || raw[0..8] != BIF_MAGIC {
            anyhow::bail!("not a BIF file: bad magic");
        }
        let count = u32::from_le_bytes(raw[12..16].try_into().unwrap()) as usize;
        let interval_ms = u32::from_le_bytes(raw[16..20].try_into().unwrap());

        let mut table = Vec::with_capacity(count);
        let mut cursor = BIF_HEADER_LEN;
        let mut rows = Vec::with_capacity(count + 1);
        for _ in 0..=count {
            if cursor + 8 > raw.len() {
                anyhow::bail!("BIF index table truncated");
            }
            let idx = u32::from_le_bytes(raw[cursor..cursor + 4].try_into().unwrap());
            let off = u32::from_le_bytes(raw[cursor + 4..cursor + 8].try_into().unwrap());
            rows.push((idx, off));
            cursor += 8;
        }
        for pair in rows.windows(2) {
            let (idx, start) = pair[0];
            let (_, end) = pair[1];
            table.push((idx, start, end));
        }

        Ok((BifMetadata { interval_ms, entry_count: count }, table))
    }

    pub async fn write(&self, paths: &Paths, uuid: Uuid, part_index: i32) -> Result<()> {
        let lock = lock_for(uuid, part_index);
        let _guard = lock.lock().await;

        let bytes = self.serialize();
        let dest = paths.bif_path(&uuid, part_index);
        atomic_write(paths, &dest, &bytes).await
    }

    /// Reads just the header + index table, not the image bytes.
    pub async fn read_metadata(paths: &Paths, uuid: Uuid, part_index: i32) -> Result<Option<BifMetadata>> {
        let path = paths.bif_path(&uuid, part_index);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let raw = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read BIF file at {}", path.display()))?;
        let (meta, _) = Self::parse(&raw)?;
        Ok(Some(meta))
    }

    /// Reads exactly the JPEG bytes for one frame index, without loading the rest of the file
    /// into memory beyond a single read.
    pub async fn read_thumbnail(
        paths: &Paths,
        uuid: Uuid,
        part_index: i32,
        frame_index: u32,
    ) -> Result<Option<Vec<u8>>> {
        let path = paths.bif_path(&uuid, part_index);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let raw = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read BIF file at {}", path.display()))?;
        let (_, table) = Self::parse(&raw)?;
        let lookup: HashMap<u32, (u32, u32)> = table.into_iter().map(|(i, s, e)| (i, (s, e))).collect();
        Ok(lookup
            .get(&frame_index)
            .map(|(start, end)| raw[*start as usize..*end as usize].to_vec()))
    }
}

fn reencode_jpeg(bytes: &[u8], max_width: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).context("thumbnail bytes are not a decodable image")?;
    let resized = if img.width() > max_width {
        let ratio = max_width as f64 / img.width() as f64;
        let target_height = (img.height() as f64 * ratio).round() as u32;
        img.thumbnail(max_width, target_height.max(1))
    } else {
        img
    };

    let mut out = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    resized
        .write_to(&mut cursor, image::ImageFormat::Jpeg)
        .context("failed to encode trickplay thumbnail as JPEG")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_jpeg() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, image::ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    #[test]
    fn gop_seek_returns_nearest_keyframe_at_or_below_target() {
        let index = GopIndex::new(vec![
            GopEntry { pts_ms: 0, byte_offset: 0, is_keyframe: true, gop_duration_ms: 2000 },
            GopEntry { pts_ms: 2000, byte_offset: 100, is_keyframe: true, gop_duration_ms: 2000 },
            GopEntry { pts_ms: 4000, byte_offset: 200, is_keyframe: true, gop_duration_ms: 2000 },
            GopEntry { pts_ms: 6000, byte_offset: 300, is_keyframe: true, gop_duration_ms: 2000 },
        ]);
        let result = index.seek(3500);
        assert_eq!(result.keyframe_ms, 2000);
        assert_eq!(result.gop_duration_ms, 2000);
        assert!(result.has_gop_index);
        assert_eq!(result.original_target_ms, 3500);
    }

    #[test]
    fn gop_seek_before_first_keyframe_uses_earliest() {
        let index = GopIndex::new(vec![GopEntry { pts_ms: 1000, byte_offset: 0, is_keyframe: true, gop_duration_ms: 2000 }]);
        let result = index.seek(200);
        assert_eq!(result.keyframe_ms, 1000);
    }

    #[test]
    fn gop_seek_with_no_keyframes_has_no_index() {
        let index = GopIndex::new(vec![]);
        let result = index.seek(500);
        assert!(!result.has_gop_index);
        assert_eq!(result.keyframe_ms, 500);
    }

    #[tokio::test]
    async fn gop_index_write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = test_paths(tmp.path());
        let uuid = Uuid::new_v4();

        let index = GopIndex::new(vec![
            GopEntry { pts_ms: 0, byte_offset: 0, is_keyframe: true, gop_duration_ms: 2000 },
            GopEntry { pts_ms: 2000, byte_offset: 42, is_keyframe: true, gop_duration_ms: 2000 },
        ]);
        index.write(&paths, uuid, 0).await.unwrap();

        let read_back = GopIndex::read(&paths, uuid, 0).await.unwrap().unwrap();
        assert_eq!(read_back.entries, index.entries);
    }

    #[tokio::test]
    async fn bif_write_then_read_metadata_and_thumbnail() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = test_paths(tmp.path());
        let uuid = Uuid::new_v4();

        let thumbs = vec![(0u32, sample_jpeg()), (1u32, sample_jpeg()), (2u32, sample_jpeg())];
        let bif = BifFile::assemble(10_000, thumbs, 320).unwrap();
        bif.write(&paths, uuid, 0).await.unwrap();

        let meta = BifFile::read_metadata(&paths, uuid, 0).await.unwrap().unwrap();
        assert_eq!(meta.entry_count, 3);
        assert_eq!(meta.interval_ms, 10_000);

        let thumb = BifFile::read_thumbnail(&paths, uuid, 0, 1).await.unwrap().unwrap();
        assert!(!thumb.is_empty());
        assert!(image::load_from_memory(&thumb).is_ok());
    }

    fn test_paths(base: &std::path::Path) -> Paths {
        let paths = Paths {
            data: base.join("data"),
            db: base.join("data/db"),
            index: base.join("data/index"),
            cache: base.join("cache"),
            media_cache: base.join("cache/media"),
            transcodes: base.join("cache/transcodes"),
            log: base.join("logs"),
            temp: base.join("tmp"),
            backup: base.join("data/backup"),
        };
        std::fs::create_dir_all(&paths.temp).unwrap();
        paths
    }
}
