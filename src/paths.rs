//! Path & Settings layer (§4.3): resolves on-disk directories and persists typed settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::Config;

/// Resolved, startup-ensured filesystem roots.
///
/// Computed once from [`Config`] and held behind an `Arc` in `AppState`; directories are
/// created (not merely validated) at construction time, matching the filesystem layout in §6.
#[derive(Debug, Clone)]
pub struct Paths {
    pub data: PathBuf,
    pub db: PathBuf,
    pub index: PathBuf,
    pub cache: PathBuf,
    pub media_cache: PathBuf,
    pub transcodes: PathBuf,
    pub log: PathBuf,
    pub temp: PathBuf,
    pub backup: PathBuf,
}

impl Paths {
    /// Resolve every root from `config` and ensure each exists, creating directories as needed.
    pub fn resolve(config: &Config) -> Result<Self> {
        let data = config.data_path.clone();
        let db = data.join("db");
        let index = data.join("index");
        let cache = config.cache_path.clone();
        let media_cache = cache.join("media");
        let transcodes = cache.join("transcodes");
        let log = config.log_path.clone();
        let temp = config.temp_path.clone();
        let backup = data.join("backup");

        for dir in [&data, &db, &index, &cache, &media_cache, &transcodes, &log, &temp, &backup] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }

        Ok(Self {
            data,
            db,
            index,
            cache,
            media_cache,
            transcodes,
            log,
            temp,
            backup,
        })
    }

    /// Sharded path for a GoP index file: `<media_cache>/aa/bb/<uuid>.<partIndex>.xml`.
    pub fn gop_index_path(&self, uuid: &uuid::Uuid, part_index: i32) -> PathBuf {
        self.sharded(uuid, &format!("{part_index}.xml"))
    }

    /// Sharded path for a BIF trickplay file: `<media_cache>/aa/bb/<uuid>.<partIndex>.bif`.
    pub fn bif_path(&self, uuid: &uuid::Uuid, part_index: i32) -> PathBuf {
        self.sharded(uuid, &format!("{part_index}.bif"))
    }

    /// Sharded directory for selected artwork: `<media_cache>/aa/bb/<uuid>/artwork/`.
    pub fn artwork_dir(&self, uuid: &uuid::Uuid) -> PathBuf {
        let (aa, bb) = shard_prefix(uuid);
        self.media_cache.join(aa).join(bb).join(uuid.to_string()).join("artwork")
    }

    fn sharded(&self, uuid: &uuid::Uuid, suffix: &str) -> PathBuf {
        let (aa, bb) = shard_prefix(uuid);
        self.media_cache.join(aa).join(bb).join(format!("{uuid}.{suffix}"))
    }

    /// Directory a transcode job writes its manifest and segments into.
    pub fn transcode_job_dir(&self, job_uuid: &uuid::Uuid) -> PathBuf {
        self.transcodes.join(job_uuid.to_string())
    }

    /// A fresh scratch path under `temp/` for an atomic write, given the eventual destination.
    pub fn scratch_for(&self, destination: &Path) -> PathBuf {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());
        self.temp.join(format!("{name}.{}.tmp", uuid::Uuid::new_v4()))
    }
}

fn shard_prefix(uuid: &uuid::Uuid) -> (String, String) {
    let hex = uuid.simple().to_string();
    (hex[0..2].to_string(), hex[2..4].to_string())
}

/// Write `bytes` atomically to `destination`: write to a temp file in the same directory
/// tree, fsync, then rename. Ensures parent directories exist first.
pub async fn atomic_write(paths: &Paths, destination: &Path, bytes: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let scratch = paths.scratch_for(destination);
    let mut file = tokio::fs::File::create(&scratch).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&scratch, destination).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_prefix_splits_first_four_hex_chars() {
        let id = uuid::Uuid::parse_str("aabbccdd-0000-0000-0000-000000000000").unwrap();
        let (aa, bb) = shard_prefix(&id);
        assert_eq!(aa, "aa");
        assert_eq!(bb, "bb");
    }

    #[tokio::test]
    async fn atomic_write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();
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
        let dest = base.join("cache/media/aa/bb/out.bin");
        atomic_write(&paths, &dest, b"hello").await.unwrap();
        let read = tokio::fs::read(&dest).await.unwrap();
        assert_eq!(read, b"hello");
    }
}
