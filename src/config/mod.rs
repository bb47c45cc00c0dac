//! Application configuration management

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind host for the HTTP/GraphQL server.
    pub host: String,

    /// Bind port for the HTTP/GraphQL server.
    pub port: u16,

    /// SQLite database path.
    pub database_url: String,

    /// JWT secret used to verify bearer tokens (issuance happens elsewhere).
    pub jwt_secret: String,

    /// Root data directory (holds `db/` and `index/`).
    pub data_path: PathBuf,

    /// Root cache directory (holds `media/` artifacts and `transcodes/`).
    pub cache_path: PathBuf,

    /// Log file directory.
    pub log_path: PathBuf,

    /// Scratch directory for atomic-write staging.
    pub temp_path: PathBuf,

    /// Log level passed to `EnvFilter` when `RUST_LOG` is unset.
    pub log_level: String,

    /// Path to the `ffmpeg` binary (resolved via `$PATH` if relative).
    pub ffmpeg_path: String,

    /// Path to the `ffprobe` binary.
    pub ffprobe_path: String,

    /// Override for resolver/file-analyzer worker counts; `None` derives from CPU count per §4.4.
    pub scan_concurrency_override: Option<usize>,

    /// Maximum concurrent transcode jobs.
    pub max_concurrent_transcodes: usize,

    /// Playback session heartbeat TTL, in seconds.
    pub playback_session_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables, falling back to `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let data_path = PathBuf::from(
            env::var("NEXA_DATA_PATH").unwrap_or_else(|_| "./data".to_string()),
        );
        let cache_path = PathBuf::from(
            env::var("NEXA_CACHE_PATH").unwrap_or_else(|_| "./cache".to_string()),
        );
        let log_path = PathBuf::from(
            env::var("NEXA_LOG_PATH").unwrap_or_else(|_| "./logs".to_string()),
        );
        let temp_path = PathBuf::from(
            env::var("NEXA_TEMP_PATH").unwrap_or_else(|_| "./tmp".to_string()),
        );

        let database_url = env::var("DATABASE_PATH")
            .or_else(|_| env::var("DATABASE_URL"))
            .unwrap_or_else(|_| format!("{}/db/nexa.db", data_path.display()));

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            use std::collections::hash_map::DefaultHasher;
            use std::hash::{Hash, Hasher};
            let mut hasher = DefaultHasher::new();
            std::time::SystemTime::now().hash(&mut hasher);
            format!("dev-secret-{}", hasher.finish())
        });

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url,
            jwt_secret,
            data_path,
            cache_path,
            log_path,
            temp_path,

            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),

            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),

            scan_concurrency_override: env::var("NEXA_SCAN_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok()),

            max_concurrent_transcodes: env::var("NEXA_MAX_TRANSCODES")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),

            playback_session_ttl_secs: env::var("NEXA_PLAYBACK_TTL_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
        })
    }
}
