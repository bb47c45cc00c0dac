//! File analyzer (§4.4 Scan Pipeline, file-analyzer stage).
//!
//! Concurrency here is per media part, not per metadata item — two parts of the same multi-part
//! movie analyze in parallel. Video/audio/subtitle stream data comes from `ffprobe` via
//! [`FfmpegService`]; embedded audio tags (ID3/Vorbis comments) are read with `lofty`, matching
//! the reference stack's embedded-metadata reader.

use std::path::Path;

use anyhow::Result;
use tracing::warn;

use crate::db::media::{CreateAudioStream, CreateSubtitleStream, CreateVideoStream};
use crate::db::Database;
use crate::services::ffmpeg::{FfmpegService, MediaAnalysis};

/// Embedded audio tags lifted straight off the file, independent of any external agent.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedAudioTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    pub year: Option<i32>,
}

/// Runs ffprobe over `part_path`, replaces the part's stream rows, and folds duration/dimensions
/// /HDR/rotation up into the owning `MediaItem`. Technical stream data always reflects what's
/// actually on disk — locked_fields only gates descriptive MetadataItem text, never this.
pub async fn analyze_part(
    db: &Database,
    ffmpeg: &FfmpegService,
    media_item_id: i64,
    media_part_id: i64,
    part_path: &str,
) -> Result<MediaAnalysis> {
    let analysis = ffmpeg.analyze(Path::new(part_path)).await?;

    db.streams().clear_for_part(media_part_id).await?;

    for stream in &analysis.video_streams {
        db.streams()
            .add_video(CreateVideoStream {
                media_part_id,
                stream_index: stream.index as i64,
                codec: stream.codec.clone(),
                width: Some(stream.width as i64),
                height: Some(stream.height as i64),
                bitrate: stream.bitrate,
                is_hdr: stream.hdr_type.is_some(),
            })
            .await?;
    }
    for stream in &analysis.audio_streams {
        db.streams()
            .add_audio(CreateAudioStream {
                media_part_id,
                stream_index: stream.index as i64,
                codec: stream.codec.clone(),
                channels: stream.channels as i64,
                language: stream.language.clone(),
                is_default: stream.is_default,
            })
            .await?;
    }
    for stream in &analysis.subtitle_streams {
        db.streams()
            .add_subtitle(CreateSubtitleStream {
                media_part_id,
                stream_index: Some(stream.index as i64),
                codec: stream.codec.clone(),
                language: stream.language.clone(),
                is_sidecar: false,
                sidecar_path: None,
                forced: stream.is_forced,
            })
            .await?;
    }

    let primary_video = analysis.video_streams.first();
    let rotation = primary_video
        .and_then(|s| s.metadata.get("rotate"))
        .and_then(|r| r.parse::<i64>().ok())
        .unwrap_or(0);

    let duration_ms = analysis.duration_secs.map(|s| (s * 1000.0).round() as i64);

    db.media_items()
        .update_technical(
            media_item_id,
            Some(&analysis.container_format),
            analysis.bitrate,
            duration_ms,
            primary_video.map(|s| s.width as i64),
            primary_video.map(|s| s.height as i64),
            primary_video.is_some_and(|s| s.hdr_type.is_some()),
            rotation,
        )
        .await?;

    Ok(analysis)
}

/// Reads embedded tags from an audio file with `lofty`. Swallows errors: a corrupt tag block
/// must not fail the whole analysis stage, just leave the embedded-tag fields empty.
pub fn read_embedded_audio_tags(part_path: &str) -> EmbeddedAudioTags {
    use lofty::file::TaggedFileExt;
    use lofty::prelude::{Accessor, ItemKey};
    use lofty::probe::Probe;

    let probed = match Probe::open(part_path).and_then(|p| p.read()) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = part_path, error = %e, "failed to read embedded audio tags");
            return EmbeddedAudioTags::default();
        }
    };

    let Some(tag) = probed.primary_tag().or_else(|| probed.first_tag()) else {
        return EmbeddedAudioTags::default();
    };

    EmbeddedAudioTags {
        title: tag.title().map(|s| s.to_string()),
        artist: tag.artist().map(|s| s.to_string()),
        album: tag.album().map(|s| s.to_string()),
        track_number: tag.track(),
        year: tag
            .get_string(&ItemKey::Year)
            .and_then(|s| s.parse().ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_embedded_audio_tags_returns_default_on_missing_file() {
        let tags = read_embedded_audio_tags("/nonexistent/path/does-not-exist.mp3");
        assert!(tags.title.is_none());
        assert!(tags.artist.is_none());
    }
}
