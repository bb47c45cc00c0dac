//! Integration tests for the playback and library pipeline
//!
//! These tests verify the documented business rules in isolation from the database:
//! - Stream decision classification (direct play / direct stream / transcode)
//! - Playlist direction semantics
//! - ABR ladder invariants
//! - Filename quality-token normalization
//! - Filter-chain hardware pairing rules

// ============================================================================
// Stream Decision Tests
// ============================================================================

/// Mirrors the direct-play/direct-stream/transcode classification used by the playback
/// orchestrator: DirectPlay if container, both codecs, HDR, and bitrate all fit; DirectStream
/// if only the container differs; Transcode otherwise.
mod stream_decision {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Method {
        DirectPlay,
        DirectStream,
        Transcode,
    }

    struct Source {
        container: &'static str,
        video_codec: &'static str,
        audio_codec: &'static str,
        is_hdr: bool,
        bitrate_bps: u64,
    }

    struct ClientCaps {
        containers: &'static [&'static str],
        video_codecs: &'static [&'static str],
        audio_codecs: &'static [&'static str],
        supports_hdr: bool,
        max_bitrate_bps: u64,
    }

    fn classify(src: &Source, caps: &ClientCaps) -> Method {
        let codecs_ok = caps.video_codecs.contains(&src.video_codec) && caps.audio_codecs.contains(&src.audio_codec);
        let hdr_ok = !src.is_hdr || caps.supports_hdr;
        let bitrate_ok = src.bitrate_bps <= caps.max_bitrate_bps;

        if !codecs_ok || !hdr_ok || !bitrate_ok {
            return Method::Transcode;
        }

        if caps.containers.contains(&src.container) {
            Method::DirectPlay
        } else {
            Method::DirectStream
        }
    }

    fn sample_source() -> Source {
        Source { container: "mp4", video_codec: "h264", audio_codec: "aac", is_hdr: false, bitrate_bps: 4_000_000 }
    }

    fn permissive_caps() -> ClientCaps {
        ClientCaps { containers: &["mp4"], video_codecs: &["h264"], audio_codecs: &["aac"], supports_hdr: false, max_bitrate_bps: 8_000_000 }
    }

    #[test]
    fn matching_container_and_codecs_direct_plays() {
        assert_eq!(classify(&sample_source(), &permissive_caps()), Method::DirectPlay);
    }

    #[test]
    fn mismatched_container_with_compatible_codecs_direct_streams() {
        let caps = ClientCaps { containers: &["mkv"], ..permissive_caps() };
        assert_eq!(classify(&sample_source(), &caps), Method::DirectStream);
    }

    #[test]
    fn unsupported_video_codec_forces_transcode() {
        let caps = ClientCaps { video_codecs: &["vp9"], ..permissive_caps() };
        assert_eq!(classify(&sample_source(), &caps), Method::Transcode);
    }

    #[test]
    fn hdr_source_without_hdr_support_forces_transcode() {
        let src = Source { is_hdr: true, ..sample_source() };
        assert_eq!(classify(&src, &permissive_caps()), Method::Transcode);
    }

    #[test]
    fn bitrate_over_cap_forces_transcode_even_with_matching_container() {
        let caps = ClientCaps { max_bitrate_bps: 1_000_000, ..permissive_caps() };
        assert_eq!(classify(&sample_source(), &caps), Method::Transcode);
    }

    #[test]
    fn hdr_source_with_hdr_support_and_matching_container_direct_plays() {
        let src = Source { is_hdr: true, ..sample_source() };
        let caps = ClientCaps { supports_hdr: true, ..permissive_caps() };
        assert_eq!(classify(&src, &caps), Method::DirectPlay);
    }
}

// ============================================================================
// Playlist Direction Tests
// ============================================================================

/// Mirrors the `Direction` state machine driving `advanceChunk`/`advancePlaylist`: which
/// directions are legal from a given playback position within a chunk.
mod playlist_direction {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Direction {
        Next,
        Previous,
        Jump,
        Stay,
        Stop,
    }

    fn is_legal(direction: Direction, position: usize, len: usize, repeat_all: bool) -> bool {
        match direction {
            Direction::Next => position + 1 < len || repeat_all,
            Direction::Previous => position > 0 || repeat_all,
            Direction::Jump => len > 0,
            Direction::Stay => true,
            Direction::Stop => true,
        }
    }

    #[test]
    fn next_is_illegal_at_end_without_repeat() {
        assert!(!is_legal(Direction::Next, 4, 5, false));
    }

    #[test]
    fn next_is_legal_at_end_with_repeat_all() {
        assert!(is_legal(Direction::Next, 4, 5, true));
    }

    #[test]
    fn previous_is_illegal_at_start_without_repeat() {
        assert!(!is_legal(Direction::Previous, 0, 5, false));
    }

    #[test]
    fn previous_is_legal_mid_chunk() {
        assert!(is_legal(Direction::Previous, 2, 5, false));
    }

    #[test]
    fn jump_requires_a_nonempty_chunk() {
        assert!(!is_legal(Direction::Jump, 0, 0, false));
        assert!(is_legal(Direction::Jump, 0, 1, false));
    }

    #[test]
    fn stay_and_stop_are_always_legal() {
        assert!(is_legal(Direction::Stay, 0, 0, false));
        assert!(is_legal(Direction::Stop, 4, 5, false));
    }
}

// ============================================================================
// ABR Ladder Tests
// ============================================================================

/// Mirrors the rung-filtering invariants of the ABR ladder builder: ascending order, never
/// upscaling past the source, never exceeding the bitrate cap, never empty.
mod abr_ladder {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Rung {
        height: u32,
        bitrate_bps: u64,
    }

    const CATALOG: &[Rung] = &[
        Rung { height: 240, bitrate_bps: 400_000 },
        Rung { height: 360, bitrate_bps: 700_000 },
        Rung { height: 480, bitrate_bps: 1_200_000 },
        Rung { height: 720, bitrate_bps: 2_500_000 },
        Rung { height: 1080, bitrate_bps: 5_000_000 },
    ];

    fn build_ladder(src_height: u32, max_allowed_bitrate_bps: u64) -> Vec<Rung> {
        let mut ladder: Vec<Rung> = CATALOG.iter().copied().filter(|r| r.height <= src_height && r.bitrate_bps <= max_allowed_bitrate_bps).collect();

        if ladder.is_empty() {
            if let Some(lowest_fitting) = CATALOG.iter().filter(|r| r.bitrate_bps <= max_allowed_bitrate_bps).min_by_key(|r| r.bitrate_bps) {
                return vec![*lowest_fitting];
            }
            return vec![CATALOG[0]];
        }

        ladder.sort_by_key(|r| r.bitrate_bps);
        ladder
    }

    #[test]
    fn ladder_never_upscales_past_source_height() {
        let ladder = build_ladder(480, 20_000_000);
        assert!(ladder.iter().all(|r| r.height <= 480));
    }

    #[test]
    fn ladder_never_exceeds_bitrate_cap_when_a_rung_fits() {
        let ladder = build_ladder(1080, 1_500_000);
        assert!(ladder.iter().all(|r| r.bitrate_bps <= 1_500_000));
    }

    #[test]
    fn ladder_is_sorted_ascending_by_bitrate() {
        let ladder = build_ladder(1080, 20_000_000);
        let mut sorted = ladder.clone();
        sorted.sort_by_key(|r| r.bitrate_bps);
        assert_eq!(ladder, sorted);
    }

    #[test]
    fn ladder_falls_back_to_lowest_rung_when_cap_excludes_every_fitting_rung() {
        let ladder = build_ladder(240, 100_000);
        assert_eq!(ladder.len(), 1);
        assert_eq!(ladder[0].height, 240);
    }
}

// ============================================================================
// Filename Quality Token Tests
// ============================================================================

/// Mirrors the source-label normalization applied when parsing quality tokens out of a
/// filename, as used to surface capability-profile mismatches during a refresh.
mod filename_quality_tokens {
    fn normalize_source(upper: &str) -> Option<&'static str> {
        if upper.contains("BLURAY") || upper.contains("BDRIP") || upper.contains("BLU-RAY") {
            Some("BluRay")
        } else if upper.contains("WEB-DL") || upper.contains("WEBDL") {
            Some("WEB-DL")
        } else if upper.contains("WEBRIP") {
            Some("WEBRip")
        } else if upper.contains("HDTV") {
            Some("HDTV")
        } else {
            None
        }
    }

    fn normalize_resolution(token: &str) -> String {
        match token.to_uppercase().as_str() {
            "4K" | "UHD" => "2160p".to_string(),
            other => other.to_lowercase(),
        }
    }

    #[test]
    fn recognizes_bluray_variants() {
        assert_eq!(normalize_source("MOVIE.2020.BLURAY.X264"), Some("BluRay"));
        assert_eq!(normalize_source("MOVIE.2020.BDRIP.X264"), Some("BluRay"));
    }

    #[test]
    fn prefers_first_matching_source_label() {
        assert_eq!(normalize_source("SHOW.S01E01.WEB-DL.X264"), Some("WEB-DL"));
    }

    #[test]
    fn unrecognized_source_yields_none() {
        assert_eq!(normalize_source("SHOW.S01E01.X264"), None);
    }

    #[test]
    fn four_k_and_uhd_both_normalize_to_2160p() {
        assert_eq!(normalize_resolution("4K"), "2160p");
        assert_eq!(normalize_resolution("UHD"), "2160p");
    }

    #[test]
    fn ordinary_resolution_tokens_lowercase() {
        assert_eq!(normalize_resolution("1080P"), "1080p");
    }
}

// ============================================================================
// Filter Chain Hardware Pairing Tests
// ============================================================================

/// Mirrors the hw device pairing rule used by the filter-chain validator: mixing two different
/// hardware vendor prefixes within a single chain is never valid.
mod filter_chain_pairing {
    const HW_DEVICE_PREFIXES: &[&str] = &["cuda", "vaapi", "qsv", "videotoolbox", "d3d11"];

    fn hw_device_of(filter: &str) -> Option<&'static str> {
        HW_DEVICE_PREFIXES.iter().find(|p| filter.contains(*p)).copied()
    }

    fn mixes_hardware_vendors(chain: &[&str]) -> bool {
        let mut seen = None;
        for stage in chain {
            if let Some(device) = hw_device_of(stage) {
                match seen {
                    None => seen = Some(device),
                    Some(prev) if prev != device => return true,
                    _ => {}
                }
            }
        }
        false
    }

    #[test]
    fn single_vendor_chain_does_not_mix() {
        let chain = ["scale_cuda=1280:720", "hwupload_cuda"];
        assert!(!mixes_hardware_vendors(&chain));
    }

    #[test]
    fn mixed_vendor_chain_is_detected() {
        let chain = ["scale_vaapi=1280:720", "hwupload_cuda"];
        assert!(mixes_hardware_vendors(&chain));
    }

    #[test]
    fn software_only_chain_does_not_mix() {
        let chain = ["scale=1280:720", "eq=contrast=1.1"];
        assert!(!mixes_hardware_vendors(&chain));
    }
}
