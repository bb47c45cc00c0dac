//! ABR ladder generator (§4.10): a pure function over a fixed resolution×bitrate rung catalog,
//! called by the playback orchestrator (§4.8) when a stream plan resolves to Transcode.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rung {
    pub height: u32,
    pub bitrate_bps: u64,
}

const fn rung(height: u32, bitrate_bps: u64) -> Rung {
    Rung { height, bitrate_bps }
}

/// Fixed catalog, ascending by both resolution and bitrate — §4.10 names these exact pairs.
const CATALOG: &[Rung] = &[
    rung(240, 400_000),
    rung(360, 700_000),
    rung(480, 1_200_000),
    rung(720, 2_500_000),
    rung(1080, 5_000_000),
    rung(1440, 10_000_000),
    rung(2160, 20_000_000),
];

/// Builds the ladder for a source of `(src_height, src_bitrate_bps)` capped at
/// `max_allowed_bitrate_bps`. Never upscales past `src_height`; never exceeds the bitrate cap,
/// except in the documented corner case where every catalog rung is filtered out — then the
/// lowest-bitrate rung that fits the cap is returned even if its resolution exceeds the source,
/// so the ladder is never empty.
pub fn build_ladder(
    src_height: u32,
    src_bitrate_bps: Option<u64>,
    max_allowed_bitrate_bps: u64,
    include_source: bool,
) -> Vec<Rung> {
    let mut ladder: Vec<Rung> = CATALOG
        .iter()
        .copied()
        .filter(|r| r.height <= src_height && r.bitrate_bps <= max_allowed_bitrate_bps)
        .collect();

    if include_source {
        if let Some(src_bitrate_bps) = src_bitrate_bps {
            let source_rung = rung(src_height, src_bitrate_bps);
            if !ladder.iter().any(|r| *r == source_rung) {
                ladder.push(source_rung);
            }
        }
    }

    ladder.sort_by_key(|r| r.bitrate_bps);
    ladder.dedup();

    if ladder.is_empty() {
        if let Some(lowest_fitting) = CATALOG.iter().filter(|r| r.bitrate_bps <= max_allowed_bitrate_bps).min_by_key(|r| r.bitrate_bps) {
            return vec![*lowest_fitting];
        }
        // Nothing in the catalog fits the cap at all — fall back to the cheapest rung so the
        // ladder is never empty, per §4.10's "return at least one rung" invariant.
        if let Some(cheapest) = CATALOG.iter().min_by_key(|r| r.bitrate_bps) {
            return vec![*cheapest];
        }
    }

    ladder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_upscales_past_source_height() {
        let ladder = build_ladder(480, Some(1_000_000), 20_000_000, false);
        assert!(ladder.iter().all(|r| r.height <= 480));
    }

    #[test]
    fn respects_bitrate_cap() {
        let ladder = build_ladder(2160, Some(20_000_000), 3_000_000, false);
        assert!(ladder.iter().all(|r| r.bitrate_bps <= 3_000_000));
        assert!(ladder.iter().any(|r| r.height == 720));
    }

    #[test]
    fn includes_source_rung_when_requested_and_not_already_present() {
        let ladder = build_ladder(1080, Some(6_500_000), 20_000_000, true);
        assert!(ladder.iter().any(|r| r.height == 1080 && r.bitrate_bps == 6_500_000));
        // stays sorted ascending by bitrate
        assert!(ladder.windows(2).all(|w| w[0].bitrate_bps <= w[1].bitrate_bps));
    }

    #[test]
    fn falls_back_to_lowest_fitting_rung_when_all_filtered() {
        // src_height of 100 filters out every catalog rung (all taller); cap is generous.
        let ladder = build_ladder(100, None, 20_000_000, false);
        assert_eq!(ladder.len(), 1);
        assert_eq!(ladder[0].height, 240);
    }

    #[test]
    fn never_returns_empty_even_under_an_impossible_cap() {
        let ladder = build_ladder(2160, None, 1, false);
        assert_eq!(ladder.len(), 1);
    }
}
