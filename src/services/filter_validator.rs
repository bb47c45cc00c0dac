//! Filter-chain Validator (§4.2).
//!
//! Pure-data validation of a proposed FFmpeg video filter graph against a decode/encode
//! context. Never fails hard: callers get a `FilterValidation` value back, not a `Result`,
//! since a failed validation is advisory input to the stream planner, not an error.

use serde::{Deserialize, Serialize};

use super::ffmpeg::{AccelKind, Capabilities};

/// Everything the validator needs to know about the surrounding decode/encode context.
#[derive(Debug, Clone)]
pub struct VideoFilterContext {
    pub source_codec: String,
    pub target_codec: String,
    pub source_width: u32,
    pub source_height: u32,
    pub target_width: u32,
    pub target_height: u32,
    pub is_hdr_source: bool,
    pub tone_map_target: bool,
    pub tone_map_enabled: bool,
    pub rotation: i32,
    pub is_interlaced: bool,
    pub has_subtitle_overlay: bool,
    pub is_hardware_decoder: bool,
    pub is_hardware_encoder: bool,
    pub accel: AccelKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterError {
    MissingHwdownload,
    MissingHwupload,
    MixedHardwareVendors,
    UnsupportedFilter(String),
    MissingToneMap,
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::MissingHwdownload => write!(f, "hwdownload must precede software filters after a hardware decoder"),
            FilterError::MissingHwupload => write!(f, "hwupload must precede a hardware encoder"),
            FilterError::MixedHardwareVendors => write!(f, "filter chain mixes hardware device types"),
            FilterError::UnsupportedFilter(name) => write!(f, "filter '{name}' is not supported by this FFmpeg build"),
            FilterError::MissingToneMap => write!(f, "HDR source with a non-HDR target requires a tone-map filter"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterValidation {
    pub errors: Vec<FilterError>,
    pub requires_software_fallback: bool,
}

impl FilterValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Hardware device prefixes recognized in filter names, used to detect a mixed-vendor chain.
const HW_DEVICE_PREFIXES: &[&str] = &["cuda", "vaapi", "qsv", "videotoolbox", "d3d11"];

fn hw_device_of(filter: &str) -> Option<&'static str> {
    HW_DEVICE_PREFIXES.iter().find(|p| filter.contains(*p)).copied()
}

/// Validate `filter_chain` (a comma-separated FFmpeg filter graph string, filter names only —
/// e.g. `"hwdownload,scale=1280:720,hwupload_cuda"`) against `ctx` and `caps`.
pub fn validate(filter_chain: &str, ctx: &VideoFilterContext, caps: &Capabilities) -> FilterValidation {
    let filters: Vec<&str> = filter_chain
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();

    let mut errors = Vec::new();
    let mut requires_software_fallback = false;

    if ctx.is_hardware_decoder {
        let first_is_download = filters.first().map(|f| f.starts_with("hwdownload")).unwrap_or(false);
        let chain_touches_software = filters.iter().any(|f| !f.starts_with("hw"));
        if chain_touches_software && !first_is_download {
            errors.push(FilterError::MissingHwdownload);
        }
    }

    if ctx.is_hardware_encoder {
        let last_is_upload = filters.last().map(|f| f.starts_with("hwupload")).unwrap_or(false);
        if !last_is_upload {
            errors.push(FilterError::MissingHwupload);
        }
    }

    let devices: Vec<&str> = filters.iter().filter_map(|f| hw_device_of(f)).collect();
    if devices.iter().collect::<std::collections::HashSet<_>>().len() > 1 {
        errors.push(FilterError::MixedHardwareVendors);
    }

    for filter in &filters {
        let name = filter.split('=').next().unwrap_or(filter);
        if name.starts_with("hw") {
            continue;
        }
        if !caps.supports_filter(name) {
            errors.push(FilterError::UnsupportedFilter(name.to_string()));
            requires_software_fallback = true;
        }
    }

    let needs_tone_map = ctx.is_hdr_source && !ctx.tone_map_target && ctx.tone_map_enabled;
    if needs_tone_map && !filters.iter().any(|f| f.starts_with("tonemap") || f.starts_with("zscale")) {
        errors.push(FilterError::MissingToneMap);
    }

    FilterValidation {
        errors,
        requires_software_fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ctx() -> VideoFilterContext {
        VideoFilterContext {
            source_codec: "hevc".into(),
            target_codec: "h264".into(),
            source_width: 3840,
            source_height: 2160,
            target_width: 1920,
            target_height: 1080,
            is_hdr_source: false,
            tone_map_target: false,
            tone_map_enabled: true,
            rotation: 0,
            is_interlaced: false,
            has_subtitle_overlay: false,
            is_hardware_decoder: false,
            is_hardware_encoder: false,
            accel: AccelKind::None,
        }
    }

    fn caps_with(filters: &[&str]) -> Capabilities {
        Capabilities {
            version: "test".into(),
            encoders: HashSet::new(),
            decoders: HashSet::new(),
            filters: filters.iter().map(|s| s.to_string()).collect(),
            hwaccels: HashSet::new(),
            recommended_accel: AccelKind::None,
        }
    }

    #[test]
    fn requires_hwdownload_after_hardware_decoder() {
        let mut c = ctx();
        c.is_hardware_decoder = true;
        let caps = caps_with(&["scale"]);
        let v = validate("scale=1280:720", &c, &caps);
        assert!(v.errors.contains(&FilterError::MissingHwdownload));
    }

    #[test]
    fn hwdownload_first_satisfies_decoder_requirement() {
        let mut c = ctx();
        c.is_hardware_decoder = true;
        let caps = caps_with(&["scale"]);
        let v = validate("hwdownload,scale=1280:720", &c, &caps);
        assert!(!v.errors.contains(&FilterError::MissingHwdownload));
    }

    #[test]
    fn requires_hwupload_before_hardware_encoder() {
        let mut c = ctx();
        c.is_hardware_encoder = true;
        let caps = caps_with(&["scale"]);
        let v = validate("scale=1280:720", &c, &caps);
        assert!(v.errors.contains(&FilterError::MissingHwupload));
    }

    #[test]
    fn unsupported_filter_requires_software_fallback() {
        let caps = caps_with(&["scale"]);
        let v = validate("nonexistent_filter", &ctx(), &caps);
        assert!(v.requires_software_fallback);
        assert!(matches!(v.errors[0], FilterError::UnsupportedFilter(_)));
    }

    #[test]
    fn mixed_hardware_vendors_flagged() {
        let caps = caps_with(&["scale_cuda", "scale_vaapi"]);
        let v = validate("scale_cuda,scale_vaapi", &ctx(), &caps);
        assert!(v.errors.contains(&FilterError::MixedHardwareVendors));
    }

    #[test]
    fn tone_map_required_for_hdr_to_sdr() {
        let mut c = ctx();
        c.is_hdr_source = true;
        let caps = caps_with(&["scale"]);
        let v = validate("scale=1280:720", &c, &caps);
        assert!(v.errors.contains(&FilterError::MissingToneMap));
    }

    #[test]
    fn tone_map_present_satisfies_requirement() {
        let mut c = ctx();
        c.is_hdr_source = true;
        let caps = caps_with(&["scale", "tonemap"]);
        let v = validate("tonemap,scale=1280:720", &c, &caps);
        assert!(!v.errors.contains(&FilterError::MissingToneMap));
    }

    #[test]
    fn valid_chain_has_no_errors() {
        let caps = caps_with(&["scale"]);
        let v = validate("scale=1280:720", &ctx(), &caps);
        assert!(v.is_valid());
    }
}
