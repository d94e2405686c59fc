//! Named quality presets.

use serde::{Deserialize, Serialize};

/// Fixed parameter tuples for a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PresetParams {
    pub width: u32,
    pub height: u32,
    pub min_bitrate: u32,
    pub initial_bitrate: u32,
    pub max_bitrate: u32,
    pub framerate: u32,
    pub keyframe_interval_secs: u32,
}

/// A named bundle of encoder parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityPreset {
    /// 640x360, 0.5-1 Mbps.
    P360,

    /// 1280x720, 1.5-3.5 Mbps.
    P720,

    /// 1920x1080, 4-6 Mbps.
    P1080,

    /// 1920x1080 with the widest bitrate window.
    #[default]
    Default,
}

impl QualityPreset {
    /// Resolve a preset name. Unrecognized names select `Default` so that
    /// callers passing unexpected strings keep working.
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        let name = name
            .strip_suffix('p')
            .or_else(|| name.strip_suffix('P'))
            .unwrap_or(name);

        match name {
            "360" => Self::P360,
            "720" => Self::P720,
            "1080" => Self::P1080,
            _ => Self::Default,
        }
    }

    /// Returns the display name for this preset.
    pub fn name(self) -> &'static str {
        match self {
            Self::P360 => "360p",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::Default => "default",
        }
    }

    pub(crate) fn params(self) -> PresetParams {
        match self {
            Self::P360 => PresetParams {
                width: 640,
                height: 360,
                min_bitrate: 500_000,
                initial_bitrate: 800_000,
                max_bitrate: 1_000_000,
                framerate: 30,
                keyframe_interval_secs: 2,
            },
            Self::P720 => PresetParams {
                width: 1280,
                height: 720,
                min_bitrate: 1_500_000,
                initial_bitrate: 2_500_000,
                max_bitrate: 3_500_000,
                framerate: 30,
                keyframe_interval_secs: 2,
            },
            Self::P1080 => PresetParams {
                width: 1920,
                height: 1080,
                min_bitrate: 4_000_000,
                initial_bitrate: 5_000_000,
                max_bitrate: 6_000_000,
                framerate: 30,
                keyframe_interval_secs: 2,
            },
            Self::Default => PresetParams {
                width: 1920,
                height: 1080,
                min_bitrate: 1_500_000,
                initial_bitrate: 2_500_000,
                max_bitrate: 8_500_000,
                framerate: 30,
                keyframe_interval_secs: 2,
            },
        }
    }
}
