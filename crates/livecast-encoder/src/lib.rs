//! Quality presets and encoder configuration.
//!
//! This crate maps a quality preset, optionally adjusted by caller
//! overrides, to the concrete configuration handed to the media engine.
//! Building a configuration is a pure function of its inputs.

mod error;
mod preset;

pub use error::EncoderError;
pub use preset::QualityPreset;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Audio bitrate shared by every preset, in bits per second.
pub const AUDIO_BITRATE: u32 = 128_000;

/// Smallest and largest frame edge the engine accepts.
pub const MIN_DIMENSION: u32 = 160;
pub const MAX_DIMENSION: u32 = 1920;

/// Largest frame area the engine accepts (1920x1080).
pub const MAX_PIXELS: u32 = 2_073_600;

/// Video bitrate bounds in bits per second.
pub const MIN_VIDEO_BITRATE: u32 = 100_000;
pub const MAX_VIDEO_BITRATE: u32 = 8_500_000;

/// Framerate bounds.
pub const MIN_FRAMERATE: u32 = 10;
pub const MAX_FRAMERATE: u32 = 60;

/// Keyframe interval bounds in seconds.
pub const MIN_KEYFRAME_INTERVAL: u32 = 1;
pub const MAX_KEYFRAME_INTERVAL: u32 = 5;

/// Audio bitrate bounds in bits per second.
pub const MIN_AUDIO_BITRATE: u32 = 64_000;
pub const MAX_AUDIO_BITRATE: u32 = 160_000;

/// Encoder configuration for one session. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Width in pixels.
    pub video_width: u32,

    /// Height in pixels.
    pub video_height: u32,

    /// Upper bound for adaptive bitrate, in bps.
    pub max_bitrate: u32,

    /// Lower bound for adaptive bitrate, in bps.
    pub min_bitrate: u32,

    /// Bitrate at stream start, in bps.
    pub initial_bitrate: u32,

    /// Target frames per second.
    pub target_framerate: u32,

    /// Keyframe interval in seconds.
    pub keyframe_interval_secs: u32,

    /// Audio bitrate in bps.
    pub audio_bitrate: u32,

    /// Whether the media engine may reconnect on its own.
    pub auto_reconnect: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        from_preset(QualityPreset::Default)
    }
}

/// Caller adjustments applied on top of a preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderOverrides {
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    pub max_bitrate: Option<u32>,
    pub min_bitrate: Option<u32>,
    pub initial_bitrate: Option<u32>,
    pub target_framerate: Option<u32>,
    pub keyframe_interval_secs: Option<u32>,
    pub audio_bitrate: Option<u32>,
    pub auto_reconnect: Option<bool>,
}

/// Build the encoder configuration for a preset.
///
/// Without overrides this cannot fail. Overridden values are validated
/// against the ranges the media engine accepts.
pub fn build(
    preset: QualityPreset,
    overrides: Option<&EncoderOverrides>,
) -> EncoderResult<EncoderConfig> {
    let mut config = from_preset(preset);

    if let Some(overrides) = overrides {
        apply(&mut config, overrides);
        validate(&config)?;
    }

    debug!(
        preset = preset.name(),
        width = config.video_width,
        height = config.video_height,
        max_bitrate = config.max_bitrate,
        "Encoder configuration built"
    );

    Ok(config)
}

/// Build from a preset name, falling back to the default preset for
/// unrecognized names.
pub fn build_named(
    quality: &str,
    overrides: Option<&EncoderOverrides>,
) -> EncoderResult<EncoderConfig> {
    build(QualityPreset::parse(quality), overrides)
}

fn from_preset(preset: QualityPreset) -> EncoderConfig {
    let params = preset.params();
    EncoderConfig {
        video_width: params.width,
        video_height: params.height,
        max_bitrate: params.max_bitrate,
        min_bitrate: params.min_bitrate,
        initial_bitrate: params.initial_bitrate,
        target_framerate: params.framerate,
        keyframe_interval_secs: params.keyframe_interval_secs,
        audio_bitrate: AUDIO_BITRATE,
        auto_reconnect: false,
    }
}

fn apply(config: &mut EncoderConfig, overrides: &EncoderOverrides) {
    let EncoderOverrides {
        video_width,
        video_height,
        max_bitrate,
        min_bitrate,
        initial_bitrate,
        target_framerate,
        keyframe_interval_secs,
        audio_bitrate,
        auto_reconnect,
    } = *overrides;

    if let Some(value) = video_width {
        config.video_width = value;
    }
    if let Some(value) = video_height {
        config.video_height = value;
    }
    if let Some(value) = max_bitrate {
        config.max_bitrate = value;
    }
    if let Some(value) = min_bitrate {
        config.min_bitrate = value;
    }
    if let Some(value) = initial_bitrate {
        config.initial_bitrate = value;
    }
    if let Some(value) = target_framerate {
        config.target_framerate = value;
    }
    if let Some(value) = keyframe_interval_secs {
        config.keyframe_interval_secs = value;
    }
    if let Some(value) = audio_bitrate {
        config.audio_bitrate = value;
    }
    if let Some(value) = auto_reconnect {
        config.auto_reconnect = value;
    }
}

/// Check a configuration against the media engine's accepted ranges.
pub fn validate(config: &EncoderConfig) -> EncoderResult<()> {
    check_range(
        "video_width",
        config.video_width,
        MIN_DIMENSION,
        MAX_DIMENSION,
    )?;
    check_range(
        "video_height",
        config.video_height,
        MIN_DIMENSION,
        MAX_DIMENSION,
    )?;

    let pixels = config.video_width * config.video_height;
    if pixels > MAX_PIXELS {
        return Err(EncoderError::invalid(
            "resolution",
            format!(
                "{}x{} exceeds {} pixels",
                config.video_width, config.video_height, MAX_PIXELS
            ),
        ));
    }

    for (field, value) in [
        ("min_bitrate", config.min_bitrate),
        ("initial_bitrate", config.initial_bitrate),
        ("max_bitrate", config.max_bitrate),
    ] {
        check_range(field, value, MIN_VIDEO_BITRATE, MAX_VIDEO_BITRATE)?;
    }

    if config.min_bitrate > config.initial_bitrate {
        return Err(EncoderError::invalid(
            "min_bitrate",
            "must not exceed initial_bitrate",
        ));
    }
    if config.initial_bitrate > config.max_bitrate {
        return Err(EncoderError::invalid(
            "initial_bitrate",
            "must not exceed max_bitrate",
        ));
    }

    check_range(
        "target_framerate",
        config.target_framerate,
        MIN_FRAMERATE,
        MAX_FRAMERATE,
    )?;
    check_range(
        "keyframe_interval_secs",
        config.keyframe_interval_secs,
        MIN_KEYFRAME_INTERVAL,
        MAX_KEYFRAME_INTERVAL,
    )?;
    check_range(
        "audio_bitrate",
        config.audio_bitrate,
        MIN_AUDIO_BITRATE,
        MAX_AUDIO_BITRATE,
    )?;

    Ok(())
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> EncoderResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(EncoderError::invalid(
            field,
            format!("{value} is outside {min}..={max}"),
        ))
    }
}
