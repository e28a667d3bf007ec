use crate::config::FitConfig;
use crate::probe::SourceMedia;
use crate::util::byte_size::{BITS_PER_BYTE, KIB};

/// Resolution and bitrate of a single encode attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EncodeTarget {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) bitrate_kbps: u32,
}

impl EncodeTarget {
    pub(crate) fn with_bitrate(self, bitrate_kbps: u32) -> Self {
        Self {
            bitrate_kbps,
            ..self
        }
    }
}

/// Compute the initial encode target for the given source clip.
///
/// The duration of the source must be positive, which is guaranteed by the prober.
pub(crate) fn compute(media: &SourceMedia, config: &FitConfig, safety_factor: f64) -> EncodeTarget {
    let (width, height) = scale_to_target(media.width, media.height, config.target_dimension);

    EncodeTarget {
        width,
        height,
        bitrate_kbps: initial_bitrate_kbps(media.duration_secs, config, safety_factor),
    }
}

/// Scale the longer edge to exactly `target` pixels keeping the aspect ratio.
/// Both edges are rounded down to even numbers, because `yuva420p` subsamples
/// chroma in 2x2 blocks.
fn scale_to_target(width: u32, height: u32, target: u32) -> (u32, u32) {
    let scale = |short: u32, long: u32| {
        let scaled = u64::from(target) * u64::from(short) / u64::from(long);
        // The value can't exceed `target`, because `short <= long`
        scaled as u32
    };

    let (width, height) = if width >= height {
        (target, scale(height, width))
    } else {
        (scale(width, height), target)
    };

    (round_down_to_even(width), round_down_to_even(height))
}

/// Extremely narrow sources would otherwise collapse into a zero-sized edge
fn round_down_to_even(value: u32) -> u32 {
    (value - value % 2).max(2)
}

fn initial_bitrate_kbps(duration_secs: f64, config: &FitConfig, safety_factor: f64) -> u32 {
    debug_assert!(duration_secs > 0.0, "BUG: non-positive duration {duration_secs}");

    let budget_bits = (config.max_size_kib * KIB * BITS_PER_BYTE) as f64;
    let bits_per_sec = budget_bits * safety_factor / duration_secs;

    // Float to int `as` conversion saturates, so very short clips can't overflow
    clamp_to_floor((bits_per_sec / 1000.0).floor() as u32, config)
}

/// Lower the bitrate after an oversized attempt. The result never goes below
/// the configured floor.
pub(crate) fn reduce_bitrate(bitrate_kbps: u32, config: &FitConfig) -> u32 {
    let reduced = (f64::from(bitrate_kbps) * config.reduction_ratio).floor() as u32;
    clamp_to_floor(reduced, config)
}

fn clamp_to_floor(bitrate_kbps: u32, config: &FitConfig) -> u32 {
    bitrate_kbps.max(config.bitrate_floor_kbps)
}
