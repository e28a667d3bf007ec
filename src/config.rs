use crate::prelude::*;
use crate::util::byte_size::KIB;

/// Upload limit for video stickers
const MAX_SIZE_KIB: u64 = 256;

/// Length of the longer side of the sticker
const TARGET_DIMENSION: u32 = 512;

/// Encoders commonly overshoot the nominal bitrate, so the initial target
/// only spends this fraction of the byte budget.
const SAFETY_FACTOR: f64 = 0.75;

const REDUCTION_RATIO: f64 = 0.80;

const BITRATE_FLOOR_KBPS: u32 = 10;

const MAX_ATTEMPTS: u32 = 3;

/// Appended to the input file stem to get the default output file name
pub(crate) const OUTPUT_SUFFIX: &str = "_sticker.webm";

/// Parameters of the bitrate fitting loop. The [`Default`] value describes
/// a sticker that is accepted by messengers with a 256 KiB upload limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FitConfig {
    /// Byte budget of the output file in KiB
    pub(crate) max_size_kib: u64,

    /// The longer edge of the output is scaled to exactly this many pixels.
    /// Must be even.
    pub(crate) target_dimension: u32,

    /// Fraction of the byte budget in `(0, 1]` used to seed the bitrate
    pub(crate) safety_factor: f64,

    /// Multiplier in `(0, 1)` applied to the bitrate after an oversized attempt
    pub(crate) reduction_ratio: f64,

    pub(crate) bitrate_floor_kbps: u32,

    pub(crate) max_attempts: u32,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_size_kib: MAX_SIZE_KIB,
            target_dimension: TARGET_DIMENSION,
            safety_factor: SAFETY_FACTOR,
            reduction_ratio: REDUCTION_RATIO,
            bitrate_floor_kbps: BITRATE_FLOOR_KBPS,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl FitConfig {
    pub(crate) fn max_bytes(&self) -> u64 {
        self.max_size_kib * KIB
    }

    pub(crate) fn validate(&self) -> Result {
        ensure!(self.max_size_kib > 0, "Size budget must be positive");

        ensure!(
            self.target_dimension >= 2 && self.target_dimension % 2 == 0,
            "Target dimension must be a positive even number, but got {}",
            self.target_dimension,
        );

        ensure!(
            self.safety_factor > 0.0 && self.safety_factor <= 1.0,
            "Safety factor must be in range (0, 1], but got {}",
            self.safety_factor,
        );

        ensure!(
            self.reduction_ratio > 0.0 && self.reduction_ratio < 1.0,
            "Bitrate reduction ratio must be in range (0, 1), but got {}",
            self.reduction_ratio,
        );

        ensure!(self.bitrate_floor_kbps > 0, "Bitrate floor must be positive");
        ensure!(self.max_attempts > 0, "At least one encode attempt is required");

        Ok(())
    }
}
