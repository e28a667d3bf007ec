use crate::config::FitConfig;
use crate::display;
use crate::encode::Encoder;
use crate::error::Error;
use crate::prelude::*;
use crate::probe::Prober;
use crate::target::{self, EncodeTarget};
use buildstructor::buildstructor;
use nu_ansi_term::Color;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttemptResult {
    /// 1-based number of the attempt
    pub(crate) attempt: u32,
    pub(crate) target: EncodeTarget,
    pub(crate) size_bytes: u64,
    pub(crate) fits: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FitOutcome {
    /// The output fits into the size budget
    Fits(AttemptResult),

    /// No attempts left, but the output still exceeds the size budget.
    /// The output of the last attempt is left on disk as the best effort.
    Exhausted(AttemptResult),
}

impl FitOutcome {
    pub(crate) fn last_attempt(&self) -> &AttemptResult {
        match self {
            Self::Fits(result) | Self::Exhausted(result) => result,
        }
    }
}

/// Searches for a bitrate that makes the output fit into the size budget.
///
/// The initial bitrate is derived from the duration of the source with the
/// assumption that `size ≈ bitrate × duration`. Encoders overshoot the nominal
/// bitrate, so when the output is still too big the bitrate is reduced
/// geometrically and the output is encoded again until it fits or the
/// attempts run out.
pub(crate) struct FitLoop {
    input: Utf8PathBuf,
    prober: Arc<dyn Prober>,
    encoder: Arc<dyn Encoder>,
    config: FitConfig,
}

#[buildstructor]
impl FitLoop {
    #[builder]
    pub(crate) fn new(
        input: Utf8PathBuf,
        prober: Arc<dyn Prober>,
        encoder: Arc<dyn Encoder>,
        config: Option<FitConfig>,
    ) -> Result<Self> {
        let config = config.unwrap_or_default();

        config.validate().context("Invalid fitting configuration")?;

        Ok(Self {
            input,
            prober,
            encoder,
            config,
        })
    }
}

impl FitLoop {
    #[instrument(name = "fit", skip_all, fields(input = %self.input))]
    pub(crate) async fn run(&self) -> Result<FitOutcome, Error> {
        let media = self.prober.probe(&self.input).await?;

        let target = target::compute(&media, &self.config, self.config.safety_factor);

        info!(
            "🎬 Source is {}x{} and lasts {:.2}s. Target is {}x{} at {} kbps",
            media.width,
            media.height,
            media.duration_secs,
            display::bold(&target.width),
            display::bold(&target.height),
            display::bold(&target.bitrate_kbps),
        );

        self.fit(target).await
    }

    async fn fit(&self, initial: EncodeTarget) -> Result<FitOutcome, Error> {
        let start = Instant::now();

        let max_bytes = self.config.max_bytes();
        let max_attempts = self.config.max_attempts;

        let max_bytes_display = &display::bold_human_size(max_bytes);

        info!("🚀 Trying to fit into {max_bytes_display} in at most {max_attempts} attempts");

        let mut target = initial;
        let mut attempt = 1;

        loop {
            let attempt_start = Instant::now();

            let size_bytes = self
                .encoder
                .encode(&target)
                .instrument(info_span!("attempt", n = attempt))
                .await?;

            let result = AttemptResult {
                attempt,
                target,
                size_bytes,
                fits: size_bytes <= max_bytes,
            };

            log_attempt(&result, max_attempts, attempt_start);

            if result.fits {
                let elapsed = display::elapsed(start);
                info!("🎉 The output fits into {max_bytes_display}, found in {elapsed}");
                return Ok(FitOutcome::Fits(result));
            }

            if attempt >= max_attempts {
                return Ok(FitOutcome::Exhausted(result));
            }

            let overshoot = display::bold_human_size(size_bytes - max_bytes);
            let bitrate_kbps = target::reduce_bitrate(target.bitrate_kbps, &self.config);

            info!(
                "Overshot the limit by {overshoot}. Retrying with lower bitrate of {} kbps",
                display::bold(&bitrate_kbps),
            );

            target = target.with_bitrate(bitrate_kbps);
            attempt += 1;
        }
    }
}

fn log_attempt(result: &AttemptResult, max_attempts: u32, start: Instant) {
    let (checkbox, color) = if result.fits {
        ('✅', Color::Green)
    } else {
        ('❌', Color::Red)
    };

    let size_display = color.bold().paint(display::human_size(result.size_bytes));
    let elapsed = display::elapsed(start);

    info!(
        "{checkbox} Attempt {}/{max_attempts} with {} kbps generated {size_display} in {elapsed}",
        result.attempt,
        display::bold(&result.target.bitrate_kbps),
    );
}
