use crate::config::{FitConfig, OUTPUT_SUFFIX};
use crate::display;
use crate::encode::{Encoder, TwoPassEncoder};
use crate::ffmpeg::{Ffmpeg, FfmpegProcess};
use crate::fit::{FitLoop, FitOutcome};
use crate::prelude::*;
use crate::probe::{FfprobeProber, Prober};
use crate::tool::{self, SystemToolResolver, Tool};
use crate::util::input::{read_line, unquote_path};
use crate::util::path::Utf8StemmedPathBuf;
use async_trait::async_trait;
use clap::Parser;
use std::sync::Arc;

/// Generates a webm sticker from the input video with a two-pass VP9 encode.
///
/// The bitrate is derived from the duration of the input so that the output
/// fits into 256 KiB. If the encoder overshoots, the bitrate is lowered and
/// the video is encoded again, up to 3 attempts in total.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Fit {
    /// Path to the input video file. If omitted, it will be asked for
    /// interactively.
    input: Option<Utf8PathBuf>,

    /// Path to the output. By default, the output will be put into the same
    /// directory as the input under the name `{input name}_sticker.webm`.
    #[clap(long, short)]
    output: Option<Utf8PathBuf>,
}

#[async_trait]
impl crate::cmd::Cmd for Fit {
    async fn run(self) -> Result {
        // Tools are resolved first to fail fast before asking for any input
        let resolver = SystemToolResolver::from_current_exe();
        let ffmpeg = tool::require(&resolver, Tool::Ffmpeg)?;
        let ffprobe = tool::require(&resolver, Tool::Ffprobe)?;

        let ffmpeg: Arc<dyn Ffmpeg> = Arc::new(FfmpegProcess::new(ffmpeg));
        let prober: Arc<dyn Prober> = Arc::new(FfprobeProber::new(ffprobe));

        self.run_with(prober, ffmpeg).await
    }
}

impl Fit {
    async fn run_with(self, prober: Arc<dyn Prober>, ffmpeg: Arc<dyn Ffmpeg>) -> Result {
        let input = match self.input {
            Some(input) => input,
            None => {
                let line = read_line("Enter path to the video file (drag & drop it here):").await?;
                Utf8PathBuf::from(unquote_path(&line))
            }
        };

        let is_file = fs::metadata(&input)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);

        if !is_file {
            bail!("Input file not found: `{input}`");
        }

        let input = Utf8StemmedPathBuf::try_from(input)?;

        let output = match self.output {
            Some(output) => output,
            None => default_output_path(&input)?,
        };

        ensure!(
            output.as_path() != input.as_path(),
            "The output path must differ from the input path `{output}`"
        );

        let config = FitConfig::default();

        let encoder = TwoPassEncoder::builder()
            .input(input.as_path().to_owned())
            .output(output.clone())
            .ffmpeg(ffmpeg)
            .build()?;

        let encoder: Arc<dyn Encoder> = Arc::new(encoder);

        let outcome = FitLoop::builder()
            .input(input.as_path().to_owned())
            .prober(prober)
            .encoder(encoder)
            .config(config)
            .build()?
            .run()
            .await?;

        report(&outcome, &output, &config);

        Ok(())
    }
}

fn report(outcome: &FitOutcome, output: &Utf8Path, config: &FitConfig) {
    let out_file = nu_ansi_term::Color::Magenta.bold().paint(output.as_str());
    let size = display::bold_human_size(outcome.last_attempt().size_bytes);

    match outcome {
        FitOutcome::Fits(_) => info!("🔥 Saved output ({size}) at {out_file}"),
        FitOutcome::Exhausted(result) => warn!(
            "Could not fit under {} even after {} attempts. \
            The output of the last attempt ({size}) is kept at {out_file}",
            display::bold_human_size(config.max_bytes()),
            result.attempt,
        ),
    }
}

fn default_output_path(input: &Utf8StemmedPathBuf) -> Result<Utf8PathBuf> {
    let input_path = input.as_path();

    let out_dir = input_path.parent().with_context(|| {
        format!("There is no parent directory for the input file {input_path}")
    })?;

    Ok(out_dir.join(format!("{}{OUTPUT_SUFFIX}", input.file_stem())))
}
