use crate::display;
use crate::error::Error;
use crate::ffmpeg::Ffmpeg;
use crate::prelude::*;
use crate::target::EncodeTarget;
use async_trait::async_trait;
use buildstructor::buildstructor;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// The name ffmpeg uses for pass log files by default. It's passed explicitly
/// to make the cleanup independent of the ffmpeg version.
const PASS_LOG_PREFIX: &str = "ffmpeg2pass";

/// Pass 2 writes here first, the file is moved to the real output only
/// after ffmpeg exits successfully
const STAGED_OUTPUT_NAME: &str = "output.webm";

/// Produces the output file for the given encode target. This is the only
/// feedback signal of the fitting loop.
#[async_trait]
pub(crate) trait Encoder: fmt::Debug + Send + Sync {
    /// Encode the output and return its size in bytes
    async fn encode(&self, target: &EncodeTarget) -> Result<u64, Error>;
}

/// Runs ffmpeg with two passes using VP9 encoding for webm with alpha channel
#[derive(Debug)]
pub(crate) struct TwoPassEncoder {
    input: Utf8PathBuf,
    output: Utf8PathBuf,
    ffmpeg: Arc<dyn Ffmpeg>,
    /// Working directory of the encoder where the pass log files and the
    /// staged output are written
    work_dir: tempfile::TempDir,
}

#[buildstructor]
impl TwoPassEncoder {
    #[builder]
    pub(crate) fn new(
        input: Utf8PathBuf,
        output: Utf8PathBuf,
        ffmpeg: Arc<dyn Ffmpeg>,
        work_dir: Option<tempfile::TempDir>,
    ) -> Result<Self> {
        let work_dir = match work_dir {
            Some(dir) => dir,
            None => tempfile::tempdir().context("Failed to create a working directory for the encoder")?,
        };

        Ok(Self {
            input,
            output,
            ffmpeg,
            work_dir,
        })
    }
}

impl TwoPassEncoder {
    fn work_dir(&self) -> &Utf8Path {
        self.work_dir.path().unwrap_utf8()
    }

    fn make_args(&self, target: &EncodeTarget, pass: u8, trailing_args: &[&str]) -> Vec<String> {
        let pass_log_file = self.work_dir().join(PASS_LOG_PREFIX);
        let bitrate = format!("{}k", target.bitrate_kbps);
        let scale = format!("scale={}:{}", target.width, target.height);
        let pass = pass.to_string();

        #[rustfmt::skip]
        let args = [
            "-y",
            "-i", self.input.as_str(),
            "-c:v", "libvpx-vp9",

            // Stickers are displayed over arbitrary chat backgrounds,
            // so transparency must be preserved
            "-pix_fmt", "yuva420p",

            "-b:v", bitrate.as_str(),
            "-vf", scale.as_str(),

            // Audio and metadata only waste the byte budget
            "-an",
            "-map_metadata", "-1",

            "-passlogfile", pass_log_file.as_str(),
            "-pass", pass.as_str(),
        ];

        args.into_iter()
            .chain(trailing_args.iter().copied())
            .map(ToOwned::to_owned)
            .collect()
    }
}

#[async_trait]
impl Encoder for TwoPassEncoder {
    async fn encode(&self, target: &EncodeTarget) -> Result<u64, Error> {
        let start = Instant::now();

        let null_output = if cfg!(windows) { "NUL" } else { "/dev/null" };

        // First pass only collects the statistics into the pass log
        self.ffmpeg
            .run(self.make_args(target, 1, &["-f", "null", null_output]))
            .await
            .map_err(|source| Error::Encode {
                pass: 1,
                source: source.into(),
            })?;

        // Second pass
        let staged_output = self.work_dir().join(STAGED_OUTPUT_NAME);

        let size = self
            .ffmpeg
            .run_with_output_file(self.make_args(target, 2, &[]), &staged_output)
            .await
            .map_err(|source| Error::Encode {
                pass: 2,
                source: source.into(),
            })?;

        publish_output(&staged_output, &self.output)
            .await
            .map_err(|source| Error::Encode {
                pass: 2,
                source: source.into(),
            })?;

        remove_pass_logs(self.work_dir()).await;

        debug!(
            size = %display::human_size(size),
            elapsed = %display::elapsed(start),
            "Two-pass encode finished"
        );

        Ok(size)
    }
}

/// Move the complete output file to its destination replacing the output
/// of the previous attempt, if any.
async fn publish_output(staged: &Utf8Path, output: &Utf8Path) -> Result {
    if fs::rename(staged, output).await.is_ok() {
        return Ok(());
    }

    // The temp dir may be on a different device than the output
    fs::copy(staged, output)
        .await
        .with_context(|| format!("Failed to save the encoded output to `{output}`"))?;

    if let Err(err) = fs::remove_file(staged).await {
        warn!("{err}");
    }

    Ok(())
}

/// Best-effort removal of the pass log files. Leftover logs are not worth
/// failing the encode, they are also removed with the temp dir eventually.
async fn remove_pass_logs(dir: &Utf8Path) {
    if let Err(err) = try_remove_pass_logs(dir).await {
        warn!("Failed to clean up pass logs in `{dir}`: {err:#}");
    }
}

async fn try_remove_pass_logs(dir: &Utf8Path) -> Result {
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !is_pass_log(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let path = entry.path();

        match fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Removed pass log"),
            Err(err) => warn!("{err}"),
        }
    }

    Ok(())
}

/// Matches `ffmpeg2pass-0.log` written by libvpx, and also `ffmpeg2pass-0.log.mbtree`
/// or `ffmpeg2pass-0.log.temp` written by other encoders
fn is_pass_log(file_name: &str) -> bool {
    file_name.starts_with(PASS_LOG_PREFIX) && file_name.contains(".log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFfmpeg;
    use expect_test::expect;
    use itertools::Itertools;
    use lazy_regex::regex_replace;

    fn target() -> EncodeTarget {
        EncodeTarget {
            width: 512,
            height: 288,
            bitrate_kbps: 314,
        }
    }

    fn encoder(
        ffmpeg: &Arc<MockFfmpeg>,
        output: &Utf8Path,
        work_dir: Option<tempfile::TempDir>,
    ) -> TwoPassEncoder {
        let ffmpeg: Arc<dyn Ffmpeg> = ffmpeg.clone();

        TwoPassEncoder::builder()
            .input(Utf8PathBuf::from("clip.mp4"))
            .output(output.to_owned())
            .ffmpeg(ffmpeg)
            .and_work_dir(work_dir)
            .build()
            .unwrap()
    }

    fn file_names(dir: &Utf8Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .sorted()
            .collect()
    }

    fn render_call(args: &[String]) -> String {
        // Sanitize the random temp directory path
        args.iter()
            .map(|arg| {
                regex_replace!(r".*\.tmp\w*(?:(?:\W)(.*))?", arg, |_, rest| format!(
                    "{{temp_dir}}/{rest}"
                ))
                .into_owned()
            })
            .join(" ")
    }

    #[test_log::test(tokio::test)]
    async fn smoke_two_pass_calls() {
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().unwrap_utf8().join("clip_sticker.webm");
        let ffmpeg = MockFfmpeg::new(200 * 1024);

        let size = encoder(&ffmpeg, &output, None)
            .encode(&target())
            .await
            .unwrap();

        assert_eq!(size, 200 * 1024);
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 200 * 1024);

        let calls = ffmpeg.args_log().iter().map(|args| render_call(args)).join("\n");

        expect![[r#"
            -y -i clip.mp4 -c:v libvpx-vp9 -pix_fmt yuva420p -b:v 314k -vf scale=512:288 -an -map_metadata -1 -passlogfile {temp_dir}/ffmpeg2pass -pass 1 -f null /dev/null
            -y -i clip.mp4 -c:v libvpx-vp9 -pix_fmt yuva420p -b:v 314k -vf scale=512:288 -an -map_metadata -1 -passlogfile {temp_dir}/ffmpeg2pass -pass 2 {temp_dir}/output.webm"#]]
        .assert_eq(&calls);
    }

    #[test_log::test(tokio::test)]
    async fn pass_logs_are_removed() {
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().unwrap_utf8().join("clip_sticker.webm");

        let work_dir = tempfile::tempdir().unwrap();
        let root = work_dir.path().unwrap_utf8().to_owned();

        for file in ["ffmpeg2pass-0.log", "ffmpeg2pass-0.log.mbtree", "notes.txt"] {
            std::fs::write(root.join(file), "stats").unwrap();
        }

        let ffmpeg = MockFfmpeg::new(1024);

        // The encoder owns the working dir, so it must outlive the assertions
        let encoder = encoder(&ffmpeg, &output, Some(work_dir));
        encoder.encode(&target()).await.unwrap();

        assert_eq!(file_names(&root), ["notes.txt"]);
        assert_eq!(file_names(output.parent().unwrap()), ["clip_sticker.webm"]);
    }

    #[test_log::test(tokio::test)]
    async fn first_pass_failure_skips_second_pass() {
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().unwrap_utf8().join("clip_sticker.webm");
        let ffmpeg = MockFfmpeg::failing_on_pass(1);

        let err = encoder(&ffmpeg, &output, None)
            .encode(&target())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Encode { pass: 1, .. }), "{err:?}");
        assert_eq!(ffmpeg.args_log().len(), 1);
        assert!(!output.exists());
    }

    #[test_log::test(tokio::test)]
    async fn failed_second_pass_leaves_no_output() {
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().unwrap_utf8().join("clip_sticker.webm");
        let ffmpeg = MockFfmpeg::failing_on_pass(2);

        let err = encoder(&ffmpeg, &output, None)
            .encode(&target())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Encode { pass: 2, .. }), "{err:?}");
        assert_eq!(err.to_string(), "Encoder failed during pass 2");
        assert_eq!(ffmpeg.args_log().len(), 2);
        assert!(!output.exists(), "partial output was written to {output}");
    }

    #[test_log::test(tokio::test)]
    async fn failed_second_pass_keeps_previous_output() {
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().unwrap_utf8().join("clip_sticker.webm");

        std::fs::write(&output, "previous attempt").unwrap();

        let ffmpeg = MockFfmpeg::failing_on_pass(2);

        encoder(&ffmpeg, &output, None)
            .encode(&target())
            .await
            .unwrap_err();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "previous attempt");
    }

    #[test_log::test(tokio::test)]
    async fn output_of_the_previous_attempt_is_replaced() {
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().unwrap_utf8().join("clip_sticker.webm");

        std::fs::write(&output, "previous attempt").unwrap();

        let ffmpeg = MockFfmpeg::new(100);

        encoder(&ffmpeg, &output, None)
            .encode(&target())
            .await
            .unwrap();

        assert_eq!(std::fs::metadata(&output).unwrap().len(), 100);
    }

    #[test]
    fn pass_log_names() {
        assert!(is_pass_log("ffmpeg2pass-0.log"));
        assert!(is_pass_log("ffmpeg2pass-0.log.mbtree"));
        assert!(!is_pass_log("ffmpeg2pass"));
        assert!(!is_pass_log("clip.log"));
        assert!(!is_pass_log(STAGED_OUTPUT_NAME));
    }
}
