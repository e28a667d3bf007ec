use crate::prelude::*;
use async_trait::async_trait;
use std::fmt;

#[async_trait]
pub(crate) trait Ffmpeg: fmt::Debug + Send + Sync {
    /// Invoke ffmpeg process with the given arguments.
    async fn run(&self, args: Vec<String>) -> Result<Vec<u8>>;

    /// Same as [`Self::run`], but automatically appends the output path to
    /// the arguments and returns the size of the file at that path in bytes.
    ///
    /// This is useful for mocking to avoid reading files from disk,
    /// especially when they aren't written by the mock.
    async fn run_with_output_file(&self, args: Vec<String>, output_file: &Utf8Path) -> Result<u64> {
        let mut args = args;
        args.push(output_file.to_string());

        self.run(args).await?;

        let metadata = fs::metadata(output_file).await?;

        Ok(metadata.len())
    }
}

#[derive(Debug)]
pub(crate) struct FfmpegProcess {
    program: Utf8PathBuf,
}

impl FfmpegProcess {
    pub(crate) fn new(program: Utf8PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl Ffmpeg for FfmpegProcess {
    async fn run(&self, args: Vec<String>) -> Result<Vec<u8>> {
        crate::util::cmd::run_ff(&self.program, args).await
    }
}
