use crate::encode::Encoder;
use crate::error::{AnalysisErrorKind, Error};
use crate::ffmpeg::Ffmpeg;
use crate::prelude::*;
use crate::probe::{Prober, SourceMedia};
use crate::target::EncodeTarget;
use crate::util::byte_size::KIB;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Records the ffmpeg calls and writes an output file of the given size.
/// The output file is written even when the pass fails, same as ffmpeg
/// leaves a truncated file behind.
#[derive(Debug)]
pub(crate) struct MockFfmpeg {
    output_size: u64,
    failing_pass: Option<u8>,
    args_log: Mutex<Vec<Vec<String>>>,
}

impl MockFfmpeg {
    pub(crate) fn new(output_size: u64) -> Arc<Self> {
        Arc::new(Self {
            output_size,
            failing_pass: None,
            args_log: Default::default(),
        })
    }

    pub(crate) fn failing_on_pass(pass: u8) -> Arc<Self> {
        Arc::new(Self {
            output_size: 512,
            failing_pass: Some(pass),
            args_log: Default::default(),
        })
    }

    pub(crate) fn args_log(&self) -> Vec<Vec<String>> {
        self.args_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Ffmpeg for MockFfmpeg {
    async fn run(&self, args: Vec<String>) -> Result<Vec<u8>> {
        let pass_pos = args.iter().position(|arg| arg == "-pass").unwrap();
        let pass: u8 = args[pass_pos + 1].parse().unwrap();

        self.args_log.lock().unwrap().push(args);

        if self.failing_pass == Some(pass) {
            bail!("Process `ffmpeg` failed with exit status: 1");
        }

        Ok(vec![])
    }

    async fn run_with_output_file(&self, args: Vec<String>, output_file: &Utf8Path) -> Result<u64> {
        let mut args = args;
        args.push(output_file.to_string());

        let contents = vec![0_u8; usize::try_from(self.output_size)?];
        fs::write(output_file, contents).await?;

        self.run(args).await?;

        Ok(self.output_size)
    }
}

#[derive(Debug)]
pub(crate) enum EncodeStep {
    Output { size_bytes: u64 },
    Fail,
}

impl EncodeStep {
    pub(crate) fn kib(size_kib: u64) -> Self {
        Self::Output {
            size_bytes: size_kib * KIB,
        }
    }
}

/// Encoder that returns the scripted output sizes one by one and records
/// the targets it was asked to encode.
#[derive(Debug)]
pub(crate) struct ScriptedEncoder {
    steps: Mutex<VecDeque<EncodeStep>>,
    targets_log: Mutex<Vec<EncodeTarget>>,
}

impl ScriptedEncoder {
    pub(crate) fn new(steps: impl IntoIterator<Item = EncodeStep>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            targets_log: Default::default(),
        })
    }

    pub(crate) fn targets_log(&self) -> Vec<EncodeTarget> {
        self.targets_log.lock().unwrap().clone()
    }

    pub(crate) fn bitrates_log(&self) -> Vec<u32> {
        self.targets_log()
            .iter()
            .map(|target| target.bitrate_kbps)
            .collect()
    }
}

#[async_trait]
impl Encoder for ScriptedEncoder {
    async fn encode(&self, target: &EncodeTarget) -> Result<u64, Error> {
        self.targets_log.lock().unwrap().push(*target);

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("BUG: the encoder was called more times than scripted");

        match step {
            EncodeStep::Output { size_bytes } => Ok(size_bytes),
            EncodeStep::Fail => Err(Error::Encode {
                pass: 2,
                source: anyhow::anyhow!("Process `ffmpeg` failed with exit status: 1").into(),
            }),
        }
    }
}

/// Prober that reports the given media or a missing video stream
#[derive(Debug)]
pub(crate) struct FakeProber {
    media: Option<SourceMedia>,
    probed: Mutex<Vec<Utf8PathBuf>>,
}

impl FakeProber {
    pub(crate) fn new(media: Option<SourceMedia>) -> Arc<Self> {
        Arc::new(Self {
            media,
            probed: Default::default(),
        })
    }

    pub(crate) fn full_hd(duration_secs: f64) -> Arc<Self> {
        Self::new(Some(SourceMedia {
            duration_secs,
            width: 1920,
            height: 1080,
        }))
    }

    pub(crate) fn probed(&self) -> Vec<Utf8PathBuf> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, path: &Utf8Path) -> Result<SourceMedia, Error> {
        self.probed.lock().unwrap().push(path.to_owned());

        self.media.ok_or_else(|| Error::Analysis {
            path: path.to_owned(),
            kind: AnalysisErrorKind::NoVideoStream,
        })
    }
}
