use crate::error::{AnalysisErrorKind, Error};
use crate::prelude::*;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

/// Properties of the source clip that drive the encode target
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SourceMedia {
    pub(crate) duration_secs: f64,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

#[async_trait]
pub(crate) trait Prober: fmt::Debug + Send + Sync {
    async fn probe(&self, path: &Utf8Path) -> Result<SourceMedia, Error>;
}

#[derive(Debug)]
pub(crate) struct FfprobeProber {
    program: Utf8PathBuf,
}

impl FfprobeProber {
    pub(crate) fn new(program: Utf8PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, path: &Utf8Path) -> Result<SourceMedia, Error> {
        let args = [
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
            path.as_str(),
        ];

        let analysis_error = |kind: AnalysisErrorKind| Error::Analysis {
            path: path.to_owned(),
            kind,
        };

        let output = crate::util::cmd::run_ff(&self.program, args)
            .await
            .map_err(|err| analysis_error(AnalysisErrorKind::Process(err.into())))?;

        parse_ffprobe_output(&output).map_err(analysis_error)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

impl FfprobeStream {
    /// Cover art embedded into audio files is reported as a video stream
    /// with a single frame, it can't be animated
    fn is_video(&self) -> bool {
        self.codec_type.as_deref() == Some("video") && self.disposition.attached_pic == 0
    }
}

pub(crate) fn parse_ffprobe_output(json: &[u8]) -> Result<SourceMedia, AnalysisErrorKind> {
    let output: FfprobeOutput = serde_json::from_slice(json)?;

    let stream = output
        .streams
        .iter()
        .find(|stream| stream.is_video())
        .ok_or(AnalysisErrorKind::NoVideoStream)?;

    // Not all containers report the duration, in which case the stream's
    // duration is the best we have
    let duration = output
        .format
        .and_then(|format| format.duration)
        .or_else(|| stream.duration.clone())
        .ok_or(AnalysisErrorKind::MissingField("duration"))?;

    let duration_secs: f64 = duration.trim().parse().map_err(|_| AnalysisErrorKind::InvalidField {
        field: "duration",
        value: duration.clone(),
    })?;

    // Zero duration would make the bitrate infinite
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(AnalysisErrorKind::NonPositive {
            field: "duration",
            value: duration_secs,
        });
    }

    let dimension = |field, value: Option<u32>| match value {
        None => Err(AnalysisErrorKind::MissingField(field)),
        Some(0) => Err(AnalysisErrorKind::NonPositive { field, value: 0.0 }),
        Some(value) => Ok(value),
    };

    Ok(SourceMedia {
        duration_secs,
        width: dimension("width", stream.width)?,
        height: dimension("height", stream.height)?,
    })
}
