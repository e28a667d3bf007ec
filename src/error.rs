use crate::tool::Tool;
use camino::Utf8PathBuf;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal errors of the sticker generation. Exceeding the size budget is not
/// an error, see [`crate::fit::FitOutcome::Exhausted`].
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(
        "Could not find the `{tool}` executable. Install ffmpeg and make sure `{tool}` \
        is available on PATH or placed in the directory of this program"
    )]
    ToolNotFound { tool: Tool },

    #[error("Failed to analyze `{path}`")]
    Analysis {
        path: Utf8PathBuf,
        #[source]
        kind: AnalysisErrorKind,
    },

    #[error("Encoder failed during pass {pass}")]
    Encode {
        pass: u8,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum AnalysisErrorKind {
    #[error("ffprobe invocation failed")]
    Process(#[source] BoxError),

    #[error("ffprobe output is not valid JSON")]
    Parse(#[from] serde_json::Error),

    #[error("No video stream found")]
    NoVideoStream,

    #[error("`{0}` is missing in the ffprobe output")]
    MissingField(&'static str),

    #[error("`{field}` has an invalid value `{value}`")]
    InvalidField { field: &'static str, value: String },

    #[error("`{field}` must be positive, but got {value}")]
    NonPositive { field: &'static str, value: f64 },
}
