mod cmd;
mod config;
mod display;
mod encode;
mod error;
mod ffmpeg;
mod fit;
mod probe;
mod target;
mod tool;
mod util;

#[cfg(test)]
mod testing;

use clap::Parser;
use cmd::Cmd;

mod prelude {
    pub(crate) use crate::util::path::PathExt as _;
    pub(crate) use anyhow::{bail, ensure, Context as _};
    pub(crate) use camino::{Utf8Path, Utf8PathBuf};
    pub(crate) use fs_err::tokio as fs;
    pub(crate) use tracing::{debug, info, info_span, instrument, warn, Instrument as _};

    pub(crate) type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub async fn run() -> anyhow::Result<()> {
    cmd::Fit::parse().run().await
}
