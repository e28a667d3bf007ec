use crate::error::Error;
use crate::prelude::*;
use std::fmt;
use walkdir::WalkDir;

#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Tool {
    Ffmpeg,
    Ffprobe,
}

/// Strategy of locating external executables on the host
pub(crate) trait ToolResolver: fmt::Debug + Send + Sync {
    fn resolve(&self, tool: Tool) -> Option<Utf8PathBuf>;
}

pub(crate) fn require(resolver: &dyn ToolResolver, tool: Tool) -> Result<Utf8PathBuf, Error> {
    let path = resolver.resolve(tool).ok_or(Error::ToolNotFound { tool })?;
    debug!(%tool, %path, "Resolved tool");
    Ok(path)
}

/// Looks up the tool on `PATH` first, and then recursively in the search
/// directory, which is where portable ffmpeg builds are usually unpacked.
#[derive(Debug)]
pub(crate) struct SystemToolResolver {
    search_dir: Option<Utf8PathBuf>,
}

impl SystemToolResolver {
    pub(crate) fn with_search_dir(search_dir: Option<Utf8PathBuf>) -> Self {
        Self { search_dir }
    }

    /// Uses the directory of the running executable as the search directory
    pub(crate) fn from_current_exe() -> Self {
        let search_dir = std::env::current_exe()
            .context("Failed to get the path of the current executable")
            .and_then(|exe| {
                Utf8PathBuf::try_from(exe).context("Path of the current executable is not UTF-8")
            })
            .map(|exe| exe.parent().map(ToOwned::to_owned));

        let search_dir = search_dir.unwrap_or_else(|err| {
            warn!("{err:#}. Only PATH will be searched for tools");
            None
        });

        Self::with_search_dir(search_dir)
    }

    fn find(&self, name: &str) -> Option<Utf8PathBuf> {
        if let Some(path) = which::which(name)
            .ok()
            .and_then(|path| Utf8PathBuf::try_from(path).ok())
        {
            return Some(path);
        }

        find_in_dir(self.search_dir.as_deref()?, name)
    }
}

impl ToolResolver for SystemToolResolver {
    fn resolve(&self, tool: Tool) -> Option<Utf8PathBuf> {
        self.find(&tool.to_string())
    }
}

fn find_in_dir(dir: &Utf8Path, name: &str) -> Option<Utf8PathBuf> {
    let exe_name = format!("{name}.exe");

    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| {
            entry
                .map_err(|err| debug!(%err, "Skipping unreadable directory entry"))
                .ok()
        })
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            let file_name = entry.file_name();
            file_name == name || file_name == exe_name.as_str()
        })
        .and_then(|entry| Utf8PathBuf::try_from(entry.into_path()).ok())
}
