//! Load one report file into a [`Snapshot`].

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::{Error, line::Line, snapshot::Snapshot};

impl Snapshot {
    /// Fold the lines of one report into a `Snapshot`.
    ///
    /// Lines are consumed in order and consumption stops at the first line
    /// that fails to parse. The returned `Snapshot` then carries the error,
    /// tagged with `origin` and the 1-based line number, together with
    /// whatever the earlier lines populated.
    pub fn from_lines<'a, I>(origin: &Path, lines: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut snapshot = Snapshot::new();
        let outcome = lines
            .into_iter()
            .enumerate()
            .try_for_each(|(idx, text)| {
                Line::classify(text)
                    .apply(&mut snapshot)
                    .map_err(|source| Error::Parse {
                        path: origin.to_path_buf(),
                        line: idx + 1,
                        source,
                    })
            });
        if let Err(error) = outcome {
            snapshot.error = Some(error);
        }
        snapshot
    }
}

/// Read and parse the report file at `path`.
///
/// Never fails outright: a file that cannot be read yields an empty
/// `Snapshot` carrying [`Error::SourceUnavailable`].
pub async fn load(path: PathBuf) -> Snapshot {
    // NOTE report files are small, a handful of lines per virtual host, so
    // one `read_to_string` beats a buffered line reader here.
    let contents = match fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(source) => {
            warn!("Unable to read report {path:?}: {source}");
            return Snapshot::failed(Error::SourceUnavailable { path, source });
        }
    };

    let snapshot = Snapshot::from_lines(&path, contents.lines());
    match snapshot.error() {
        Some(error) => warn!("Failed to parse report: {error}"),
        None => debug!(
            "Loaded report {path:?}: {vhosts} virtual hosts, {apps} external application types",
            vhosts = snapshot.virtual_hosts.len(),
            apps = snapshot.ext_apps.len(),
        ),
    }
    snapshot
}
