//! Spool-file lifecycle.

use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A transfer descriptor spooled to disk for the duration of one
/// submission flow.
///
/// Removing the file is owned by this guard's `Drop`, so every exit path
/// of the flow leaves no copy behind, whichever way the flow ended.
#[derive(Debug)]
pub struct SpoolFile {
    path: PathBuf,
}

impl SpoolFile {
    /// Writes `bytes` under `dir` as `<stem>.torrent`.
    ///
    /// The stem is restricted to platform file-identifier characters
    /// before it becomes part of a path.
    pub fn write(dir: &Path, stem: &str, bytes: &[u8]) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.torrent", sanitize_stem(stem)));
        std::fs::write(&path, bytes)?;
        Ok(Self { path })
    }

    /// Location of the spooled copy.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove spool file");
            }
        }
    }
}

fn sanitize_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
