//! PID file bookkeeping
//!
//! Failures are logged and otherwise ignored: a missing PID file must never
//! stop the sniffer.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// PID file removed again on drop
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    written: bool,
}

impl PidFile {
    /// Write the current process ID to `path`
    pub fn create(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let written = match fs::write(&path, format!("{}\n", std::process::id())) {
            Ok(()) => {
                debug!("Wrote PID file {}", path.display());
                true
            }
            Err(e) => {
                warn!("Cannot write PID file {}: {}", path.display(), e);
                false
            }
        };
        Self { path, written }
    }

    /// Location of the PID file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file was actually written
    pub fn is_written(&self) -> bool {
        self.written
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if self.written {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Cannot remove PID file {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sniffer.pid");

        {
            let pid = PidFile::create(&path);
            assert!(pid.is_written());
            let content = fs::read_to_string(pid.path()).unwrap();
            assert_eq!(content, format!("{}\n", std::process::id()));
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_location_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pid = PidFile::create(dir.path().join("missing").join("sniffer.pid"));
        assert!(!pid.is_written());
    }
}
