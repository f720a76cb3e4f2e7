//! Status persistence.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::report::status::StatusReport;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write status file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize status: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for one status report per reporting cycle.
pub trait StatusSink: Send + Sync {
    fn persist(&self, report: &StatusReport) -> Result<(), ReportError>;
}

/// Writes `<folder>/<sequence>.status` as a JSON array.
///
/// The file is written next to its destination and renamed into place, so
/// readers never observe a partial document.
#[derive(Debug, Clone)]
pub struct JsonStatusFile {
    folder: PathBuf,
    sequence: u64,
}

impl JsonStatusFile {
    pub fn new(folder: impl Into<PathBuf>, sequence: u64) -> Self {
        Self {
            folder: folder.into(),
            sequence,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.folder.join(format!("{}.status", self.sequence))
    }
}

impl StatusSink for JsonStatusFile {
    fn persist(&self, report: &StatusReport) -> Result<(), ReportError> {
        let body = serde_json::to_vec(&[report.to_status_item()])?;

        fs::create_dir_all(&self.folder).map_err(|source| io_error(&self.folder, source))?;
        let path = self.path();
        let staging = path.with_extension("status.tmp");
        fs::write(&staging, body).map_err(|source| io_error(&staging, source))?;
        fs::rename(&staging, &path).map_err(|source| io_error(&path, source))?;

        tracing::debug!(path = %path.display(), state = %report.committed_state, "Status persisted");
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthState;
    use crate::watcher::WatcherStatus;

    #[test]
    fn writes_sequence_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonStatusFile::new(dir.path().join("status"), 7);
        let report = StatusReport::new(HealthState::Healthy, WatcherStatus::Running);

        sink.persist(&report).unwrap();

        let content = std::fs::read_to_string(dir.path().join("status/7.status")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["status"]["substatus"][1]["formattedMessage"]["message"], "Healthy");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("status"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("7.status")]);
    }

    #[test]
    fn overwrites_previous_report() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonStatusFile::new(dir.path(), 0);

        sink.persist(&StatusReport::new(HealthState::Initializing, WatcherStatus::NotRunning))
            .unwrap();
        sink.persist(&StatusReport::new(HealthState::Unhealthy, WatcherStatus::Running))
            .unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        assert!(content.contains("Unhealthy"));
        assert!(!content.contains("Initializing"));
    }

    #[test]
    fn unwritable_folder_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file cannot be used as the status folder.
        let sink = JsonStatusFile::new(file.path(), 1);
        let result = sink.persist(&StatusReport::new(HealthState::Healthy, WatcherStatus::Disabled));
        assert!(matches!(result, Err(ReportError::Io { .. })));
    }
}
