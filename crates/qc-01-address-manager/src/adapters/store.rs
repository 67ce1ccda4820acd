use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::AddressManagerSnapshot;
use crate::ports::{SnapshotStore, StoreError};

// ============================================================================
// FileSnapshotStore - bincode snapshot on disk (requires "persistence" feature)
// ============================================================================

/// Snapshot store backed by a single bincode file.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Store snapshots at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Target file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(path: &Path, e: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, snapshot: &AddressManagerSnapshot) -> Result<(), StoreError> {
        let bytes = bincode::serialize(snapshot).map_err(|e| StoreError::Codec(e.to_string()))?;

        let temp = self.temp_path();
        fs::write(&temp, &bytes).map_err(|e| Self::io_error(&temp, e))?;
        fs::rename(&temp, &self.path).map_err(|e| Self::io_error(&self.path, e))?;

        debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            addresses = snapshot.records.len(),
            "[qc-01] Saved address table snapshot"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<AddressManagerSnapshot>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(&self.path, e)),
        };
        let snapshot =
            bincode::deserialize(&bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
        Ok(Some(snapshot))
    }
}
