use std::hash::Hasher;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bincode::{Decode, Encode};
use compio::BufResult;
use compio::fs;
use metrohash::MetroHash64;
use snafu::{ResultExt, ensure};
use tracing::{debug, info};

use crate::ext::BestEffortPathExt;
use crate::filesystem::ProjectSnapshot;
use crate::project::ProjectId;
use crate::storage::backend::{
    CompressionSnafu, CorruptSnapshotSnafu, DecodeSnafu, EncodeSnafu, InconsistentChangeSnafu,
    IoSnafu, ProjectNameSnafu,
};
use crate::storage::{BackendError, StorageBackend};
use crate::sync::ChangeRecord;

const SNAPSHOT_EXTENSION: &str = "snapshot";
const TEMP_EXTENSION: &str = "snapshot.tmp";
const FORMAT_VERSION: u32 = 1;
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Encode, Decode)]
struct StoredSnapshot {
    version: u32,
    checksum: u64,
    snapshot: ProjectSnapshot,
}

/// Durable store keeping one snapshot file per project inside a directory.
///
/// Files are bincode encoded, zstd compressed and carry a MetroHash64
/// checksum of their entries. A flush reads the current snapshot, applies the
/// change set in memory and replaces the file through a temporary sibling, so
/// a failed flush never leaves a half-written project behind.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The project id must be a plain file name, so every snapshot stays
    /// inside `dir`.
    fn snapshot_path(&self, project: &ProjectId) -> Result<PathBuf, BackendError> {
        let stem = project.file_stem().context(ProjectNameSnafu)?;
        Ok(self.dir.join(format!("{stem}.{SNAPSHOT_EXTENSION}")))
    }

    async fn read_snapshot(&self, project: &ProjectId) -> Result<ProjectSnapshot, BackendError> {
        let path = self.snapshot_path(project)?;
        debug!("Reading snapshot from {}", path.best_effort_path_display());

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No stored snapshot for '{project}', starting empty");
                return Ok(ProjectSnapshot::default());
            }
            Err(e) => return Err(e).context(IoSnafu { path }),
        };

        let raw = zstd::decode_all(bytes.as_slice()).context(CompressionSnafu { path: &path })?;
        let (stored, _): (StoredSnapshot, usize) =
            bincode::decode_from_slice(&raw, bincode::config::standard())
                .context(DecodeSnafu { path: &path })?;

        ensure!(
            stored.version == FORMAT_VERSION,
            CorruptSnapshotSnafu {
                path: &path,
                reason: "unsupported format version"
            }
        );
        ensure!(
            checksum(&stored.snapshot) == stored.checksum,
            CorruptSnapshotSnafu {
                path: &path,
                reason: "checksum mismatch"
            }
        );
        Ok(stored.snapshot)
    }

    async fn write_snapshot(
        &self,
        project: &ProjectId,
        snapshot: ProjectSnapshot,
    ) -> Result<(), BackendError> {
        let path = self.snapshot_path(project)?;
        fs::create_dir_all(&self.dir)
            .await
            .context(IoSnafu { path: &self.dir })?;

        let temp_path = path.with_extension(TEMP_EXTENSION);
        let entries = snapshot.len();
        let stored = StoredSnapshot {
            version: FORMAT_VERSION,
            checksum: checksum(&snapshot),
            snapshot,
        };

        let raw = bincode::encode_to_vec(&stored, bincode::config::standard()).context(EncodeSnafu)?;
        let compressed = zstd::encode_all(raw.as_slice(), COMPRESSION_LEVEL)
            .context(CompressionSnafu { path: &path })?;

        let BufResult(written, _) = fs::write(&temp_path, compressed).await;
        written.context(IoSnafu { path: &temp_path })?;
        fs::rename(&temp_path, &path)
            .await
            .context(IoSnafu { path: &path })?;

        debug!(
            "Wrote {entries} entries to {}",
            path.best_effort_path_display()
        );
        Ok(())
    }
}

impl StorageBackend for DiskStore {
    async fn load(&self, project: &ProjectId) -> Result<ProjectSnapshot, BackendError> {
        self.read_snapshot(project).await
    }

    async fn flush(
        &self,
        project: &ProjectId,
        changes: &[ChangeRecord],
    ) -> Result<(), BackendError> {
        let mut snapshot = self.read_snapshot(project).await?;
        snapshot
            .apply(changes)
            .context(InconsistentChangeSnafu {
                project: project.clone(),
            })?;
        self.write_snapshot(project, snapshot).await
    }
}

fn checksum(snapshot: &ProjectSnapshot) -> u64 {
    let mut hasher = MetroHash64::default();
    for entry in &snapshot.entries {
        hasher.write(entry.path.as_bytes());
        hasher.write_u8(0);
        match &entry.content {
            Some(content) => {
                hasher.write_u8(1);
                hasher.write(content);
            }
            None => hasher.write_u8(2),
        }
    }
    hasher.finish()
}
