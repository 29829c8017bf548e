use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

/// What an intermediate file is, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The staged upload itself.
    Upload,
    /// Normalized canonical audio.
    Prepared,
    /// Low-bitrate re-encode made before splitting.
    Compressed,
    /// One chunk of a split.
    Chunk,
}

#[derive(Debug)]
struct Artifact {
    path: PathBuf,
    kind: ArtifactKind,
    released: bool,
}

/// Outcome of [`ArtifactJanitor::release_all`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    pub removed: usize,
    /// Already gone when we got to them.
    pub missing: usize,
    pub failed: usize,
}

/// Owns every intermediate file of one pipeline run.
///
/// Each tracked path is reported at most once, by an explicit
/// [`release_all`](Self::release_all) or, failing that, on drop (which is
/// what runs when the owning future is cancelled). Released paths stay known
/// until drop: codec work still running on the blocking pool after a timeout
/// may write to a path the janitor already released, and the final sweep on
/// drop removes it. Deletion failures are logged and otherwise ignored.
#[derive(Debug, Default)]
pub struct ArtifactJanitor {
    artifacts: Mutex<Vec<Artifact>>,
}

impl ArtifactJanitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` for cleanup. Tracking the same path twice is a no-op.
    pub fn track(&self, path: impl Into<PathBuf>, kind: ArtifactKind) {
        let path = path.into();
        let mut artifacts = self.artifacts.lock();
        if artifacts.iter().any(|a| a.path == path) {
            return;
        }
        debug!(path = ?path, kind = ?kind, "Tracking artifact");
        artifacts.push(Artifact {
            path,
            kind,
            released: false,
        });
    }

    /// Number of artifacts still awaiting release.
    pub fn pending(&self) -> usize {
        self.artifacts.lock().iter().filter(|a| !a.released).count()
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.artifacts.lock().iter().any(|a| a.path == path)
    }

    /// Delete everything tracked so far, newest first.
    ///
    /// Paths released earlier are swept again; a file that reappeared there
    /// counts as removed, one that is still gone is not reported.
    pub fn release_all(&self) -> ReleaseReport {
        let mut artifacts = self.artifacts.lock();
        let mut report = ReleaseReport::default();

        for artifact in artifacts.iter_mut().rev() {
            match fs::remove_file(&artifact.path) {
                Ok(()) => {
                    report.removed += 1;
                    artifact.released = true;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    if !artifact.released {
                        report.missing += 1;
                        artifact.released = true;
                    }
                }
                Err(e) => {
                    warn!(
                        path = ?artifact.path,
                        kind = ?artifact.kind,
                        error = %e,
                        "Failed to remove artifact"
                    );
                    report.failed += 1;
                }
            }
        }

        if report != ReleaseReport::default() {
            debug!(
                removed = report.removed,
                missing = report.missing,
                failed = report.failed,
                "Artifacts released"
            );
        }
        report
    }
}

impl Drop for ArtifactJanitor {
    fn drop(&mut self) {
        if !self.artifacts.get_mut().is_empty() {
            let report = self.release_all();
            if report.removed > 0 {
                debug!(removed = report.removed, "Late artifacts removed on drop");
            }
        }
    }
}
