//! File-based storage for manifest pairs and surface snapshots.
//!
//! The reconciliation core never touches the filesystem; this module is the
//! adapter a host uses to read a library directory, run a pass, and write the
//! corrected manifests back.

use crate::codec::ParseError;
use crate::correct::{CorrectionError, apply};
use crate::manifest::{LineEnding, ManifestFile};
use crate::reconcile::{ReconcileReport, reconcile};
use crate::snapshot::{SnapshotError, SurfaceSnapshot};
use crate::types::Partition;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

pub const CONFIG_FILE: &str = "apisurface.yaml";
pub const DEFAULT_SHIPPED_FILE: &str = "PublicAPI.Shipped.txt";
pub const DEFAULT_UNSHIPPED_FILE: &str = "PublicAPI.Unshipped.txt";
pub const DEFAULT_SNAPSHOT_FILE: &str = "PublicAPI.Surface.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{} manifest {} is corrupt: {source}", .partition, .path.display())]
    Corrupt {
        partition: Partition,
        path: PathBuf,
        source: ParseError,
    },
    #[error("Manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),
    #[error("Snapshot not found: {}", .0.display())]
    SnapshotNotFound(PathBuf),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("Correction error: {0}")]
    Correction(#[from] CorrectionError),
    #[error("{0}")]
    AlreadyExists(String),
}

/// Per-library settings read from `apisurface.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    pub shipped_file: String,
    pub unshipped_file: String,
    pub snapshot_file: String,
    /// Line ending for files this crate creates; existing files keep their own.
    pub line_ending: LineEnding,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        ManifestConfig {
            shipped_file: DEFAULT_SHIPPED_FILE.to_string(),
            unshipped_file: DEFAULT_UNSHIPPED_FILE.to_string(),
            snapshot_file: DEFAULT_SNAPSHOT_FILE.to_string(),
            line_ending: LineEnding::Lf,
        }
    }
}

impl ManifestConfig {
    pub fn shipped_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.shipped_file)
    }

    pub fn unshipped_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.unshipped_file)
    }

    pub fn snapshot_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.snapshot_file)
    }
}

/// Read `apisurface.yaml` from a library directory. Missing or invalid files yield defaults.
pub fn load_config(dir: &Path) -> ManifestConfig {
    let config_path = dir.join(CONFIG_FILE);
    let Ok(content) = fs::read_to_string(&config_path) else {
        return ManifestConfig::default();
    };
    match serde_yaml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %config_path.display(), error = %e, "ignoring invalid config");
            ManifestConfig::default()
        }
    }
}

/// Both manifest partitions of one library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestPair {
    pub shipped: ManifestFile,
    pub unshipped: ManifestFile,
}

fn read_manifest(path: &Path, partition: Partition) -> Result<ManifestFile, StorageError> {
    let content = fs::read_to_string(path)?;
    ManifestFile::load(&content).map_err(|source| {
        warn!(path = %path.display(), %partition, error = %source, "corrupt manifest");
        StorageError::Corrupt {
            partition,
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Load the manifest pair of a library. The shipped file must exist; a missing
/// unshipped file is treated as empty.
pub fn load_pair(dir: &Path, config: &ManifestConfig) -> Result<ManifestPair, StorageError> {
    let shipped_path = config.shipped_path(dir);
    if !shipped_path.exists() {
        return Err(StorageError::ManifestNotFound(shipped_path));
    }
    let shipped = read_manifest(&shipped_path, Partition::Shipped)?;

    let unshipped_path = config.unshipped_path(dir);
    let unshipped = if unshipped_path.exists() {
        read_manifest(&unshipped_path, Partition::Unshipped)?
    } else {
        ManifestFile::new(false).with_line_ending(config.line_ending)
    };

    Ok(ManifestPair { shipped, unshipped })
}

/// Write both manifests. Both are staged as temporaries next to their targets and
/// only moved into place once both have been written. If the second move fails, the
/// first target is put back to its previous content before the error is returned.
pub fn save_pair(
    dir: &Path,
    config: &ManifestConfig,
    pair: &ManifestPair,
) -> Result<Vec<PathBuf>, StorageError> {
    fs::create_dir_all(dir)?;

    let mut staged = Vec::with_capacity(2);
    for (path, manifest) in [
        (config.shipped_path(dir), &pair.shipped),
        (config.unshipped_path(dir), &pair.unshipped),
    ] {
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(manifest.save().as_bytes())?;
        tmp.flush()?;
        staged.push((tmp, path));
    }

    let mut previous = Vec::with_capacity(2);
    for (_, path) in &staged {
        previous.push(read_existing(path)?);
    }

    let mut written: Vec<PathBuf> = Vec::with_capacity(2);
    for (tmp, path) in staged {
        if let Err(e) = tmp.persist(&path) {
            for (done, old) in written.iter().zip(&previous) {
                restore(done, old.as_deref());
            }
            warn!(path = %path.display(), "manifest write failed, earlier files restored");
            return Err(e.error.into());
        }
        written.push(path);
    }

    info!(dir = %dir.display(), "wrote manifests");
    Ok(written)
}

fn read_existing(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn restore(path: &Path, previous: Option<&[u8]>) {
    let result = match previous {
        Some(bytes) => fs::write(path, bytes),
        None => fs::remove_file(path),
    };
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "could not restore manifest");
    }
}

/// Load the extractor's snapshot for a library.
pub fn load_snapshot(dir: &Path, config: &ManifestConfig) -> Result<SurfaceSnapshot, StorageError> {
    let path = config.snapshot_path(dir);
    if !path.exists() {
        return Err(StorageError::SnapshotNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    Ok(SurfaceSnapshot::from_json(&content)?)
}

/// Create an empty manifest pair, optionally with the nullable-enable header on
/// the shipped file.
pub fn init_manifests(
    dir: &Path,
    config: &ManifestConfig,
    annotated: bool,
    force: bool,
) -> Result<Vec<PathBuf>, StorageError> {
    let shipped_path = config.shipped_path(dir);
    if shipped_path.exists() && !force {
        return Err(StorageError::AlreadyExists(format!(
            "{} already exists. Use force to overwrite.",
            shipped_path.display()
        )));
    }

    let pair = ManifestPair {
        shipped: ManifestFile::new(annotated).with_line_ending(config.line_ending),
        unshipped: ManifestFile::new(false).with_line_ending(config.line_ending),
    };
    save_pair(dir, config, &pair)
}

/// Find every directory under `root` that holds a shipped manifest, sorted by path.
pub fn discover_libraries(root: &Path) -> Vec<PathBuf> {
    let mut libraries: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .map(|name| name.starts_with('.') || name == "target")
                    .unwrap_or(false)
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| {
            let config = load_config(e.path());
            config.shipped_path(e.path()).is_file()
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    libraries.sort();
    libraries
}

/// Reconcile one library directory against its snapshot.
pub fn check_library(dir: &Path) -> Result<ReconcileReport, StorageError> {
    let config = load_config(dir);
    let pair = load_pair(dir, &config)?;
    let snapshot = load_snapshot(dir, &config)?;
    Ok(reconcile(&snapshot, &pair.shipped, &pair.unshipped))
}

/// Reconcile one library and write the corrected manifests if anything diverged.
/// Returns the report the fix was computed from.
pub fn fix_library(dir: &Path) -> Result<ReconcileReport, StorageError> {
    let config = load_config(dir);
    let pair = load_pair(dir, &config)?;
    let snapshot = load_snapshot(dir, &config)?;
    let report = reconcile(&snapshot, &pair.shipped, &pair.unshipped);
    if report.is_clean() {
        return Ok(report);
    }

    let (shipped, unshipped) = apply(&report.divergences, &pair.shipped, &pair.unshipped)?;
    save_pair(dir, &config, &ManifestPair { shipped, unshipped })?;
    Ok(report)
}
