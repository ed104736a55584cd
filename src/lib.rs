//! apisurface - keeps shipped/unshipped public API manifests in sync with a library's
//! declarations and their nullability.
//!
//! The core is pure: a [`SurfaceSnapshot`] of current declarations is reconciled
//! against two [`ManifestFile`]s into a list of [`Divergence`]s, and [`apply`] turns
//! those divergences into corrected manifests. [`storage`] is an optional file
//! adapter around that core.

pub mod codec;
pub mod correct;
pub mod logging;
pub mod manifest;
pub mod reconcile;
pub mod snapshot;
pub mod storage;
pub mod types;

pub use codec::{NULLABLE_ENABLE, ParseError, ParsedLine, parse_line, render_entry};
pub use correct::{CorrectionError, apply};
pub use manifest::{CorruptManifest, LineEnding, ManifestFile, pair_annotation_mode};
pub use reconcile::{Divergence, DivergenceKind, ReconcileReport, reconcile};
pub use snapshot::{SnapshotError, SurfaceSnapshot};
pub use storage::{
    ManifestConfig, ManifestPair, StorageError, check_library, discover_libraries, fix_library,
    init_manifests, load_config, load_pair, load_snapshot, save_pair,
};
pub use types::{ApiEntry, CanonicalId, Declaration, NullabilityState, Partition};
