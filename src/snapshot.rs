//! The current public surface, as handed over by an extractor.

use crate::codec::NULLABLE_ENABLE;
use crate::types::{CanonicalId, Declaration};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Declaration '{0}' supplied more than once with different facts")]
    ConflictingDeclaration(CanonicalId),
    #[error("Declaration id '{0}' cannot be written as a manifest line")]
    Unrepresentable(CanonicalId),
    #[error("Invalid snapshot JSON: {0}")]
    Json(String),
}

/// Immutable set of declarations for one reconciliation pass.
///
/// Traversal order is the order the extractor supplied; it drives divergence ordering.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSnapshot {
    declarations: Vec<Declaration>,
    index: HashMap<CanonicalId, usize>,
    /// Manifest ids the declarations are stored under.
    stored: HashSet<String>,
}

impl SurfaceSnapshot {
    /// Build a snapshot. Exact repeats are collapsed; the same id with different
    /// facts is rejected, as is any id that would not survive a manifest round-trip.
    /// A nullable value type `T?` is stored as `T`, so it may not sit next to `T`.
    pub fn new(
        declarations: impl IntoIterator<Item = Declaration>,
    ) -> Result<Self, SnapshotError> {
        let mut snapshot = SurfaceSnapshot::default();
        for decl in declarations {
            if !is_representable(&decl) {
                return Err(SnapshotError::Unrepresentable(decl.id));
            }
            if let Some(&pos) = snapshot.index.get(&decl.id) {
                if snapshot.declarations[pos] != decl {
                    return Err(SnapshotError::ConflictingDeclaration(decl.id));
                }
                continue;
            }
            if !snapshot.stored.insert(stored_id(&decl).to_string()) {
                return Err(SnapshotError::ConflictingDeclaration(decl.id));
            }
            snapshot
                .index
                .insert(decl.id.clone(), snapshot.declarations.len());
            snapshot.declarations.push(decl);
        }
        Ok(snapshot)
    }

    /// Parse the extractor's JSON array of declarations.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let declarations: Vec<Declaration> =
            serde_json::from_str(json).map_err(|e| SnapshotError::Json(e.to_string()))?;
        SurfaceSnapshot::new(declarations)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Declaration> {
        self.index.get(id).map(|&pos| &self.declarations[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

/// The id a declaration's manifest entry carries once loaded.
fn stored_id(decl: &Declaration) -> &str {
    match decl.id.without_question_mark() {
        Some(bare) if !decl.is_reference_type => bare,
        _ => decl.id.as_str(),
    }
}

/// Whether the declaration's id renders to a line that parses back to the same id.
///
/// Only value types may end in `?`; the manifest stores them as the bare id plus a
/// nullable suffix.
fn is_representable(decl: &Declaration) -> bool {
    let id = decl.id.as_str();
    let core = match id.strip_suffix('?') {
        Some(stripped) if !decl.is_reference_type => stripped,
        Some(_) => return false,
        None => id,
    };
    !core.trim().is_empty()
        && core.trim() == core
        && !core.contains(['\n', '\r'])
        && !core.starts_with('~')
        && !core.ends_with(['?', '!'])
        && id != NULLABLE_ENABLE
}
