//! Manifest rewrites that remove reconciled divergences.

use crate::manifest::ManifestFile;
use crate::reconcile::{Divergence, DivergenceKind};
use crate::types::{ApiEntry, CanonicalId, NullabilityState, Partition};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrectionError {
    #[error("Refusing to correct: {} id(s) listed in both shipped and unshipped manifests", .0.len())]
    DuplicateAcrossPartitions(Vec<CanonicalId>),
    #[error("No {partition} entry '{id}' to apply {kind} to")]
    MissingEntry {
        id: CanonicalId,
        partition: Partition,
        kind: DivergenceKind,
    },
    #[error("Cannot add '{0}': already declared")]
    AlreadyDeclared(CanonicalId),
}

/// The entry an `Undeclared` divergence adds, in the form `ManifestFile::load`
/// would produce for its rendered line.
fn new_entry(id: &CanonicalId, nullability: NullabilityState) -> ApiEntry {
    if nullability == NullabilityState::Unannotated
        && let Some(stripped) = id.without_question_mark()
    {
        return ApiEntry::new(stripped, NullabilityState::Nullable);
    }
    ApiEntry::new(id.clone(), nullability)
}

/// Apply divergences to a shipped/unshipped pair, returning the corrected pair.
///
/// New entries are appended to unshipped; every other change is made in place.
/// Either both files are returned or nothing is: the inputs are never modified.
pub fn apply(
    divergences: &[Divergence],
    shipped: &ManifestFile,
    unshipped: &ManifestFile,
) -> Result<(ManifestFile, ManifestFile), CorrectionError> {
    let duplicates: Vec<CanonicalId> = divergences
        .iter()
        .filter(|d| d.is_fatal())
        .map(|d| d.id().clone())
        .collect();
    if !duplicates.is_empty() {
        warn!(count = duplicates.len(), "manifest ids duplicated across partitions");
        return Err(CorrectionError::DuplicateAcrossPartitions(duplicates));
    }

    let mut new_shipped = shipped.clone();
    let mut new_unshipped = unshipped.clone();

    // Removals and rewrites first, so an addition may reuse an id that is going away.
    let mut stale_shipped: HashSet<&str> = HashSet::new();
    let mut stale_unshipped: HashSet<&str> = HashSet::new();
    for divergence in divergences {
        let (partition, id, nullability) = match divergence {
            Divergence::DuplicateAcrossPartitions { .. } | Divergence::Undeclared { .. } => {
                continue;
            }
            Divergence::Stale { id, partition } => {
                let (file, stale) = match partition {
                    Partition::Shipped => (&new_shipped, &mut stale_shipped),
                    Partition::Unshipped => (&new_unshipped, &mut stale_unshipped),
                };
                if !file.contains(id.as_str()) {
                    return Err(missing(divergence, *partition));
                }
                stale.insert(id.as_str());
                continue;
            }
            Divergence::AnnotationMismatch {
                id,
                partition,
                expected,
                ..
            } => (*partition, id, *expected),
            Divergence::RequiresAnnotationDecision { id, partition } => {
                (*partition, id, NullabilityState::Oblivious)
            }
            Divergence::ObliviousResolvable {
                id,
                partition,
                resolved,
            } => (*partition, id, *resolved),
        };

        if !file_mut(&mut new_shipped, &mut new_unshipped, partition)
            .set_nullability(id.as_str(), nullability)
        {
            return Err(missing(divergence, partition));
        }
    }

    new_shipped.remove_all(&stale_shipped);
    new_unshipped.remove_all(&stale_unshipped);

    for divergence in divergences {
        if let Divergence::Undeclared { id, nullability } = divergence {
            let entry = new_entry(id, *nullability);
            if new_shipped.contains(entry.id.as_str()) {
                return Err(CorrectionError::AlreadyDeclared(entry.id));
            }
            let entry_id = entry.id.clone();
            if !new_unshipped.append(entry) {
                return Err(CorrectionError::AlreadyDeclared(entry_id));
            }
        }
    }

    debug!(
        applied = divergences.len(),
        shipped = new_shipped.len(),
        unshipped = new_unshipped.len(),
        "corrected manifests"
    );

    Ok((new_shipped, new_unshipped))
}

fn file_mut<'a>(
    shipped: &'a mut ManifestFile,
    unshipped: &'a mut ManifestFile,
    partition: Partition,
) -> &'a mut ManifestFile {
    match partition {
        Partition::Shipped => shipped,
        Partition::Unshipped => unshipped,
    }
}

fn missing(divergence: &Divergence, partition: Partition) -> CorrectionError {
    CorrectionError::MissingEntry {
        id: divergence.id().clone(),
        partition,
        kind: divergence.kind(),
    }
}
