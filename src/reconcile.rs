//! Divergence detection between the current surface and the recorded manifests.

use crate::manifest::{ManifestFile, pair_annotation_mode};
use crate::snapshot::SurfaceSnapshot;
use crate::types::{ApiEntry, CanonicalId, Declaration, NullabilityState, Partition};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Divergence class, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    DuplicateAcrossPartitions,
    Undeclared,
    Stale,
    AnnotationMismatch,
    RequiresAnnotationDecision,
    ObliviousResolvable,
}

impl fmt::Display for DivergenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DivergenceKind::DuplicateAcrossPartitions => "duplicate-across-partitions",
            DivergenceKind::Undeclared => "undeclared",
            DivergenceKind::Stale => "stale",
            DivergenceKind::AnnotationMismatch => "annotation-mismatch",
            DivergenceKind::RequiresAnnotationDecision => "requires-annotation-decision",
            DivergenceKind::ObliviousResolvable => "oblivious-resolvable",
        };
        f.write_str(name)
    }
}

/// One mismatch between the current surface and the manifests.
///
/// `id` is the manifest entry's id for every kind except `Undeclared`, where it is
/// the declaration's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Divergence {
    /// The id is listed in both partitions. Fatal.
    DuplicateAcrossPartitions { id: CanonicalId },
    /// Public declaration with no manifest entry; `nullability` is the state the new
    /// unshipped entry must carry.
    Undeclared {
        id: CanonicalId,
        nullability: NullabilityState,
    },
    /// Manifest entry with no matching declaration.
    Stale {
        id: CanonicalId,
        partition: Partition,
    },
    AnnotationMismatch {
        id: CanonicalId,
        partition: Partition,
        expected: NullabilityState,
        actual: NullabilityState,
    },
    /// Unannotated reference-type entry in an annotated pair.
    RequiresAnnotationDecision {
        id: CanonicalId,
        partition: Partition,
    },
    /// Oblivious entry whose declaration now has a concrete annotation.
    ObliviousResolvable {
        id: CanonicalId,
        partition: Partition,
        resolved: NullabilityState,
    },
}

impl Divergence {
    pub fn kind(&self) -> DivergenceKind {
        match self {
            Divergence::DuplicateAcrossPartitions { .. } => {
                DivergenceKind::DuplicateAcrossPartitions
            }
            Divergence::Undeclared { .. } => DivergenceKind::Undeclared,
            Divergence::Stale { .. } => DivergenceKind::Stale,
            Divergence::AnnotationMismatch { .. } => DivergenceKind::AnnotationMismatch,
            Divergence::RequiresAnnotationDecision { .. } => {
                DivergenceKind::RequiresAnnotationDecision
            }
            Divergence::ObliviousResolvable { .. } => DivergenceKind::ObliviousResolvable,
        }
    }

    pub fn id(&self) -> &CanonicalId {
        match self {
            Divergence::DuplicateAcrossPartitions { id }
            | Divergence::Undeclared { id, .. }
            | Divergence::Stale { id, .. }
            | Divergence::AnnotationMismatch { id, .. }
            | Divergence::RequiresAnnotationDecision { id, .. }
            | Divergence::ObliviousResolvable { id, .. } => id,
        }
    }

    /// Partition the divergence applies to. `Undeclared` always targets `Unshipped`;
    /// duplicates belong to both and return `None`.
    pub fn partition(&self) -> Option<Partition> {
        match self {
            Divergence::DuplicateAcrossPartitions { .. } => None,
            Divergence::Undeclared { .. } => Some(Partition::Unshipped),
            Divergence::Stale { partition, .. }
            | Divergence::AnnotationMismatch { partition, .. }
            | Divergence::RequiresAnnotationDecision { partition, .. }
            | Divergence::ObliviousResolvable { partition, .. } => Some(*partition),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == DivergenceKind::DuplicateAcrossPartitions
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.kind())?;
        match self {
            Divergence::DuplicateAcrossPartitions { id } => {
                write!(f, "'{}' is listed in both shipped and unshipped", id)
            }
            Divergence::Undeclared { id, .. } => {
                write!(f, "'{}' is public but not declared in any manifest", id)
            }
            Divergence::Stale { id, partition } => {
                write!(f, "'{}' in {} no longer exists", id, partition)
            }
            Divergence::AnnotationMismatch {
                id,
                partition,
                expected,
                actual,
            } => write!(
                f,
                "'{}' in {} is recorded as {} but declared {}",
                id, partition, actual, expected
            ),
            Divergence::RequiresAnnotationDecision { id, partition } => write!(
                f,
                "'{}' in {} needs an explicit nullability annotation",
                id, partition
            ),
            Divergence::ObliviousResolvable {
                id,
                partition,
                resolved,
            } => write!(
                f,
                "'{}' in {} is marked oblivious but is now {}",
                id, partition, resolved
            ),
        }
    }
}

/// Ordered result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub annotation_mode: bool,
    pub divergences: Vec<Divergence>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.divergences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.divergences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.divergences.is_empty()
    }

    /// Divergences that block correction.
    pub fn fatal(&self) -> Vec<&Divergence> {
        self.divergences.iter().filter(|d| d.is_fatal()).collect()
    }

    pub fn has_fatal(&self) -> bool {
        self.divergences.iter().any(Divergence::is_fatal)
    }

    pub fn fixable(&self) -> Vec<&Divergence> {
        self.divergences.iter().filter(|d| !d.is_fatal()).collect()
    }

    pub fn of_kind(&self, kind: DivergenceKind) -> Vec<&Divergence> {
        self.divergences
            .iter()
            .filter(|d| d.kind() == kind)
            .collect()
    }

    pub fn count(&self, kind: DivergenceKind) -> usize {
        self.divergences.iter().filter(|d| d.kind() == kind).count()
    }

    pub fn into_divergences(self) -> Vec<Divergence> {
        self.divergences
    }
}

/// A declaration's manifest entry.
struct Located<'a> {
    partition: Partition,
    entry: &'a ApiEntry,
    /// Matched a nullable value type (`T?` id) against an entry parsed as `T` + `?`.
    value_suffix: bool,
}

fn locate<'a>(
    decl: &Declaration,
    shipped: &'a ManifestFile,
    unshipped: &'a ManifestFile,
) -> Option<Located<'a>> {
    let lookup = |id: &str| {
        shipped
            .get(id)
            .map(|e| (Partition::Shipped, e))
            .or_else(|| unshipped.get(id).map(|e| (Partition::Unshipped, e)))
    };

    if let Some((partition, entry)) = lookup(decl.id.as_str()) {
        return Some(Located {
            partition,
            entry,
            value_suffix: false,
        });
    }

    if !decl.is_reference_type
        && let Some(stripped) = decl.id.without_question_mark()
        && let Some((partition, entry)) = lookup(stripped)
        && entry.nullability == NullabilityState::Nullable
    {
        return Some(Located {
            partition,
            entry,
            value_suffix: true,
        });
    }

    None
}

/// State a brand-new entry for `decl` must carry to be a fixed point.
fn new_entry_state(decl: &Declaration, annotated: bool) -> NullabilityState {
    if !annotated || !decl.is_reference_type {
        return NullabilityState::Unannotated;
    }
    match decl.nullability {
        Some(fact) if fact.is_annotated() => fact,
        _ => NullabilityState::Oblivious,
    }
}

/// Compare an entry's nullability to its declaration in an annotated pair.
fn classify(decl: &Declaration, partition: Partition, entry: &ApiEntry) -> Option<Divergence> {
    use NullabilityState::*;

    let id = entry.id.clone();
    let actual = entry.nullability;

    if !decl.is_reference_type {
        return (actual != Unannotated).then_some(Divergence::AnnotationMismatch {
            id,
            partition,
            expected: Unannotated,
            actual,
        });
    }

    match (decl.nullability, actual) {
        (Some(fact), actual) if fact.is_annotated() && fact == actual => None,
        (Some(fact), Oblivious) if fact.is_annotated() => Some(Divergence::ObliviousResolvable {
            id,
            partition,
            resolved: fact,
        }),
        (Some(fact), actual) if fact.is_annotated() => Some(Divergence::AnnotationMismatch {
            id,
            partition,
            expected: fact,
            actual,
        }),
        (Some(Oblivious), actual) if actual.is_annotated() => {
            Some(Divergence::AnnotationMismatch {
                id,
                partition,
                expected: Oblivious,
                actual,
            })
        }
        (_, Unannotated) => Some(Divergence::RequiresAnnotationDecision { id, partition }),
        _ => None,
    }
}

/// Compare the current surface against both manifests.
///
/// Output order: duplicates (shipped order), undeclared (snapshot order), stale
/// (shipped then unshipped order), then annotation mismatches, annotation decisions
/// and resolvable oblivious entries (each in snapshot order).
pub fn reconcile(
    snapshot: &SurfaceSnapshot,
    shipped: &ManifestFile,
    unshipped: &ManifestFile,
) -> ReconcileReport {
    let annotated = pair_annotation_mode(shipped, unshipped);

    let mut duplicates = Vec::new();
    let mut duplicate_ids: HashSet<&str> = HashSet::new();
    for entry in shipped.entries() {
        if unshipped.contains(entry.id.as_str()) {
            duplicate_ids.insert(entry.id.as_str());
            duplicates.push(Divergence::DuplicateAcrossPartitions {
                id: entry.id.clone(),
            });
        }
    }

    let mut undeclared = Vec::new();
    let mut mismatches = Vec::new();
    let mut decisions = Vec::new();
    let mut resolvable = Vec::new();
    let mut matched: HashSet<&str> = HashSet::new();

    for decl in snapshot.iter() {
        let Some(located) = locate(decl, shipped, unshipped) else {
            undeclared.push(Divergence::Undeclared {
                id: decl.id.clone(),
                nullability: new_entry_state(decl, annotated),
            });
            continue;
        };

        let entry_id = located.entry.id.as_str();
        matched.insert(entry_id);
        if duplicate_ids.contains(entry_id) || !annotated || located.value_suffix {
            continue;
        }

        match classify(decl, located.partition, located.entry) {
            Some(d @ Divergence::AnnotationMismatch { .. }) => mismatches.push(d),
            Some(d @ Divergence::RequiresAnnotationDecision { .. }) => decisions.push(d),
            Some(d @ Divergence::ObliviousResolvable { .. }) => resolvable.push(d),
            _ => {}
        }
    }

    let mut stale = Vec::new();
    for (partition, file) in [
        (Partition::Shipped, shipped),
        (Partition::Unshipped, unshipped),
    ] {
        for entry in file.entries() {
            let id = entry.id.as_str();
            if !matched.contains(id) && !duplicate_ids.contains(id) {
                stale.push(Divergence::Stale {
                    id: entry.id.clone(),
                    partition,
                });
            }
        }
    }

    debug!(
        annotated,
        declarations = snapshot.len(),
        duplicates = duplicates.len(),
        undeclared = undeclared.len(),
        stale = stale.len(),
        mismatches = mismatches.len(),
        decisions = decisions.len(),
        resolvable = resolvable.len(),
        "reconciled public surface"
    );

    let mut divergences = duplicates;
    divergences.extend(undeclared);
    divergences.extend(stale);
    divergences.extend(mismatches);
    divergences.extend(decisions);
    divergences.extend(resolvable);

    ReconcileReport {
        annotation_mode: annotated,
        divergences,
    }
}
