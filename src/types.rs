//! Core types for manifest entries and declarations.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Stable textual identifier of one public declaration, e.g. `C.Field -> string`.
///
/// Formed by the extractor and treated as opaque here: two declarations are the
/// same API iff their ids are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

impl CanonicalId {
    pub fn new(id: impl Into<String>) -> Self {
        CanonicalId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id with a trailing `?` removed, if it has one.
    pub(crate) fn without_question_mark(&self) -> Option<&str> {
        self.0.strip_suffix('?')
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CanonicalId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CanonicalId {
    fn from(s: &str) -> Self {
        CanonicalId(s.to_string())
    }
}

impl From<String> for CanonicalId {
    fn from(s: String) -> Self {
        CanonicalId(s)
    }
}

/// Nullability state of a manifest entry or a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullabilityState {
    /// No nullability information tracked.
    Unannotated,
    /// Reference type may be null (`?` suffix).
    Nullable,
    /// Reference type is never null (`!` suffix).
    NonNull,
    /// Predates nullability tracking (`~` prefix).
    Oblivious,
}

impl NullabilityState {
    /// True for the two states that carry a concrete annotation.
    pub fn is_annotated(self) -> bool {
        matches!(self, NullabilityState::Nullable | NullabilityState::NonNull)
    }
}

impl fmt::Display for NullabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NullabilityState::Unannotated => write!(f, "unannotated"),
            NullabilityState::Nullable => write!(f, "nullable"),
            NullabilityState::NonNull => write!(f, "non-null"),
            NullabilityState::Oblivious => write!(f, "oblivious"),
        }
    }
}

/// Manifest partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Already-released surface.
    Shipped,
    /// Surface pending release.
    Unshipped,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Shipped => write!(f, "shipped"),
            Partition::Unshipped => write!(f, "unshipped"),
        }
    }
}

/// One line of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEntry {
    pub id: CanonicalId,
    pub nullability: NullabilityState,
}

impl ApiEntry {
    pub fn new(id: impl Into<CanonicalId>, nullability: NullabilityState) -> Self {
        ApiEntry {
            id: id.into(),
            nullability,
        }
    }

    pub fn unannotated(id: impl Into<CanonicalId>) -> Self {
        Self::new(id, NullabilityState::Unannotated)
    }
}

/// One declaration of the current public surface, as supplied by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub id: CanonicalId,
    pub is_reference_type: bool,
    /// `None` when the extractor has no nullability fact for this declaration.
    #[serde(default)]
    pub nullability: Option<NullabilityState>,
}

impl Declaration {
    /// A reference-typed declaration with the given nullability fact.
    pub fn reference(id: impl Into<CanonicalId>, nullability: Option<NullabilityState>) -> Self {
        Declaration {
            id: id.into(),
            is_reference_type: true,
            nullability,
        }
    }

    /// A declaration whose type is not a reference type (value types, `void`, type entries).
    pub fn value(id: impl Into<CanonicalId>) -> Self {
        Declaration {
            id: id.into(),
            is_reference_type: false,
            nullability: None,
        }
    }
}
