//! One manifest partition and its text round-trip.

use crate::codec::{NULLABLE_ENABLE, ParseError, ParsedLine, parse_line, render_entry};
use crate::types::{ApiEntry, CanonicalId, NullabilityState, Partition};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Line terminator used when rendering a manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    Crlf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
        }
    }
}

const BYTE_ORDER_MARK: char = '\u{feff}';

/// A manifest file that failed to parse, tagged with its partition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{partition} manifest is corrupt: {source}")]
pub struct CorruptManifest {
    pub partition: Partition,
    #[source]
    pub source: ParseError,
}

/// One manifest partition: optional nullable-enable header plus entries in file order.
///
/// Byte-order mark, line ending and trailing newline are kept only so that `save`
/// reproduces the loaded text; they do not take part in equality.
#[derive(Debug, Clone, Default)]
pub struct ManifestFile {
    annotation_mode: bool,
    entries: Vec<ApiEntry>,
    index: HashMap<CanonicalId, usize>,
    line_ending: LineEnding,
    trailing_newline: bool,
    byte_order_mark: bool,
}

impl PartialEq for ManifestFile {
    fn eq(&self, other: &Self) -> bool {
        self.annotation_mode == other.annotation_mode && self.entries == other.entries
    }
}

impl Eq for ManifestFile {}

impl ManifestFile {
    /// An empty manifest.
    pub fn new(annotation_mode: bool) -> Self {
        ManifestFile {
            annotation_mode,
            ..Default::default()
        }
    }

    /// Build a manifest from entries, rejecting duplicate ids.
    pub fn from_entries(
        annotation_mode: bool,
        entries: impl IntoIterator<Item = ApiEntry>,
    ) -> Result<Self, ParseError> {
        let mut manifest = ManifestFile::new(annotation_mode);
        let offset = if annotation_mode { 2 } else { 1 };
        for (i, entry) in entries.into_iter().enumerate() {
            manifest.insert_checked(entry, i + offset)?;
        }
        Ok(manifest)
    }

    /// Parse manifest text. A leading UTF-8 byte-order mark is skipped and kept for `save`.
    pub fn load(text: &str) -> Result<Self, ParseError> {
        let mut manifest = ManifestFile::new(false);
        let text = match text.strip_prefix(BYTE_ORDER_MARK) {
            Some(rest) => {
                manifest.byte_order_mark = true;
                rest
            }
            None => text,
        };
        manifest.line_ending = if text.contains("\r\n") {
            LineEnding::Crlf
        } else {
            LineEnding::Lf
        };
        manifest.trailing_newline = text.ends_with('\n');

        // Line numbers of accepted entries, for duplicate reporting.
        let mut lines: Vec<usize> = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            match parse_line(raw, line)? {
                ParsedLine::Header => manifest.annotation_mode = true,
                ParsedLine::Blank => {}
                ParsedLine::Entry(entry) => {
                    if let Some(&pos) = manifest.index.get(&entry.id) {
                        return Err(ParseError::DuplicateId {
                            line,
                            id: entry.id,
                            first: lines[pos],
                        });
                    }
                    manifest.index.insert(entry.id.clone(), manifest.entries.len());
                    manifest.entries.push(entry);
                    lines.push(line);
                }
            }
        }

        Ok(manifest)
    }

    /// Parse manifest text for a known partition.
    pub fn load_partition(text: &str, partition: Partition) -> Result<Self, CorruptManifest> {
        ManifestFile::load(text).map_err(|source| CorruptManifest { partition, source })
    }

    /// Render the manifest: header first when annotated, then every entry in order.
    pub fn save(&self) -> String {
        let mut lines: Vec<String> = Vec::with_capacity(self.entries.len() + 1);
        if self.annotation_mode {
            lines.push(NULLABLE_ENABLE.to_string());
        }
        lines.extend(self.entries.iter().map(render_entry));

        let eol = self.line_ending.as_str();
        let body = lines.join(eol);
        let mut text = String::with_capacity(body.len() + 4);
        if self.byte_order_mark {
            text.push(BYTE_ORDER_MARK);
        }
        text.push_str(&body);
        if self.trailing_newline && !body.is_empty() {
            text.push_str(eol);
        }
        text
    }

    /// Whether this file carries the nullable-enable header.
    pub fn annotation_mode(&self) -> bool {
        self.annotation_mode
    }

    pub fn entries(&self) -> &[ApiEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ApiEntry> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn with_trailing_newline(mut self, trailing_newline: bool) -> Self {
        self.trailing_newline = trailing_newline;
        self
    }

    fn insert_checked(&mut self, entry: ApiEntry, line: usize) -> Result<(), ParseError> {
        if self.index.contains_key(&entry.id) {
            let first = self.index[&entry.id] + if self.annotation_mode { 2 } else { 1 };
            return Err(ParseError::DuplicateId {
                line,
                id: entry.id,
                first,
            });
        }
        self.index.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Append an entry. Returns false if the id is already present.
    pub(crate) fn append(&mut self, entry: ApiEntry) -> bool {
        if self.index.contains_key(&entry.id) {
            return false;
        }
        self.index.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
        true
    }

    /// Remove every listed entry in one pass, keeping the order of the rest.
    /// Returns how many entries were removed.
    pub(crate) fn remove_all(&mut self, ids: &HashSet<&str>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !ids.contains(entry.id.as_str()));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.index = self
                .entries
                .iter()
                .enumerate()
                .map(|(pos, entry)| (entry.id.clone(), pos))
                .collect();
        }
        removed
    }

    /// Rewrite an entry's nullability in place.
    pub(crate) fn set_nullability(&mut self, id: &str, nullability: NullabilityState) -> bool {
        match self.index.get(id) {
            Some(&pos) => {
                self.entries[pos].nullability = nullability;
                true
            }
            None => false,
        }
    }
}

/// Annotated mode for a shipped/unshipped pair: the header in either file enables it.
pub fn pair_annotation_mode(shipped: &ManifestFile, unshipped: &ManifestFile) -> bool {
    shipped.annotation_mode() || unshipped.annotation_mode()
}
