//! Line grammar for manifest files.
//!
//! ```text
//! line   := marker | entry | blank
//! marker := "#nullable enable"          (first line only)
//! entry  := "~" id | id ("?" | "!")?
//! ```

use crate::types::{ApiEntry, CanonicalId, NullabilityState};
use thiserror::Error;

/// Header line that switches a manifest into annotated mode.
pub const NULLABLE_ENABLE: &str = "#nullable enable";

const OBLIVIOUS_PREFIX: char = '~';
const NULLABLE_SUFFIX: char = '?';
const NON_NULL_SUFFIX: char = '!';

/// Manifest corruption. Line numbers are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: '#nullable enable' is only allowed on the first line")]
    MisplacedMarker { line: usize },
    #[error("line {line}: malformed nullability suffix in '{text}'")]
    MalformedSuffix { line: usize, text: String },
    #[error("line {line}: oblivious entry '{text}' cannot carry a nullability suffix")]
    ObliviousWithSuffix { line: usize, text: String },
    #[error("line {line}: entry has an empty declaration id")]
    EmptyId { line: usize },
    #[error("line {line}: duplicate entry '{id}' (first declared on line {first})")]
    DuplicateId {
        line: usize,
        id: CanonicalId,
        first: usize,
    },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::MisplacedMarker { line }
            | ParseError::MalformedSuffix { line, .. }
            | ParseError::ObliviousWithSuffix { line, .. }
            | ParseError::EmptyId { line }
            | ParseError::DuplicateId { line, .. } => *line,
        }
    }
}

/// Result of parsing a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Header,
    Entry(ApiEntry),
    Blank,
}

/// Parse one manifest line. `line` is the 1-based line number.
pub fn parse_line(text: &str, line: usize) -> Result<ParsedLine, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(ParsedLine::Blank);
    }

    if text == NULLABLE_ENABLE {
        if line != 1 {
            return Err(ParseError::MisplacedMarker { line });
        }
        return Ok(ParsedLine::Header);
    }

    if let Some(rest) = text.strip_prefix(OBLIVIOUS_PREFIX) {
        if rest.ends_with([NULLABLE_SUFFIX, NON_NULL_SUFFIX]) {
            return Err(ParseError::ObliviousWithSuffix {
                line,
                text: text.to_string(),
            });
        }
        let id = checked_id(rest, text, line)?;
        return Ok(ParsedLine::Entry(ApiEntry::new(
            id,
            NullabilityState::Oblivious,
        )));
    }

    let (id, nullability) = if let Some(id) = text.strip_suffix(NULLABLE_SUFFIX) {
        (id, NullabilityState::Nullable)
    } else if let Some(id) = text.strip_suffix(NON_NULL_SUFFIX) {
        (id, NullabilityState::NonNull)
    } else {
        (text, NullabilityState::Unannotated)
    };

    let id = checked_id(id, text, line)?;
    Ok(ParsedLine::Entry(ApiEntry::new(id, nullability)))
}

fn checked_id(id: &str, text: &str, line: usize) -> Result<CanonicalId, ParseError> {
    if id.trim().is_empty() {
        return Err(ParseError::EmptyId { line });
    }
    if id.ends_with([NULLABLE_SUFFIX, NON_NULL_SUFFIX]) || id.starts_with(OBLIVIOUS_PREFIX) {
        return Err(ParseError::MalformedSuffix {
            line,
            text: text.to_string(),
        });
    }
    Ok(CanonicalId::new(id))
}

/// Render an entry back to its line form.
pub fn render_entry(entry: &ApiEntry) -> String {
    match entry.nullability {
        NullabilityState::Unannotated => entry.id.to_string(),
        NullabilityState::Nullable => format!("{}{}", entry.id, NULLABLE_SUFFIX),
        NullabilityState::NonNull => format!("{}{}", entry.id, NON_NULL_SUFFIX),
        NullabilityState::Oblivious => format!("{}{}", OBLIVIOUS_PREFIX, entry.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> ApiEntry {
        match parse_line(text, 2).unwrap() {
            ParsedLine::Entry(e) => e,
            other => panic!("expected entry, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(
            entry("C.Field -> string?"),
            ApiEntry::new("C.Field -> string", NullabilityState::Nullable)
        );
        assert_eq!(
            entry("C.Field -> string!"),
            ApiEntry::new("C.Field -> string", NullabilityState::NonNull)
        );
        assert_eq!(
            entry("C.C() -> void"),
            ApiEntry::unannotated("C.C() -> void")
        );
    }

    #[test]
    fn test_parse_oblivious() {
        assert_eq!(
            entry("~C.Field -> string"),
            ApiEntry::new("C.Field -> string", NullabilityState::Oblivious)
        );
    }

    #[test]
    fn test_oblivious_rejects_suffix() {
        let err = parse_line("~C.Field -> string?", 4).unwrap_err();
        assert_eq!(
            err,
            ParseError::ObliviousWithSuffix {
                line: 4,
                text: "~C.Field -> string?".to_string()
            }
        );
    }

    #[test]
    fn test_double_suffix_is_malformed() {
        let err = parse_line("C.Field -> string?!", 3).unwrap_err();
        assert!(matches!(err, ParseError::MalformedSuffix { line: 3, .. }));
        assert!(parse_line("~~C", 3).is_err());
    }

    #[test]
    fn test_marker_only_on_first_line() {
        assert_eq!(parse_line(NULLABLE_ENABLE, 1).unwrap(), ParsedLine::Header);
        assert_eq!(
            parse_line(NULLABLE_ENABLE, 5).unwrap_err(),
            ParseError::MisplacedMarker { line: 5 }
        );
    }

    #[test]
    fn test_blank_and_empty_ids() {
        assert_eq!(parse_line("   ", 7).unwrap(), ParsedLine::Blank);
        assert_eq!(parse_line("?", 7).unwrap_err(), ParseError::EmptyId { line: 7 });
        assert_eq!(parse_line("~", 7).unwrap_err(), ParseError::EmptyId { line: 7 });
    }

    #[test]
    fn test_render_matches_parse() {
        for text in ["C", "C.F -> string?", "C.F -> string!", "~C.F -> string"] {
            assert_eq!(render_entry(&entry(text)), text);
        }
    }

    #[test]
    fn test_error_reports_line() {
        let err = parse_line("x?!", 12).unwrap_err();
        assert_eq!(err.line(), 12);
        assert!(err.to_string().starts_with("line 12:"));
    }
}
