//! Evidence span remapping from raw to cleaned coordinates
//!
//! A label points at `raw[begin..end]` of one metadata field. After cleaning
//! the same text lives at `cleaned[begin'..end']` of the field's paragraph.
//! [`project_span`] computes the new span from the field's offset map;
//! [`remap`] adds field lookup and the value check. Anything that does not
//! resolve to exactly the labeled text is rejected, never shifted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

use crate::cleaner::{clean_text, CleaningRules, OffsetMap, Slot};
use crate::labels::RawEvidence;
use crate::paragraphs::{ParagraphSet, Resolution};

/// Evidence located in cleaned paragraph text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evidence {
    pub value: String,
    pub pid: usize,
    pub begin: usize,
    pub end: usize,
}

/// Why an evidence was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// No field instance with the evidence's source and index
    UnknownSource,
    /// The field exists but produced no paragraph
    SourceNotKept,
    /// `begin >= end`
    EmptySpan,
    /// `end` beyond the raw field
    OutOfBounds,
    /// First raw character removed by cleaning
    BeginDeleted,
    /// Last raw character removed by cleaning
    EndDeleted,
    /// An endpoint falls inside a decoded reference or composed character
    SplitsUnit,
    /// Cleaned span text differs from the cleaned label value
    ValueMismatch,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rejection::UnknownSource => "unknown_source",
            Rejection::SourceNotKept => "source_not_kept",
            Rejection::EmptySpan => "empty_span",
            Rejection::OutOfBounds => "out_of_bounds",
            Rejection::BeginDeleted => "begin_deleted",
            Rejection::EndDeleted => "end_deleted",
            Rejection::SplitsUnit => "splits_unit",
            Rejection::ValueMismatch => "value_mismatch",
        };
        f.write_str(name)
    }
}

/// Maps the raw span `begin..end` to the cleaned span it renders.
///
/// `begin` must be the first raw character of its unit and `end - 1` the
/// last; both must survive cleaning.
pub fn project_span(map: &OffsetMap, begin: usize, end: usize) -> Result<Range<usize>, Rejection> {
    if begin >= end {
        return Err(Rejection::EmptySpan);
    }
    if end > map.len() {
        return Err(Rejection::OutOfBounds);
    }

    let first = match map.slot(begin) {
        Some(Slot::Kept { cleaned, unit }) if unit.start == begin => cleaned.start,
        Some(Slot::Kept { .. }) => return Err(Rejection::SplitsUnit),
        Some(Slot::Deleted) => return Err(Rejection::BeginDeleted),
        None => return Err(Rejection::OutOfBounds),
    };
    let last = match map.slot(end - 1) {
        Some(Slot::Kept { cleaned, unit }) if unit.end == end => cleaned.end,
        Some(Slot::Kept { .. }) => return Err(Rejection::SplitsUnit),
        Some(Slot::Deleted) => return Err(Rejection::EndDeleted),
        None => return Err(Rejection::OutOfBounds),
    };
    Ok(first..last)
}

/// Remaps one raw evidence into the product's cleaned paragraphs.
pub fn remap(
    evidence: &RawEvidence,
    set: &ParagraphSet,
    rules: &CleaningRules,
) -> Result<Evidence, Rejection> {
    let field = set
        .field(&evidence.source, evidence.source_index)
        .ok_or(Rejection::UnknownSource)?;
    let pid = match field.resolution {
        Resolution::Paragraph(pid) => pid,
        Resolution::Dropped(_) => return Err(Rejection::SourceNotKept),
    };
    let paragraph = set.paragraphs.get(pid).ok_or(Rejection::SourceNotKept)?;

    let span = project_span(&field.map, evidence.begin, evidence.end)?;
    let found: String = paragraph
        .text
        .chars()
        .skip(span.start)
        .take(span.end - span.start)
        .collect();
    let expected = clean_text(&evidence.value, rules);
    if found != expected {
        return Err(Rejection::ValueMismatch);
    }

    Ok(Evidence {
        value: expected,
        pid,
        begin: span.start,
        end: span.end,
    })
}
