//! Paragraph deduplication and id assignment

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::cleaner::{clean, CleaningRules, OffsetMap};
use crate::filters::{screen, ParagraphDrop};
use crate::metadata::{RawField, SourceTag};

/// One deduplicated unit of cleaned text.
///
/// `pid` is the paragraph's position in its product's paragraph list; the
/// JSON form carries only `text` and `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedParagraph {
    #[serde(skip)]
    pub pid: usize,
    pub text: String,
    pub source: SourceTag,
}

/// What a raw field turned into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Cleaned text lives in this paragraph (possibly shared with an
    /// earlier field holding the same text)
    Paragraph(usize),
    Dropped(ParagraphDrop),
}

/// A raw field after cleaning, kept for evidence remapping
#[derive(Debug, Clone)]
pub struct FieldInstance {
    pub source: SourceTag,
    pub index: usize,
    pub map: OffsetMap,
    pub resolution: Resolution,
}

/// Paragraphs of one product plus the per-field remapping data
#[derive(Debug, Clone, Default)]
pub struct ParagraphSet {
    pub paragraphs: Vec<CleanedParagraph>,
    pub fields: Vec<FieldInstance>,
    text_to_pid: HashMap<String, usize>,
    /// Fields whose cleaned text repeated an earlier paragraph
    pub duplicates: usize,
}

impl ParagraphSet {
    /// Cleans `fields` in order and assigns paragraph ids.
    ///
    /// Empty and (when `filter` is set) screened texts get no paragraph.
    /// A text seen before reuses the earlier pid; no duplicate paragraph is
    /// emitted.
    pub fn build(fields: &[RawField], rules: &CleaningRules, filter: bool) -> Self {
        let mut set = ParagraphSet::default();
        for field in fields {
            let cleaned = clean(&field.text, rules);
            let resolution = set.resolve(&field.source, cleaned.text, filter);
            set.fields.push(FieldInstance {
                source: field.source.clone(),
                index: field.index,
                map: cleaned.map,
                resolution,
            });
        }
        set
    }

    fn resolve(&mut self, source: &SourceTag, text: String, filter: bool) -> Resolution {
        if text.is_empty() {
            return Resolution::Dropped(ParagraphDrop::Empty);
        }
        if filter {
            if let Some(reason) = screen(source, &text) {
                return Resolution::Dropped(reason);
            }
        }
        if let Some(&pid) = self.text_to_pid.get(&text) {
            self.duplicates += 1;
            return Resolution::Paragraph(pid);
        }

        let pid = self.paragraphs.len();
        self.text_to_pid.insert(text.clone(), pid);
        self.paragraphs.push(CleanedParagraph {
            pid,
            text,
            source: source.clone(),
        });
        Resolution::Paragraph(pid)
    }

    pub fn pid_of(&self, text: &str) -> Option<usize> {
        self.text_to_pid.get(text).copied()
    }

    /// Field instance `index` of `source`
    pub fn field(&self, source: &SourceTag, index: usize) -> Option<&FieldInstance> {
        self.fields
            .iter()
            .find(|f| f.source == *source && f.index == index)
    }

    pub fn has_title(&self) -> bool {
        self.paragraphs.iter().any(|p| p.source == SourceTag::Title)
    }

    /// Drop reasons of fields that produced no paragraph
    pub fn drops(&self) -> impl Iterator<Item = ParagraphDrop> + '_ {
        self.fields.iter().filter_map(|f| match f.resolution {
            Resolution::Dropped(reason) => Some(reason),
            Resolution::Paragraph(_) => None,
        })
    }
}
