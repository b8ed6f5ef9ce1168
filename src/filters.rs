//! Paragraph quality filters
//!
//! Catalog text sometimes survives cleaning as script, stylesheet or markup
//! debris. Such paragraphs are dropped before deduplication.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metadata::SourceTag;

/// Markers of markup or scripting left in otherwise cleaned text
const MARKUP_MARKERS: [&str; 6] = [
    "<a href",
    "javascript:",
    "background-color:",
    "background-image:",
    " li:",
    ".aloha",
];

/// Why a field produced no paragraph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphDrop {
    /// Nothing left after cleaning
    Empty,
    /// Title rendered from an unexecuted page script
    TitleScript,
    /// Markup or scripting remnants
    ResidualMarkup,
    /// Stylesheet text
    Stylesheet,
}

impl fmt::Display for ParagraphDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParagraphDrop::Empty => "empty",
            ParagraphDrop::TitleScript => "title_script",
            ParagraphDrop::ResidualMarkup => "residual_markup",
            ParagraphDrop::Stylesheet => "stylesheet",
        };
        f.write_str(name)
    }
}

/// Returns the reason to drop a cleaned, non-empty paragraph, if any.
pub fn screen(source: &SourceTag, text: &str) -> Option<ParagraphDrop> {
    if *source == SourceTag::Title && text.contains("getTime") {
        return Some(ParagraphDrop::TitleScript);
    }
    if has_residual_markup(text) {
        return Some(ParagraphDrop::ResidualMarkup);
    }
    if is_stylesheet(text) {
        return Some(ParagraphDrop::Stylesheet);
    }
    None
}

pub fn has_residual_markup(text: &str) -> bool {
    MARKUP_MARKERS.iter().any(|marker| text.contains(marker))
}

/// More than 20 CSS-looking tokens making up over 30% of the text
pub fn is_stylesheet(text: &str) -> bool {
    let mut tokens = 0usize;
    let mut css_tokens = 0usize;
    for token in text.split_whitespace() {
        tokens += 1;
        if token.starts_with(['.', '#'])
            || token.starts_with("div")
            || token.contains("px")
            || token.matches('-').count() > 1
        {
            css_tokens += 1;
        }
    }
    tokens > 0 && css_tokens > 20 && css_tokens as f64 / tokens as f64 > 0.3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_script() {
        assert_eq!(
            screen(&SourceTag::Title, "var d = new Date(); d.getTime()"),
            Some(ParagraphDrop::TitleScript)
        );
        assert_eq!(screen(&SourceTag::Description, "call getTime"), None);
    }

    #[test]
    fn test_residual_markup() {
        assert_eq!(
            screen(&SourceTag::Description, "see <a href=x>here"),
            Some(ParagraphDrop::ResidualMarkup)
        );
        assert_eq!(
            screen(&SourceTag::Feature, "div.aloha-block { }"),
            Some(ParagraphDrop::ResidualMarkup)
        );
    }

    #[test]
    fn test_stylesheet() {
        let css = (0..25)
            .map(|i| format!(".col-{i} {{ margin: {i}px }}"))
            .collect::<Vec<_>>()
            .join(" ");
        assert!(is_stylesheet(&css));
        assert_eq!(screen(&SourceTag::Description, &css), Some(ParagraphDrop::Stylesheet));

        assert!(!is_stylesheet("Phosphor Bronze Acoustic Guitar Strings, .011-.052"));
        assert!(!is_stylesheet(""));
    }

    #[test]
    fn test_regular_text_passes() {
        assert_eq!(
            screen(&SourceTag::Title, "D'Addario EJ26 Phosphor Bronze Acoustic Guitar Strings"),
            None
        );
    }
}
