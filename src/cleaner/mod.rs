//! Text cleaning with raw-to-cleaned offset tracking
//!
//! [`clean`] turns one raw metadata string into the text shipped in the
//! dataset plus an [`OffsetMap`] from raw character positions to cleaned
//! ones. Rules run in a fixed order:
//!
//! 1. decode loop, repeated until stable: exclusion-set filter, NFC,
//!    character reference decoding
//! 2. markup stripping
//! 3. whitespace collapsing and trimming
//!
//! Decoding before stripping means escaped markup (`&lt;b&gt;`) is removed
//! like real markup, and looping the decode makes cleaning idempotent on
//! doubly escaped catalog text.

mod entities;
mod markup;
mod offsets;
mod unicode;
mod whitespace;

pub use offsets::{OffsetMap, Slot};

use serde::{Deserialize, Serialize};

/// Characters dropped by default: invisible formatting and catalog
/// artifacts that never carry attribute values.
pub const DEFAULT_EXCLUDED_CHARS: [char; 6] = [
    '\u{200b}', // zero width space
    '\u{200c}', // zero width non-joiner
    '\u{2060}', // word joiner
    '\u{feff}', // byte order mark
    '\u{ad}',   // soft hyphen
    '\u{fffd}', // replacement character
];

/// Which cleaning steps are enabled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningRules {
    /// Decode `&amp;`, `&#NNN;` and `&#xHH;` references
    pub decode_entities: bool,
    /// Normalize to Unicode NFC
    pub normalize_unicode: bool,
    /// Remove tags, comments and script/style bodies
    pub strip_markup: bool,
    /// Collapse whitespace/control runs to one space and trim
    pub collapse_whitespace: bool,
    /// Characters removed outright; empty disables the filter
    pub excluded_chars: Vec<char>,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self {
            decode_entities: true,
            normalize_unicode: true,
            strip_markup: true,
            collapse_whitespace: true,
            excluded_chars: DEFAULT_EXCLUDED_CHARS.to_vec(),
        }
    }
}

impl CleaningRules {
    /// Rules that leave every text untouched
    pub fn disabled() -> Self {
        Self {
            decode_entities: false,
            normalize_unicode: false,
            strip_markup: false,
            collapse_whitespace: false,
            excluded_chars: Vec::new(),
        }
    }
}

/// Output of [`clean`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedText {
    pub text: String,
    pub map: OffsetMap,
}

/// Cleans `raw` under `rules`.
///
/// Pure: the same input and rules always give the same text and map.
pub fn clean(raw: &str, rules: &CleaningRules) -> CleanedText {
    let mut pieces = offsets::pieces(raw);
    let raw_len = pieces.len();

    loop {
        let mut changed = false;
        if !rules.excluded_chars.is_empty() {
            changed |= unicode::drop_excluded(&mut pieces, &rules.excluded_chars);
        }
        if rules.normalize_unicode {
            changed |= unicode::compose_nfc(&mut pieces);
        }
        if rules.decode_entities {
            changed |= entities::decode_entities(&mut pieces);
        }
        if !changed {
            break;
        }
    }

    if rules.strip_markup {
        markup::strip_markup(&mut pieces);
    }
    if rules.collapse_whitespace {
        whitespace::collapse_whitespace(&mut pieces);
    }

    CleanedText {
        text: pieces.iter().map(|p| p.ch).collect(),
        map: OffsetMap::from_pieces(raw_len, &pieces),
    }
}

/// Cleaned text only
pub fn clean_text(raw: &str, rules: &CleaningRules) -> String {
    clean(raw, rules).text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> CleaningRules {
        CleaningRules::default()
    }

    #[test]
    fn test_empty_input() {
        let cleaned = clean("", &rules());
        assert_eq!(cleaned.text, "");
        assert!(cleaned.map.is_empty());

        let blank = clean(" \n\t ", &rules());
        assert_eq!(blank.text, "");
        assert_eq!(blank.map.len(), 4);
        assert_eq!(blank.map.cleaned_index(0), None);
    }

    #[test]
    fn test_plain_title_is_identity() {
        let title = "D'Addario EJ26 Phosphor Bronze Acoustic Guitar Strings, Custom Light, 11-52";
        let cleaned = clean(title, &rules());
        assert_eq!(cleaned.text, title);
        assert!(cleaned.map.is_identity());
    }

    #[test]
    fn test_full_pipeline_on_catalog_html() {
        let raw = "<p>Phosphor&nbsp;Bronze &amp;amp; <b>Nickel</b></p>\n<script>x()</script>  Wound\u{200b}";
        let cleaned = clean(raw, &rules());
        assert_eq!(cleaned.text, "Phosphor Bronze & Nickel Wound");
    }

    #[test]
    fn test_escaped_markup_is_stripped() {
        let cleaned = clean("&lt;b&gt;Custom Light&lt;/b&gt;", &rules());
        assert_eq!(cleaned.text, "Custom Light");
        assert_eq!(cleaned.map.cleaned_index(0), None);
        assert_eq!(cleaned.map.cleaned_index(9), Some(0));
    }

    #[test]
    fn test_idempotence() {
        let samples = [
            "",
            "  spaced   out  ",
            "&amp;amp;lt;b&amp;gt;",
            "e\u{200b}\u{301}x",
            "cafe\u{301}<br>na\u{308}ive",
            "&am\u{200b}p;",
            "<<b>b>",
            "&#x200b;word",
            "x <a href",
            "<style>a{}</style>\u{212b}ngstr\u{f6}m",
            "\u{a0}\u{a0}nbsp\u{a0}",
        ];
        for raw in samples {
            let once = clean(raw, &rules());
            let twice = clean(&once.text, &rules());
            assert_eq!(twice.text, once.text, "not idempotent on {raw:?}");
            assert!(twice.map.is_identity(), "map not identity on {raw:?}");
        }
    }

    #[test]
    fn test_offset_validity() {
        let raw = "  Bronze\t\tAcoustic <i>11</i>-52 ";
        let cleaned = clean(raw, &rules());
        let raw_chars: Vec<char> = raw.chars().collect();
        let cleaned_chars: Vec<char> = cleaned.text.chars().collect();
        for (i, rc) in raw_chars.iter().enumerate() {
            if let Some(j) = cleaned.map.cleaned_index(i) {
                let expected = if rc.is_whitespace() { ' ' } else { *rc };
                assert_eq!(cleaned_chars[j], expected, "raw index {i}");
            }
        }
    }

    #[test]
    fn test_map_is_monotonic() {
        let raw = "a &amp; <b>b</b>  c\u{301} &lt;d&gt; e";
        let cleaned = clean(raw, &rules());
        let mut last = 0;
        for i in 0..cleaned.map.len() {
            if let Some(j) = cleaned.map.cleaned_index(i) {
                assert!(j >= last);
                last = j;
            }
        }
    }

    #[test]
    fn test_disabled_rules_leave_text_alone() {
        let raw = " <b>a&amp;b</b> ";
        let cleaned = clean(raw, &CleaningRules::disabled());
        assert_eq!(cleaned.text, raw);
        assert!(cleaned.map.is_identity());
    }

    #[test]
    fn test_rules_deserialize_with_defaults() {
        let rules: CleaningRules =
            serde_json::from_str(r#"{"strip_markup": false, "excluded_chars": ["|"]}"#).unwrap();
        assert!(!rules.strip_markup);
        assert!(rules.decode_entities);
        assert_eq!(rules.excluded_chars, vec!['|']);
    }
}
