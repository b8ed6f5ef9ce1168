//! HTML/XML character reference decoding

use quick_xml::escape::resolve_html5_entity;

use super::offsets::{Origin, Piece};

/// Longest reference we try to resolve, `&` and `;` included
const MAX_REFERENCE_LEN: usize = 40;

/// Decodes `&name;`, `&#NNN;` and `&#xHH;` references in one pass.
///
/// The decoded characters all carry the span of the whole reference.
/// Unknown names and invalid code points stay literal.
pub fn decode_entities(pieces: &mut Vec<Piece>) -> bool {
    if !pieces.iter().any(|p| p.ch == '&') {
        return false;
    }

    let mut out = Vec::with_capacity(pieces.len());
    let mut changed = false;
    let mut i = 0;
    while i < pieces.len() {
        if pieces[i].ch == '&' {
            if let Some((len, decoded, origin)) = reference_at(&pieces[i..]) {
                out.extend(decoded.chars().map(|ch| Piece { ch, origin }));
                i += len;
                changed = true;
                continue;
            }
        }
        out.push(pieces[i]);
        i += 1;
    }

    *pieces = out;
    changed
}

/// Resolves a reference at the head of `pieces`, returning its length,
/// replacement text and joined origin.
fn reference_at(pieces: &[Piece]) -> Option<(usize, String, Origin)> {
    let window = &pieces[..pieces.len().min(MAX_REFERENCE_LEN)];
    let semicolon = window.iter().position(|p| p.ch == ';')?;
    if semicolon < 2 {
        return None;
    }

    let name: String = window[1..semicolon].iter().map(|p| p.ch).collect();
    let decoded = resolve_reference(&name)?;

    let origin = window[1..=semicolon]
        .iter()
        .try_fold(window[0].origin, |acc, p| acc.join(p.origin))?;
    Some((semicolon + 1, decoded, origin))
}

fn resolve_reference(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        if code == 0 {
            return None;
        }
        return char::from_u32(code).map(String::from);
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    resolve_html5_entity(name).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::offsets::pieces;

    fn decode(raw: &str) -> (String, Vec<Piece>) {
        let mut stream = pieces(raw);
        decode_entities(&mut stream);
        (stream.iter().map(|p| p.ch).collect(), stream)
    }

    #[test]
    fn test_named_and_numeric_references() {
        let (text, stream) = decode("Phosphor &amp; Bronze &#8211; 11&#x2d;52");
        assert_eq!(text, "Phosphor & Bronze \u{2013} 11-52");
        assert_eq!(stream[9].origin, Origin::Raw { start: 9, end: 14 });
    }

    #[test]
    fn test_unknown_and_unterminated_references_stay_literal() {
        assert_eq!(decode("AT&T rocks").0, "AT&T rocks");
        assert_eq!(decode("a &bogus; b").0, "a &bogus; b");
        assert_eq!(decode("a &amp b").0, "a &amp b");
        assert_eq!(decode("&#0;").0, "&#0;");
        assert_eq!(decode("&#xD800;").0, "&#xD800;");
    }

    #[test]
    fn test_single_pass_leaves_double_escape() {
        let mut stream = pieces("&amp;lt;");
        assert!(decode_entities(&mut stream));
        let once: String = stream.iter().map(|p| p.ch).collect();
        assert_eq!(once, "&lt;");
        assert!(decode_entities(&mut stream));
        assert_eq!(stream.len(), 1);
        assert_eq!(stream[0].ch, '<');
        assert_eq!(stream[0].origin, Origin::Raw { start: 0, end: 8 });
    }

    #[test]
    fn test_separator_blocks_reference() {
        let mut stream = pieces("&amp;");
        stream.insert(2, Piece::separator());
        assert!(!decode_entities(&mut stream));
    }
}
