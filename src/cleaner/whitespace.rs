//! Whitespace collapsing and trimming

use super::offsets::Piece;

pub fn is_blank(c: char) -> bool {
    c.is_whitespace() || c.is_control()
}

/// Collapses every run of whitespace or control characters into one space
/// carried by the first piece of the run, and trims both ends.
pub fn collapse_whitespace(pieces: &mut Vec<Piece>) -> bool {
    let mut out: Vec<Piece> = Vec::with_capacity(pieces.len());
    let mut pending: Option<Piece> = None;
    for piece in pieces.iter() {
        if is_blank(piece.ch) {
            if pending.is_none() {
                pending = Some(Piece {
                    ch: ' ',
                    origin: piece.origin,
                });
            }
            continue;
        }
        if let Some(space) = pending.take() {
            if !out.is_empty() {
                out.push(space);
            }
        }
        out.push(*piece);
    }

    let changed = out != *pieces;
    *pieces = out;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::offsets::{pieces, Origin};

    #[test]
    fn test_collapse_and_trim() {
        let mut stream = pieces("\t Custom \n\n Light\u{a0} ");
        assert!(collapse_whitespace(&mut stream));
        let text: String = stream.iter().map(|p| p.ch).collect();
        assert_eq!(text, "Custom Light");
        // the kept space is the first blank of its run
        assert_eq!(stream[6].origin, Origin::raw(8));
    }

    #[test]
    fn test_control_characters_are_blank() {
        let mut stream = pieces("a\u{7}b");
        collapse_whitespace(&mut stream);
        let text: String = stream.iter().map(|p| p.ch).collect();
        assert_eq!(text, "a b");
    }

    #[test]
    fn test_clean_text_is_unchanged() {
        let mut stream = pieces("already clean");
        assert!(!collapse_whitespace(&mut stream));
    }
}
