//! Exclusion-set filtering and NFC normalization

use unicode_normalization::char::{canonical_combining_class, compose};
use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

use super::offsets::Piece;

/// Drops every piece whose character is in `excluded`.
pub fn drop_excluded(pieces: &mut Vec<Piece>, excluded: &[char]) -> bool {
    let before = pieces.len();
    pieces.retain(|p| !excluded.contains(&p.ch));
    pieces.len() != before
}

/// Rewrites the stream in Unicode NFC.
///
/// The stream is cut into segments that NFC can touch as a whole: a
/// character plus the following combining marks and anything it composes
/// with. Segments already in NFC keep their per-character origins. A
/// rewritten segment becomes one unit: each output character carries the
/// span of the whole segment. Inserted separators never join a segment.
pub fn compose_nfc(pieces: &mut Vec<Piece>) -> bool {
    if is_nfc_quick(pieces.iter().map(|p| p.ch)) == IsNormalized::Yes {
        return false;
    }

    let mut out = Vec::with_capacity(pieces.len());
    let mut changed = false;
    let mut start = 0;
    while start < pieces.len() {
        let mut end = start + 1;
        while end < pieces.len() && joins_segment(&pieces[end - 1], &pieces[end]) {
            end += 1;
        }

        let segment = &pieces[start..end];
        let raw: String = segment.iter().map(|p| p.ch).collect();
        let normalized: String = raw.nfc().collect();
        if normalized == raw {
            out.extend_from_slice(segment);
        } else {
            let origin = segment[1..]
                .iter()
                .try_fold(segment[0].origin, |acc, p| acc.join(p.origin));
            match origin {
                Some(origin) => {
                    out.extend(normalized.chars().map(|ch| Piece { ch, origin }));
                    changed = true;
                }
                None => out.extend_from_slice(segment),
            }
        }
        start = end;
    }

    *pieces = out;
    changed
}

fn joins_segment(prev: &Piece, next: &Piece) -> bool {
    if prev.origin.join(next.origin).is_none() {
        return false;
    }
    canonical_combining_class(next.ch) != 0 || compose(prev.ch, next.ch).is_some()
}
