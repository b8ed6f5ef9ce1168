//! Raw-to-cleaned character offset bookkeeping
//!
//! Every cleaning rule works on a stream of [`Piece`]s: one output character
//! plus the raw span it renders. Offsets count Unicode scalar values, never
//! bytes.

use std::ops::Range;

/// Where a character of the working text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Raw characters `start..end` render as this character
    Raw { start: usize, end: usize },
    /// Separator introduced by a rule; renders no raw character
    Inserted,
}

impl Origin {
    pub fn raw(index: usize) -> Self {
        Origin::Raw {
            start: index,
            end: index + 1,
        }
    }

    /// Smallest raw span covering both origins.
    ///
    /// Only defined when both are raw; `self` must precede `other` in the
    /// stream. Characters deleted between the two become part of the span.
    pub fn join(self, other: Origin) -> Option<Origin> {
        match (self, other) {
            (Origin::Raw { start, .. }, Origin::Raw { end, .. }) => Some(Origin::Raw { start, end }),
            _ => None,
        }
    }
}

/// One character of the working text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub ch: char,
    pub origin: Origin,
}

impl Piece {
    pub fn separator() -> Self {
        Piece {
            ch: ' ',
            origin: Origin::Inserted,
        }
    }
}

/// Initial stream: every raw character is its own unit
pub fn pieces(raw: &str) -> Vec<Piece> {
    raw.chars()
        .enumerate()
        .map(|(i, ch)| Piece {
            ch,
            origin: Origin::raw(i),
        })
        .collect()
}

/// Fate of one raw character
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Removed by cleaning (whitespace collapse, markup, exclusion set)
    Deleted,
    /// Rendered as cleaned characters `cleaned`, as part of the indivisible
    /// raw unit `unit` (an entity, a composed character, or itself)
    Kept {
        cleaned: Range<usize>,
        unit: Range<usize>,
    },
}

/// Per-field map from raw character index to cleaned characters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetMap {
    slots: Vec<Slot>,
}

impl OffsetMap {
    /// Builds the map from the final piece stream of a raw text of
    /// `raw_len` characters.
    pub fn from_pieces(raw_len: usize, pieces: &[Piece]) -> Self {
        let mut slots = vec![Slot::Deleted; raw_len];
        for (j, piece) in pieces.iter().enumerate() {
            let Origin::Raw { start, end } = piece.origin else {
                continue;
            };
            let Some(covered) = slots.get_mut(start..end) else {
                continue;
            };
            for slot in covered {
                match slot {
                    Slot::Kept { cleaned, .. } => cleaned.end = j + 1,
                    Slot::Deleted => {
                        *slot = Slot::Kept {
                            cleaned: j..j + 1,
                            unit: start..end,
                        }
                    }
                }
            }
        }
        Self { slots }
    }

    /// Number of raw characters covered
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, raw_index: usize) -> Option<&Slot> {
        self.slots.get(raw_index)
    }

    /// First cleaned index rendering `raw_index`, or `None` when the raw
    /// character was deleted or is out of range.
    pub fn cleaned_index(&self, raw_index: usize) -> Option<usize> {
        match self.slots.get(raw_index)? {
            Slot::Kept { cleaned, .. } => Some(cleaned.start),
            Slot::Deleted => None,
        }
    }

    /// True when every raw character maps to the cleaned character at the
    /// same position.
    pub fn is_identity(&self) -> bool {
        self.slots.iter().enumerate().all(|(i, slot)| {
            matches!(slot, Slot::Kept { cleaned, unit } if *cleaned == (i..i + 1) && *unit == (i..i + 1))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_unit_maps_every_raw_index() {
        // "&lt;x" cleaned to "<x"
        let stream = vec![
            Piece {
                ch: '<',
                origin: Origin::Raw { start: 0, end: 4 },
            },
            Piece {
                ch: 'x',
                origin: Origin::raw(4),
            },
        ];
        let map = OffsetMap::from_pieces(5, &stream);

        for i in 0..4 {
            assert_eq!(
                map.slot(i),
                Some(&Slot::Kept {
                    cleaned: 0..1,
                    unit: 0..4
                })
            );
        }
        assert_eq!(map.cleaned_index(4), Some(1));
        assert_eq!(map.cleaned_index(5), None);
        assert!(!map.is_identity());
    }

    #[test]
    fn test_expansion_extends_cleaned_range() {
        let stream = vec![
            Piece {
                ch: 'a',
                origin: Origin::raw(0),
            },
            Piece {
                ch: 'b',
                origin: Origin::raw(0),
            },
        ];
        let map = OffsetMap::from_pieces(1, &stream);
        assert_eq!(
            map.slot(0),
            Some(&Slot::Kept {
                cleaned: 0..2,
                unit: 0..1
            })
        );
    }

    #[test]
    fn test_inserted_and_missing_indices() {
        let stream = vec![
            Piece::separator(),
            Piece {
                ch: 'z',
                origin: Origin::raw(2),
            },
        ];
        let map = OffsetMap::from_pieces(3, &stream);
        assert_eq!(map.slot(0), Some(&Slot::Deleted));
        assert_eq!(map.slot(1), Some(&Slot::Deleted));
        assert_eq!(map.cleaned_index(2), Some(1));
    }

    #[test]
    fn test_identity() {
        let map = OffsetMap::from_pieces(3, &pieces("abc"));
        assert!(map.is_identity());
        assert!(OffsetMap::default().is_identity());
    }
}
