//! Markup stripping
//!
//! Removes tags, comments, declarations and processing instructions, and the
//! whole body of `script` and `style` elements. Every removed region leaves
//! one inserted separator so text on both sides never fuses into one word.

use super::offsets::Piece;

/// Elements whose content is never text
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

pub fn strip_markup(pieces: &mut Vec<Piece>) -> bool {
    if !pieces.iter().any(|p| p.ch == '<') {
        return false;
    }

    let chars: Vec<char> = pieces.iter().map(|p| p.ch).collect();
    let mut scanner = Scanner::new(&chars);
    let mut out = Vec::with_capacity(pieces.len());
    let mut changed = false;
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '<' {
            if let Some(end) = scanner.markup_end(i) {
                out.push(Piece::separator());
                i = end;
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

/// Left-to-right markup scanner.
///
/// Tag and declaration scans stop at the next unquoted `<`, and the comment
/// terminator search is cached, so a text full of unclosed `<` costs linear
/// time. Queries must come with non-decreasing `start`.
struct Scanner<'a> {
    chars: &'a [char],
    /// Last `-->` search: where it started and what it found
    comment_close: Option<(usize, Option<usize>)>,
}

impl<'a> Scanner<'a> {
    fn new(chars: &'a [char]) -> Self {
        Self {
            chars,
            comment_close: None,
        }
    }

    /// One past the end of the markup region opened at `start`, or `None`
    /// when the `<` is literal text.
    fn markup_end(&mut self, start: usize) -> Option<usize> {
        let chars = self.chars;
        let next = *chars.get(start + 1)?;
        match next {
            '!' if starts_with(chars, start + 1, "!--") => {
                self.find_comment_close(start + 4).map(|i| i + 3)
            }
            '!' | '?' => {
                for (offset, &c) in chars[start + 2..].iter().enumerate() {
                    match c {
                        '>' => return Some(start + 2 + offset + 1),
                        '<' => return None,
                        _ => {}
                    }
                }
                None
            }
            '/' => {
                if !chars.get(start + 2)?.is_ascii_alphabetic() {
                    return None;
                }
                tag_end(chars, start + 2)
            }
            c if c.is_ascii_alphabetic() => {
                let end = tag_end(chars, start + 1)?;
                let name = tag_name(chars, start + 1);
                let self_closing = end >= 2 && chars[end - 2] == '/';
                if !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                    // An unclosed script or style swallows the rest of the text
                    Some(closing_tag_end(chars, end, &name).unwrap_or(chars.len()))
                } else {
                    Some(end)
                }
            }
            _ => None,
        }
    }

    /// Index of the first `-->` at or after `from`
    fn find_comment_close(&mut self, from: usize) -> Option<usize> {
        if let Some((searched_from, found)) = self.comment_close {
            if searched_from <= from && found.map_or(true, |i| i >= from) {
                return found;
            }
        }
        let found = find_seq(self.chars, from, "-->");
        self.comment_close = Some((from, found));
        found
    }
}

/// Scans a tag body from `from` to its closing `>`, honouring quoted
/// attribute values. Returns the index one past `>`, or `None` when an
/// unquoted `<` or the end of the text comes first.
fn tag_end(chars: &[char], from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut prev_significant = ' ';
    for (offset, &c) in chars[from..].iter().enumerate() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '>' => return Some(from + offset + 1),
                '<' => return None,
                '"' | '\'' if prev_significant == '=' => quote = Some(c),
                _ => {}
            },
        }
        if !c.is_whitespace() {
            prev_significant = c;
        }
    }
    None
}

fn tag_name(chars: &[char], from: usize) -> String {
    chars[from..]
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric() || **c == '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// End of the first `</name ...>` at or after `from`
fn closing_tag_end(chars: &[char], from: usize, name: &str) -> Option<usize> {
    let mut i = from;
    while i + 1 < chars.len() {
        if chars[i] == '<' && chars[i + 1] == '/' && tag_name(chars, i + 2) == name {
            if let Some(end) = tag_end(chars, i + 2) {
                return Some(end);
            }
        }
        i += 1;
    }
    None
}

fn starts_with(chars: &[char], at: usize, needle: &str) -> bool {
    let mut idx = at;
    for n in needle.chars() {
        if chars.get(idx) != Some(&n) {
            return false;
        }
        idx += 1;
    }
    true
}

fn find_seq(chars: &[char], from: usize, needle: &str) -> Option<usize> {
    (from..chars.len()).find(|&i| starts_with(chars, i, needle))
}
