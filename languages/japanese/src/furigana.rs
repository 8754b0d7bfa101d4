use unicode_normalization::UnicodeNormalization;
use yomi_types::{FuriganaInfo, Point, Rect, TextSegment, Token};

use crate::script::{contains_kanji, katakana_to_hiragana};

pub const DEFAULT_RUBY_OFFSET: i32 = 5;

/// Turns tokens into ruby annotations for the overlay
#[derive(Debug, Clone, Copy)]
pub struct FuriganaMapper {
    ruby_offset: i32,
}

impl Default for FuriganaMapper {
    fn default() -> Self {
        Self::new(DEFAULT_RUBY_OFFSET)
    }
}

impl FuriganaMapper {
    pub fn new(ruby_offset: i32) -> Self {
        Self { ruby_offset }
    }

    /// One entry per token, ruby only for tokens with kanji and a known reading
    pub fn map(&self, tokens: &[Token]) -> Vec<FuriganaInfo> {
        tokens
            .iter()
            .map(|token| {
                let reading = katakana_to_hiragana(&token.reading);
                let needs_ruby = contains_kanji(&token.surface) && !reading.is_empty();
                FuriganaInfo {
                    base_text: token.surface.clone(),
                    reading,
                    position: Point::new(token.bbox.x, token.bbox.y),
                    ruby_position: Point::new(token.bbox.x, token.bbox.y - self.ruby_offset),
                    needs_ruby,
                }
            })
            .collect()
    }
}

/// Give tokens a bounding box from the segments their text came from
///
/// `segments` must be in reading order. Each segment's width is split evenly
/// over its characters, then the cells are carried through NFKC so they line
/// up with tokenizer output. Tokens are matched in order by character count,
/// whitespace ignored on both sides. Tokens past the end of the segment text
/// keep their box.
pub fn place_tokens(tokens: &mut [Token], segments: &[TextSegment]) {
    let cells: Vec<Rect> = segments.iter().flat_map(normalized_cells).collect();

    let mut cursor = 0;
    for token in tokens.iter_mut() {
        let len = token.surface.chars().filter(|c| !c.is_whitespace()).count();
        if len == 0 {
            continue;
        }
        let Some(span) = cells.get(cursor..cursor + len) else {
            break;
        };
        if let Some(bbox) = span.iter().copied().reduce(union) {
            token.bbox = bbox;
        }
        cursor += len;
    }
}

/// One cell per non-whitespace character of the segment's NFKC form
///
/// Characters that fold into the previous one (half-width voicing marks)
/// widen its cell, expansions share the cell of their source character.
fn normalized_cells(segment: &TextSegment) -> Vec<Rect> {
    let chars: Vec<char> = segment
        .text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let count = chars.len().max(1) as i32;
    let bbox = segment.bbox;

    let mut cells: Vec<Rect> = Vec::with_capacity(chars.len());
    let mut prefix = String::new();
    for (i, c) in chars.iter().enumerate() {
        let i = i as i32;
        let left = bbox.x + bbox.width * i / count;
        let right = bbox.x + bbox.width * (i + 1) / count;
        let cell = Rect::new(left, bbox.y, (right - left).max(1), bbox.height);

        prefix.push(*c);
        let normalized = prefix.nfkc().filter(|n| !n.is_whitespace()).count();
        if normalized > cells.len() {
            cells.resize(normalized, cell);
        } else if let Some(last) = cells.last_mut() {
            *last = union(*last, cell);
        }
    }
    cells
}

fn union(a: Rect, b: Rect) -> Rect {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    Rect::new(x, y, a.right().max(b.right()) - x, a.bottom().max(b.bottom()) - y)
}
