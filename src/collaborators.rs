//! External collaborator contracts (spec §6).
//!
//! The core does not implement font collection, glyph shaping, the grapheme/script property
//! oracle, the line-breaker, or the bidirectional-algorithm resolver. It consumes a small set of
//! trait-shaped interfaces instead, mirroring how the teacher's `LayoutEngine` is itself a
//! self-contained collaborator that `commands::EditorCore` drives through a narrow method surface
//! rather than reaching into its internals.

use crate::attribute::Attribute;
use crate::position::{Affinity, CodePoint};

/// Paragraph reading direction, as resolved by the bidi collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Left-to-right.
    Ltr,
    /// Right-to-left.
    Rtl,
}

impl Direction {
    /// `true` if this direction is right-to-left.
    pub fn is_rtl(self) -> bool {
        matches!(self, Direction::Rtl)
    }
}

/// An axis-aligned rectangle in layout units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Rect {
    /// Construct a rectangle.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Bottom edge (`y + height`).
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Caret geometry returned by the layout collaborator, with the paragraph's vertical offset
/// folded in by [`crate::rich_layout::RichLayout::caret_info`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaretInfo {
    /// Caret X coordinate.
    pub x: f32,
    /// Caret Y coordinate (top).
    pub y: f32,
    /// Ascender extent above the baseline.
    pub ascender: f32,
    /// Descender extent below the baseline.
    pub descender: f32,
    /// Caret slope (0.0 for upright, nonzero for italic caret shear).
    pub slope: f32,
    /// Direction of the run the caret sits in.
    pub direction: Direction,
}

/// How an X-coordinate hit-test on a line should round to a code-point offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementType {
    /// Round to the nearest grapheme boundary.
    Character,
    /// Round to the nearest word boundary.
    Word,
}

/// One laid-out visual line within a paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct LaidLine {
    /// Paragraph-local code-point range covered by this line.
    pub text_range: std::ops::Range<u32>,
    /// Local offset of the last grapheme on the line (used for EOL snapping).
    pub last_grapheme_offset: u32,
    /// Line bounds, relative to the paragraph's own origin (before `offset_y` is added).
    pub bounds: Rect,
    /// Ascender extent.
    pub ascender: f32,
    /// Descender extent.
    pub descender: f32,
}

/// The result of laying out one paragraph: its visual lines plus the resolved reading direction.
#[derive(Debug, Clone, PartialEq)]
pub struct LaidLines {
    /// Visual lines, in paragraph order.
    pub lines: Vec<LaidLine>,
    /// Bidi-resolved paragraph direction.
    pub resolved_direction: Direction,
}

impl LaidLines {
    /// Total paragraph height (sum of line heights from the lines' own bounds).
    pub fn height(&self) -> f32 {
        self.lines.iter().map(|l| l.bounds.height).sum()
    }

    /// Maximum line width.
    pub fn max_width(&self) -> f32 {
        self.lines
            .iter()
            .map(|l| l.bounds.width)
            .fold(0.0_f32, f32::max)
    }

    /// Index of the line containing local offset `pos`, clamped to the last line.
    pub fn line_index_for_offset(&self, pos: u32) -> usize {
        self.lines
            .iter()
            .position(|l| pos < l.text_range.end || l.text_range.end == l.text_range.start)
            .unwrap_or_else(|| self.lines.len().saturating_sub(1))
    }
}

/// Parameters controlling a layout pass (e.g. container width). Treated as an opaque,
/// `PartialEq`-comparable bag by the core; only its hash is used for cache invalidation (§4.C).
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    /// Available width for line wrapping.
    pub width: f32,
    /// Tab stop width, in layout units.
    pub tab_width: f32,
    /// Line height multiplier applied on top of font metrics.
    pub line_height_multiplier: f32,
}

impl LayoutParams {
    /// A stable hash of the params, used by [`crate::rich_layout::RichLayout`] to decide whether
    /// every paragraph must be invalidated. `f32` has no `Hash` impl, so fields are hashed via
    /// their bit patterns.
    pub fn stable_hash(&self) -> u64 {
        let mut h = 0xcbf29ce484222325u64; // FNV offset basis
        for bits in [
            self.width.to_bits(),
            self.tab_width.to_bits(),
            self.line_height_multiplier.to_bits(),
        ] {
            h ^= bits as u64;
            h = h.wrapping_mul(0x100000001b3); // FNV prime
        }
        h
    }
}

/// A resolved attribute chain used to lay out a paragraph (§4.C step 1): an optional direction
/// override (inherited from paragraph 0) layered on top of the paragraph's own attributes, which
/// in turn fall back to the layout params' base attributes for paragraph 0.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutAttributes {
    /// The root of the chain: the layout params' base attribute set (used by paragraph 0).
    Base(Vec<Attribute>),
    /// A paragraph's own attributes, falling back to `parent` (the layout params' base set) when
    /// a kind is absent.
    Paragraph {
        /// This paragraph's own attributes.
        own: Vec<Attribute>,
        /// Fallback chain.
        parent: Box<LayoutAttributes>,
    },
    /// A direction override layered on top of `parent` (a paragraph's own [`LayoutAttributes::Paragraph`]).
    /// Used for paragraphs after the first, which inherit paragraph 0's resolved direction.
    DirectionOverride {
        /// The inherited direction.
        direction: Direction,
        /// The paragraph's own attribute chain.
        parent: Box<LayoutAttributes>,
    },
}

impl LayoutAttributes {
    /// Resolve the first attribute of `kind`, walking the chain from the top override down to the
    /// base set.
    pub fn resolve(&self, kind: crate::attribute::AttributeKind) -> Option<&Attribute> {
        match self {
            LayoutAttributes::Base(attrs) => attrs.iter().find(|a| a.kind == kind),
            LayoutAttributes::Paragraph { own, parent } => own
                .iter()
                .find(|a| a.kind == kind)
                .or_else(|| parent.resolve(kind)),
            LayoutAttributes::DirectionOverride { direction: _, parent } => {
                if kind == crate::attribute::AttributeKind::DIRECTION {
                    // The override itself answers direction queries directly via
                    // `resolved_direction_override`; attribute lookups still fall through to the
                    // paragraph's own chain so an explicit per-paragraph direction attribute wins.
                    parent.resolve(kind)
                } else {
                    parent.resolve(kind)
                }
            }
        }
    }

    /// The inherited direction override, if any (only set on paragraphs after the first).
    pub fn direction_override(&self) -> Option<Direction> {
        match self {
            LayoutAttributes::DirectionOverride { direction, .. } => Some(*direction),
            _ => None,
        }
    }
}

/// Font handle, opaque to the core; owned and interpreted only by the font collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontHandle(pub u64);

/// Font vertical metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    /// Ascender extent above the baseline.
    pub ascender: f32,
    /// Descender extent below the baseline.
    pub descender: f32,
}

/// Font caret metrics (used for italic caret shear).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaretMetrics {
    /// Caret slope; 0.0 for upright fonts.
    pub slope: f32,
}

/// A font-matching query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontQuery {
    /// BCP-47 language tag.
    pub lang: Option<String>,
    /// Script tag.
    pub script: Option<String>,
    /// Requested family name.
    pub family: Option<String>,
    /// Requested weight.
    pub weight: u16,
    /// Requested style (0 = normal, 1 = italic, 2 = oblique).
    pub style: u8,
    /// Requested stretch (100 = normal).
    pub stretch: u16,
}

/// The layout collaborator contract (spec §6): `layout_paragraph` plus the grapheme/word
/// property and hit-testing queries the caret engine needs.
pub trait LayoutProvider {
    /// Lay out one paragraph's text under `attrs`, producing lines and the resolved direction.
    fn layout_paragraph(
        &self,
        params: &LayoutParams,
        text: &[CodePoint],
        attrs: &LayoutAttributes,
    ) -> LaidLines;

    /// Next grapheme-cluster boundary at or after `offset` (paragraph-local).
    fn next_grapheme_offset(&self, text: &[CodePoint], offset: u32) -> u32;

    /// Previous grapheme-cluster boundary at or before `offset` (paragraph-local).
    fn prev_grapheme_offset(&self, text: &[CodePoint], offset: u32) -> u32;

    /// Nearest grapheme-cluster boundary to `offset` (paragraph-local).
    fn align_grapheme_offset(&self, text: &[CodePoint], offset: u32) -> u32;

    /// Next word boundary at or after `offset`, honoring `behavior`.
    fn next_word_offset(&self, text: &[CodePoint], offset: u32, behavior: WordBoundaryStyle) -> u32;

    /// Previous word boundary at or before `offset`, honoring `behavior`.
    fn prev_word_offset(&self, text: &[CodePoint], offset: u32, behavior: WordBoundaryStyle) -> u32;

    /// Resolved bidi direction of the run containing paragraph-local `pos`.
    fn get_text_direction_at(&self, laid: &LaidLines, pos: u32) -> Direction;

    /// Hit-test an X coordinate on visual line `line_idx`, returning a paragraph-local offset.
    fn hit_test_at_line(
        &self,
        laid: &LaidLines,
        movement: MovementType,
        line_idx: usize,
        x: f32,
    ) -> u32;

    /// Caret geometry (paragraph-relative) at paragraph-local `pos`/`affinity`.
    fn caret_info_at(&self, laid: &LaidLines, pos: u32, affinity: Affinity) -> CaretInfo;

    /// Iterate selection-rectangle fragments for paragraph-local `range` on visual lines,
    /// invoking `cb` with each rectangle (`offset_y` already added).
    fn range_bounds_iter(
        &self,
        laid: &LaidLines,
        range: std::ops::Range<u32>,
        offset_y: f32,
        cb: &mut dyn FnMut(Rect),
    );
}

/// Selects which platform's word/line motion rules apply (spec §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordBoundaryStyle {
    /// Default/Windows: forward stops just after trailing whitespace; backward symmetric.
    Default,
    /// macOS: forward skips leading whitespace/punctuation then stops at word end; backward
    /// skips whitespace/punctuation then stops at word start.
    MacOs,
}

/// The font collaborator contract (spec §6).
pub trait FontProvider {
    /// Vertical metrics for a font handle.
    fn font_metrics(&self, handle: FontHandle) -> FontMetrics;

    /// Caret metrics (slope) for a font handle.
    fn caret_metrics(&self, handle: FontHandle) -> CaretMetrics;

    /// Resolve a font query to zero or more candidate handles, in preference order.
    fn match_fonts(&self, query: &FontQuery) -> Vec<FontHandle>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    //! A reference [`LayoutProvider`]/[`FontProvider`] pair used only by this crate's own unit
    //! tests. Production hosts supply a real shaper/bidi backend; this double exists so the
    //! engine's caret/layout logic can be exercised against realistic grapheme clusters (emoji,
    //! combining marks, RIS flag pairs) without pulling a shaping stack into the production
    //! dependency graph.
    use super::*;
    use unicode_segmentation::UnicodeSegmentation;

    fn to_string(text: &[CodePoint]) -> String {
        text.iter().filter_map(|&cp| char::from_u32(cp)).collect()
    }

    fn char_offset_to_byte(text: &str, offset: usize) -> usize {
        text.char_indices()
            .nth(offset)
            .map(|(b, _)| b)
            .unwrap_or(text.len())
    }

    fn byte_to_char_offset(text: &str, byte: usize) -> usize {
        text[..byte.min(text.len())].chars().count()
    }

    /// A single-line-per-paragraph layout provider: no soft wrapping, LTR only unless the text
    /// starts with a strong-RTL Hebrew/Arabic letter (a deliberately crude heuristic, sufficient
    /// for exercising the direction-aware caret rules in tests).
    pub struct TestLayoutProvider;

    impl TestLayoutProvider {
        /// Construct the test double.
        pub fn new() -> Self {
            Self
        }

        fn is_strong_rtl(cp: u32) -> bool {
            (0x0590..=0x08FF).contains(&cp) || (0xFB1D..=0xFDFF).contains(&cp)
        }
    }

    impl Default for TestLayoutProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl LayoutProvider for TestLayoutProvider {
        fn layout_paragraph(
            &self,
            _params: &LayoutParams,
            text: &[CodePoint],
            _attrs: &LayoutAttributes,
        ) -> LaidLines {
            let direction = if text.iter().any(|&cp| Self::is_strong_rtl(cp)) {
                Direction::Rtl
            } else {
                Direction::Ltr
            };
            let last_grapheme_offset = self.prev_grapheme_offset(text, text.len() as u32);
            LaidLines {
                lines: vec![LaidLine {
                    text_range: 0..text.len() as u32,
                    last_grapheme_offset,
                    bounds: Rect::new(0.0, 0.0, text.len() as f32 * 8.0, 16.0),
                    ascender: 12.0,
                    descender: 4.0,
                }],
                resolved_direction: direction,
            }
        }

        fn next_grapheme_offset(&self, text: &[CodePoint], offset: u32) -> u32 {
            let s = to_string(text);
            let byte = char_offset_to_byte(&s, offset as usize);
            let mut next = s.len();
            for (b, _) in s.grapheme_indices(true) {
                if b > byte {
                    next = b;
                    break;
                }
            }
            byte_to_char_offset(&s, next) as u32
        }

        fn prev_grapheme_offset(&self, text: &[CodePoint], offset: u32) -> u32 {
            let s = to_string(text);
            let byte = char_offset_to_byte(&s, offset as usize);
            let mut prev = 0;
            for (b, _) in s.grapheme_indices(true) {
                if b >= byte {
                    break;
                }
                prev = b;
            }
            byte_to_char_offset(&s, prev) as u32
        }

        fn align_grapheme_offset(&self, text: &[CodePoint], offset: u32) -> u32 {
            let s = to_string(text);
            let byte = char_offset_to_byte(&s, offset as usize);
            let mut aligned = 0;
            for (b, _) in s.grapheme_indices(true) {
                if b <= byte {
                    aligned = b;
                } else {
                    break;
                }
            }
            byte_to_char_offset(&s, aligned) as u32
        }

        fn next_word_offset(
            &self,
            text: &[CodePoint],
            offset: u32,
            behavior: WordBoundaryStyle,
        ) -> u32 {
            let s = to_string(text);
            let byte = char_offset_to_byte(&s, offset as usize);
            let bounds: Vec<(usize, &str)> = s.split_word_bound_indices().collect();
            match behavior {
                WordBoundaryStyle::Default => {
                    // Stop just after the trailing whitespace of a word: the first boundary
                    // after a non-whitespace word whose following run is whitespace (or EOF).
                    let mut i = 0;
                    while i < bounds.len() && bounds[i].0 <= byte {
                        i += 1;
                    }
                    while i < bounds.len() && bounds[i].1.trim().is_empty() {
                        i += 1;
                    }
                    let end = bounds.get(i).map(|(b, _)| *b).unwrap_or(s.len());
                    byte_to_char_offset(&s, end) as u32
                }
                WordBoundaryStyle::MacOs => {
                    let mut i = 0;
                    while i < bounds.len() && bounds[i].0 <= byte {
                        i += 1;
                    }
                    while i < bounds.len() && is_skippable(bounds[i].1) {
                        i += 1;
                    }
                    i += 1; // consume the word itself
                    let end = bounds.get(i).map(|(b, _)| *b).unwrap_or(s.len());
                    byte_to_char_offset(&s, end) as u32
                }
            }
        }

        fn prev_word_offset(
            &self,
            text: &[CodePoint],
            offset: u32,
            behavior: WordBoundaryStyle,
        ) -> u32 {
            let s = to_string(text);
            let byte = char_offset_to_byte(&s, offset as usize);
            let bounds: Vec<(usize, &str)> = s.split_word_bound_indices().collect();
            let mut i = bounds.len();
            while i > 0 && bounds[i - 1].0 >= byte {
                i -= 1;
            }
            match behavior {
                WordBoundaryStyle::Default => {
                    let start = bounds.get(i.saturating_sub(1)).map(|(b, _)| *b).unwrap_or(0);
                    byte_to_char_offset(&s, start) as u32
                }
                WordBoundaryStyle::MacOs => {
                    while i > 0 && is_skippable(bounds[i - 1].1) {
                        i -= 1;
                    }
                    let start = bounds.get(i.saturating_sub(1)).map(|(b, _)| *b).unwrap_or(0);
                    byte_to_char_offset(&s, start) as u32
                }
            }
        }

        fn get_text_direction_at(&self, laid: &LaidLines, _pos: u32) -> Direction {
            laid.resolved_direction
        }

        fn hit_test_at_line(
            &self,
            laid: &LaidLines,
            _movement: MovementType,
            line_idx: usize,
            x: f32,
        ) -> u32 {
            let Some(line) = laid.lines.get(line_idx) else {
                return 0;
            };
            let len = (line.text_range.end - line.text_range.start) as f32;
            if len <= 0.0 {
                return line.text_range.start;
            }
            let frac = (x / 8.0).round().clamp(0.0, len);
            line.text_range.start + frac as u32
        }

        fn caret_info_at(&self, laid: &LaidLines, pos: u32, _affinity: Affinity) -> CaretInfo {
            let line = laid.lines.first();
            let (ascender, descender) = line.map(|l| (l.ascender, l.descender)).unwrap_or((12.0, 4.0));
            CaretInfo {
                x: pos as f32 * 8.0,
                y: 0.0,
                ascender,
                descender,
                slope: 0.0,
                direction: laid.resolved_direction,
            }
        }

        fn range_bounds_iter(
            &self,
            laid: &LaidLines,
            range: std::ops::Range<u32>,
            offset_y: f32,
            cb: &mut dyn FnMut(Rect),
        ) {
            let height = laid.lines.first().map(|l| l.bounds.height).unwrap_or(16.0);
            let x0 = range.start as f32 * 8.0;
            let x1 = range.end as f32 * 8.0;
            if x1 > x0 {
                cb(Rect::new(x0, offset_y, x1 - x0, height));
            }
        }
    }

    fn is_skippable(s: &str) -> bool {
        s.chars().all(|c| c.is_whitespace() || c.is_ascii_punctuation())
    }

    impl FontProvider for TestLayoutProvider {
        fn font_metrics(&self, _handle: FontHandle) -> FontMetrics {
            FontMetrics { ascender: 12.0, descender: 4.0 }
        }

        fn caret_metrics(&self, _handle: FontHandle) -> CaretMetrics {
            CaretMetrics { slope: 0.0 }
        }

        fn match_fonts(&self, _query: &FontQuery) -> Vec<FontHandle> {
            vec![FontHandle(0)]
        }
    }
}
