//! Stage 0: Text position primitives.
//!
//! The rich-text model is code-point indexed (§3): every externally visible offset is a count of
//! 32-bit Unicode scalar values into the *global* document, never a byte offset and never (by
//! itself) a grapheme count.

/// A single 32-bit Unicode scalar value, indexed (not byte-indexed) throughout the engine.
pub type CodePoint = u32;

/// Disambiguates the visual location of a caret sitting at a boundary between two clusters.
///
/// See spec §4.D for the full state-transition rules that produce each value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affinity {
    /// Anchored to the grapheme at `offset`, on the side from which reading proceeds.
    Trailing,
    /// Anchored to the grapheme at `offset - 1`, on the side to which reading proceeds. Used
    /// between runs of opposite bidi direction and as the canonical post-insert position.
    Leading,
    /// Start of a visual line.
    Sol,
    /// End of a visual line.
    Eol,
    /// Sentinel meaning "no affinity specified". Callers MUST NOT observe this on a stored
    /// selection; it exists only on change descriptors as a "suppress selection movement" marker.
    None,
}

/// A caret position: a global code-point offset plus disambiguating affinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextPosition {
    /// Global code-point offset into the document.
    pub offset: u32,
    /// Side-of-boundary disambiguation.
    pub affinity: Affinity,
}

impl TextPosition {
    /// Construct a position with the given offset and affinity.
    pub fn new(offset: u32, affinity: Affinity) -> Self {
        Self { offset, affinity }
    }

    /// A caret at the very start of the document.
    pub fn document_start() -> Self {
        Self::new(0, Affinity::Sol)
    }
}

/// An ordered pair of positions describing a selection (or, when `start == end`, a pure caret).
///
/// `end` is the *active* caret: the one keyboard/mouse motion moves. Ranges are not required to
/// be offset-ordered; use [`TextRange::ordered`] for an offset-ordered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    /// Selection start (anchor side).
    pub start: TextPosition,
    /// Selection end (active caret).
    pub end: TextPosition,
}

impl TextRange {
    /// A pure caret at `pos` (zero-length selection).
    pub fn caret(pos: TextPosition) -> Self {
        Self { start: pos, end: pos }
    }

    /// `true` if this is a pure caret (no selection).
    pub fn is_caret(&self) -> bool {
        self.start.offset == self.end.offset
    }

    /// Lowest and highest global offsets spanned by this range, offset-ordered (not
    /// visual-direction-ordered — see spec §3 for the distinction; offset order is sufficient
    /// for every text-mutation use in this crate).
    pub fn offset_ordered(&self) -> (TextPosition, TextPosition) {
        if self.start.offset <= self.end.offset {
            (self.start, self.end)
        } else {
            (self.end, self.start)
        }
    }

    /// The half-open code-point range `[lo, hi)` this selection spans.
    pub fn as_offset_range(&self) -> std::ops::Range<u32> {
        let (lo, hi) = self.offset_ordered();
        lo.offset..hi.offset
    }
}

/// Whether a grapheme-rounding step should additionally apply the affinity-driven
/// "advance past a leading/EOL caret" rule used by [`crate::rich_text::RichText::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffinityUsage {
    /// Apply the affinity-driven adjustment (step 4 of §4.B `resolve`).
    Use,
    /// Ignore affinity; return the raw grapheme-aligned local offset.
    Ignore,
}

/// The result of resolving a global [`TextPosition`] against a [`crate::rich_text::RichText`]:
/// which paragraph it falls in, and both its paragraph-local and (recomputed) global offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParagraphPosition {
    /// Index of the owning paragraph.
    pub paragraph_idx: usize,
    /// Code-point offset local to that paragraph.
    pub local_offset: u32,
    /// Global code-point offset (== paragraph's `global_text_offset + local_offset`).
    pub global_offset: u32,
}
