//! Stage 0: Attribute tags and spans (§3 "Attribute" / "Attribute span").
//!
//! Mirrors the teacher's tagged-id idiom (`intervals::StyleLayerId`): a newtype wrapping a raw
//! `u32` with named associated constants for the built-in kinds, so hosts can still define their
//! own custom attribute kinds without a closed enum.

use bitflags::bitflags;

/// Tag identifying what an [`Attribute`] means. A thin newtype over `u32`, following the same
/// "named constants over a raw id" idiom the teacher uses for `StyleLayerId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeKind(pub u32);

impl AttributeKind {
    /// Construct an attribute kind from a raw id (for host-defined custom kinds).
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Font family name.
    pub const FONT_FAMILY: Self = Self(1);
    /// Font size, in layout units.
    pub const FONT_SIZE: Self = Self(2);
    /// Font weight (100-900).
    pub const FONT_WEIGHT: Self = Self(3);
    /// Font style (normal / italic / oblique).
    pub const FONT_STYLE: Self = Self(4);
    /// Font stretch (condensed .. expanded).
    pub const FONT_STRETCH: Self = Self(5);
    /// BCP-47 language tag.
    pub const LANGUAGE: Self = Self(6);
    /// Text reading direction override.
    pub const DIRECTION: Self = Self(7);
    /// Vertical alignment within a line.
    pub const VERTICAL_ALIGN: Self = Self(8);
    /// Paragraph indent level.
    pub const INDENT_LEVEL: Self = Self(9);
    /// Ordered/unordered list marker style.
    pub const LIST_MARKER_STYLE: Self = Self(10);
    /// IME composition underline/highlight styling.
    pub const COMPOSITION_STYLE: Self = Self(11);

    /// A kind is a "singleton kind" if at most one span of that kind may be live at any offset
    /// after a write (§4.A contract). All built-in kinds except composition styling (which may
    /// legitimately stack with, say, a bold span) are singleton.
    pub fn is_singleton(self) -> bool {
        self != Self::COMPOSITION_STYLE
    }
}

/// The value carried by an [`Attribute`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttributePayload {
    /// No payload (kind alone is the value, e.g. a boolean toggle attribute).
    None,
    /// A small integer payload (e.g. font weight, indent level).
    Int(i32),
    /// A floating point payload (e.g. font size).
    Float(f32),
    /// A text payload (e.g. font family name, language tag).
    Text(String),
    /// An opaque byte payload for host-defined kinds.
    Bytes(Vec<u8>),
}

impl Default for AttributePayload {
    fn default() -> Self {
        Self::None
    }
}

/// A tagged attribute value. Two attributes *match* when their `kind` is equal.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// What this attribute means.
    pub kind: AttributeKind,
    /// The attribute's value.
    pub payload: AttributePayload,
}

impl Attribute {
    /// Construct an attribute with the given kind and payload.
    pub fn new(kind: AttributeKind, payload: AttributePayload) -> Self {
        Self { kind, payload }
    }

    /// Construct a payload-less attribute (e.g. a pure toggle).
    pub fn flag(kind: AttributeKind) -> Self {
        Self::new(kind, AttributePayload::None)
    }
}

bitflags! {
    /// Per-span behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttributeSpanFlags: u32 {
        /// Changes the containment test from `[start, end)` to `[start, end-1]` (the span's last
        /// code point is excluded from containment queries, but the span itself still occupies
        /// `end - start` code points structurally).
        const END_EXCLUSIVE = 1 << 0;
    }
}

/// A run of an [`Attribute`] over `[start, end)` paragraph-local code points (or `[start, end-1]`
/// when [`AttributeSpanFlags::END_EXCLUSIVE`] is set).
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpan {
    /// Paragraph-local half-open code-point range.
    pub text_range: std::ops::Range<u32>,
    /// The attribute value this span carries.
    pub attribute: Attribute,
    /// Span behavior flags.
    pub flags: AttributeSpanFlags,
    /// Optional owned payload blob (deep-copied whenever the owning paragraph is cloned).
    pub payload: Option<Vec<u8>>,
}

impl AttributeSpan {
    /// Construct a span over `text_range` carrying `attribute`.
    pub fn new(text_range: std::ops::Range<u32>, attribute: Attribute) -> Self {
        Self {
            text_range,
            attribute,
            flags: AttributeSpanFlags::empty(),
            payload: None,
        }
    }

    /// Builder: attach flags.
    pub fn with_flags(mut self, flags: AttributeSpanFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Builder: attach an owned payload blob.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Effective containment range, honoring [`AttributeSpanFlags::END_EXCLUSIVE`].
    fn effective_end(&self) -> u32 {
        if self.flags.contains(AttributeSpanFlags::END_EXCLUSIVE) {
            self.text_range.end.saturating_sub(1)
        } else {
            self.text_range.end
        }
    }

    /// `true` if this span covers local offset `pos`.
    pub fn contains(&self, pos: u32) -> bool {
        pos >= self.text_range.start && pos < self.effective_end()
    }

    /// Number of code points of `range` that this span covers.
    pub fn covered_len(&self, range: &std::ops::Range<u32>) -> u32 {
        let lo = self.text_range.start.max(range.start);
        let hi = self.effective_end().min(range.end);
        hi.saturating_sub(lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_exclusive_shrinks_containment_by_one() {
        let span = AttributeSpan::new(0..5, Attribute::flag(AttributeKind::FONT_WEIGHT))
            .with_flags(AttributeSpanFlags::END_EXCLUSIVE);
        assert!(span.contains(3));
        assert!(!span.contains(4));
        assert_eq!(span.covered_len(&(0..5)), 4);
    }

    #[test]
    fn plain_span_contains_half_open_range() {
        let span = AttributeSpan::new(2..4, Attribute::flag(AttributeKind::FONT_WEIGHT));
        assert!(!span.contains(1));
        assert!(span.contains(2));
        assert!(span.contains(3));
        assert!(!span.contains(4));
    }
}
