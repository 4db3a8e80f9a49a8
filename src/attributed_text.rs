//! Stage 1: Attributed Text — per-paragraph code-point buffer plus attribute spans (spec §4.A).
//!
//! This is the innermost layer: a [`Paragraph`](crate::rich_text::Paragraph) owns exactly one
//! `AttributedText`. It knows nothing about paragraph separators, global offsets, or other
//! paragraphs — that bookkeeping lives one layer up in [`crate::rich_text`].

use crate::attribute::{Attribute, AttributeKind, AttributeSpan, AttributeSpanFlags};
use crate::collaborators::LayoutProvider;
use crate::position::CodePoint;

/// A code-point buffer carrying overlapping attribute spans, scoped to one paragraph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributedText {
    /// The paragraph's code points.
    pub text: Vec<CodePoint>,
    /// Attribute spans over `text`, in paragraph-local offsets. Not required to be sorted.
    pub spans: Vec<AttributeSpan>,
}

impl AttributedText {
    /// An empty attributed text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct from code points with no spans.
    pub fn from_code_points(cps: Vec<CodePoint>) -> Self {
        Self { text: cps, spans: Vec::new() }
    }

    /// Append code points with no attributes.
    pub fn append(&mut self, cps: &[CodePoint]) {
        self.text.extend_from_slice(cps);
    }

    /// Append a sub-range `[range.start, range.end)` of `src`, carrying over any spans that
    /// intersect the copied range (re-based to the new local offsets).
    pub fn append_range(&mut self, src: &AttributedText, range: std::ops::Range<u32>) {
        let base = self.text.len() as u32;
        let range = range.start.min(src.text.len() as u32)..range.end.min(src.text.len() as u32);
        if range.start >= range.end {
            return;
        }
        self.text
            .extend_from_slice(&src.text[range.start as usize..range.end as usize]);
        for span in &src.spans {
            let lo = span.text_range.start.max(range.start);
            let hi = span.text_range.end.min(range.end);
            if lo >= hi {
                continue;
            }
            let mut new_span = span.clone();
            new_span.text_range = (base + lo - range.start)..(base + hi - range.start);
            self.spans.push(new_span);
        }
    }

    /// Append code points carrying a single attribute over the whole appended run.
    pub fn append_with_attribute(
        &mut self,
        cps: &[CodePoint],
        attribute: Attribute,
        flags: AttributeSpanFlags,
        payload: Option<Vec<u8>>,
    ) {
        let start = self.text.len() as u32;
        self.append(cps);
        let end = self.text.len() as u32;
        if end > start {
            let mut span = AttributeSpan::new(start..end, attribute).with_flags(flags);
            span.payload = payload;
            self.spans.push(span);
        }
    }

    /// Add an attribute span over `range`. Overlapping spans of the *same* kind may coexist
    /// after this call unless the caller has already cleared them (§4.A contract: a write may
    /// leave more than one span of a kind live; `clear_attribute` is what enforces singleton-ness).
    pub fn add_attribute(
        &mut self,
        range: std::ops::Range<u32>,
        attribute: Attribute,
        flags: AttributeSpanFlags,
        payload: Option<Vec<u8>>,
    ) {
        if range.start >= range.end {
            return;
        }
        let mut span = AttributeSpan::new(range, attribute).with_flags(flags);
        span.payload = payload;
        self.spans.push(span);
    }

    /// Remove/split spans of `attribute.kind` that intersect `range`, clipping survivors to lie
    /// outside it. This is what restores the "at most one span of a singleton kind per offset"
    /// invariant after a write.
    pub fn clear_attribute(&mut self, range: std::ops::Range<u32>, kind: AttributeKind) {
        if range.start >= range.end {
            return;
        }
        let mut result = Vec::with_capacity(self.spans.len());
        for span in self.spans.drain(..) {
            if span.attribute.kind != kind || span.text_range.end <= range.start || span.text_range.start >= range.end {
                result.push(span);
                continue;
            }
            if span.text_range.start < range.start {
                let mut left = span.clone();
                left.text_range.end = range.start;
                result.push(left);
            }
            if span.text_range.end > range.end {
                let mut right = span;
                right.text_range.start = range.end;
                result.push(right);
            }
        }
        self.spans = result;
    }

    /// Remove every span (any kind) intersecting `range`, clipping survivors.
    pub fn clear_all_attributes(&mut self, range: std::ops::Range<u32>) {
        if range.start >= range.end {
            return;
        }
        let mut result = Vec::with_capacity(self.spans.len());
        for span in self.spans.drain(..) {
            if span.text_range.end <= range.start || span.text_range.start >= range.end {
                result.push(span);
                continue;
            }
            if span.text_range.start < range.start {
                let mut left = span.clone();
                left.text_range.end = range.start;
                result.push(left);
            }
            if span.text_range.end > range.end {
                let mut right = span;
                right.text_range.start = range.end;
                result.push(right);
            }
        }
        self.spans = result;
    }

    /// Nearest grapheme boundary to `off`, via the layout collaborator.
    pub fn align_grapheme_offset(&self, provider: &dyn LayoutProvider, off: u32) -> u32 {
        provider.align_grapheme_offset(&self.text, off)
    }

    /// Next grapheme boundary at or after `off`.
    pub fn next_grapheme_offset(&self, provider: &dyn LayoutProvider, off: u32) -> u32 {
        provider.next_grapheme_offset(&self.text, off)
    }

    /// Previous grapheme boundary at or before `off`.
    pub fn prev_grapheme_offset(&self, provider: &dyn LayoutProvider, off: u32) -> u32 {
        provider.prev_grapheme_offset(&self.text, off)
    }

    /// Spans of `kind` that cover local offset `pos`.
    pub fn spans_at(&self, pos: u32, kind: AttributeKind) -> impl Iterator<Item = &AttributeSpan> {
        self.spans
            .iter()
            .filter(move |s| s.attribute.kind == kind && s.contains(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributePayload;

    fn letters(s: &str) -> Vec<CodePoint> {
        s.chars().map(|c| c as u32).collect()
    }

    #[test]
    fn clear_attribute_splits_overlapping_span() {
        let mut t = AttributedText::from_code_points(letters("hello world"));
        t.add_attribute(0..11, Attribute::flag(AttributeKind::FONT_WEIGHT), AttributeSpanFlags::empty(), None);
        t.clear_attribute(3..6, AttributeKind::FONT_WEIGHT);
        assert_eq!(t.spans.len(), 2);
        assert!(t.spans.iter().any(|s| s.text_range == (0..3)));
        assert!(t.spans.iter().any(|s| s.text_range == (6..11)));
    }

    #[test]
    fn append_range_carries_over_intersecting_spans() {
        let mut src = AttributedText::from_code_points(letters("hello"));
        src.add_attribute(0..5, Attribute::new(AttributeKind::FONT_SIZE, AttributePayload::Int(12)), AttributeSpanFlags::empty(), None);
        let mut dst = AttributedText::new();
        dst.append_range(&src, 1..4);
        assert_eq!(dst.text, letters("ell"));
        assert_eq!(dst.spans.len(), 1);
        assert_eq!(dst.spans[0].text_range, 0..3);
    }

    #[test]
    fn clear_all_attributes_removes_every_kind() {
        let mut t = AttributedText::from_code_points(letters("abc"));
        t.add_attribute(0..3, Attribute::flag(AttributeKind::FONT_WEIGHT), AttributeSpanFlags::empty(), None);
        t.add_attribute(0..3, Attribute::flag(AttributeKind::FONT_STYLE), AttributeSpanFlags::empty(), None);
        t.clear_all_attributes(1..2);
        assert_eq!(t.spans.len(), 4);
        assert!(t.spans.iter().all(|s| !(s.text_range.start < 2 && s.text_range.end > 1)));
    }
}
