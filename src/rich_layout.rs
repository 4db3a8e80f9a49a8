//! Stage 3: Rich Layout — an incrementally-rebuilt cache of laid-out paragraphs (spec §4.C).
//!
//! Re-layout is paragraph-granular: a paragraph is only handed back to the
//! [`LayoutProvider`](crate::collaborators::LayoutProvider) when its `version` no longer matches
//! the version this cache last laid it out under, or an IME composition overlay touches it.

use crate::attribute::{Attribute, AttributeKind};
use crate::collaborators::{
    CaretInfo, Direction, LaidLines, LayoutAttributes, LayoutParams, LayoutProvider, MovementType, Rect,
};
use crate::position::{Affinity, CodePoint, TextPosition};
use crate::rich_text::{ChangeDescriptor, RichText};

/// Maximum nesting depth tracked for ordered-list marker numbering (spec §4.C).
pub const MAX_COUNTER_LEVELS: usize = 8;

/// The laid-out state of one paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct LaidParagraph {
    /// The paragraph's visual lines and resolved direction.
    pub layout: LaidLines,
    /// The direction actually used for this paragraph (may have been inherited from paragraph 0).
    pub direction_used: Direction,
    /// Global code-point offset of this paragraph's first code point.
    pub global_text_offset: u32,
    /// Vertical offset of this paragraph's top edge within the whole document.
    pub offset_y: f32,
    /// The `RichText` paragraph version this layout was built from. `0` means "never laid out".
    pub version_used: u32,
    /// This paragraph's resolved ordered-list marker value (1-based), or 0 if not a list item.
    pub list_marker_counter: i32,
}

impl LaidParagraph {
    fn stale() -> Self {
        Self {
            layout: LaidLines { lines: Vec::new(), resolved_direction: Direction::Ltr },
            direction_used: Direction::Ltr,
            global_text_offset: 0,
            offset_y: 0.0,
            version_used: 0,
            list_marker_counter: 0,
        }
    }
}

/// The incremental layout cache over a whole [`RichText`].
#[derive(Debug, Clone, PartialEq)]
pub struct RichLayout {
    /// Per-paragraph laid-out state, index-aligned with the source `RichText`.
    pub paragraphs: Vec<LaidParagraph>,
    /// Overall document bounds.
    pub total_bounds: Rect,
    /// `LayoutParams::stable_hash()` this cache was last built under.
    params_hash: u64,
    /// The layout params' base attribute set (fallback for paragraph 0's attribute chain).
    flattened_layout_attrs: Vec<Attribute>,
}

impl Default for RichLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl RichLayout {
    /// An empty layout cache.
    pub fn new() -> Self {
        Self {
            paragraphs: Vec::new(),
            total_bounds: Rect::new(0.0, 0.0, 0.0, 0.0),
            params_hash: 0,
            flattened_layout_attrs: Vec::new(),
        }
    }

    /// Set the base attribute set paragraph 0 falls back to when one of its own attributes is
    /// absent (e.g. a document-wide default font).
    pub fn set_base_attributes(&mut self, attrs: Vec<Attribute>) {
        self.flattened_layout_attrs = attrs;
    }

    /// §4.C `apply_change`: a purely structural reshape in response to a [`ChangeDescriptor`] —
    /// no re-layout happens here, it only keeps this cache's paragraph count aligned with the
    /// source `RichText`'s so the next [`RichLayout::set_from_rich_text`] call can diff versions.
    pub fn apply_change(&mut self, change: &ChangeDescriptor) {
        // The paragraph at `start_paragraph_idx` is reused in place (its stale version will
        // force its own rebuild); only the paragraphs *after* it are structurally added/removed.
        let after_start = (change.start_paragraph_idx + 1).min(self.paragraphs.len());
        let end = (after_start + change.removed_paragraph_count).min(self.paragraphs.len());
        let replacement = std::iter::repeat_with(LaidParagraph::stale)
            .take(change.inserted_paragraph_count)
            .collect::<Vec<_>>();
        self.paragraphs.splice(after_start..end, replacement);
    }

    /// §4.C `set_from_rich_text`: rebuild every paragraph whose version is stale (or whose
    /// composition overlay changed), inheriting paragraph 0's resolved direction into every
    /// subsequent paragraph's attribute chain, and repacking vertical offsets.
    pub fn set_from_rich_text(
        &mut self,
        params: &LayoutParams,
        provider: &dyn LayoutProvider,
        rich_text: &RichText,
        ime: Option<(u32, &[CodePoint])>,
    ) {
        let hash = params.stable_hash();
        let force_all = hash != self.params_hash;
        self.params_hash = hash;

        if self.paragraphs.len() != rich_text.paragraphs.len() || force_all {
            self.paragraphs.resize_with(rich_text.paragraphs.len(), LaidParagraph::stale);
            if force_all {
                for p in &mut self.paragraphs {
                    p.version_used = 0;
                }
            }
        }

        let ime_paragraph_idx = ime.and_then(|(offset, _)| {
            rich_text
                .paragraphs
                .iter()
                .position(|p| offset >= p.global_text_offset && offset <= p.global_text_offset + p.len())
        });

        let mut first_direction: Option<Direction> = None;
        let mut counters = [0i32; MAX_COUNTER_LEVELS];
        let mut offset_y = 0.0f32;
        let mut max_width = 0.0f32;

        for (idx, para) in rich_text.paragraphs.iter().enumerate() {
            let indent_level = para
                .paragraph_attributes
                .iter()
                .find(|a| a.kind == AttributeKind::INDENT_LEVEL)
                .and_then(|a| match &a.payload {
                    crate::attribute::AttributePayload::Int(i) => Some(*i),
                    _ => None,
                })
                .unwrap_or(0)
                .clamp(0, MAX_COUNTER_LEVELS as i32 - 1) as usize;
            let is_list_item = para.paragraph_attributes.iter().any(|a| a.kind == AttributeKind::LIST_MARKER_STYLE);
            let list_marker_counter = if is_list_item {
                counters[indent_level] += 1;
                for level in counters.iter_mut().skip(indent_level + 1) {
                    *level = 0;
                }
                counters[indent_level]
            } else {
                for level in counters.iter_mut().skip(indent_level) {
                    *level = 0;
                }
                0
            };

            // Paragraph 0's resolved direction cascades to every later paragraph via
            // `DirectionOverride`; if it changed since this paragraph was last laid out, that
            // paragraph must be rebuilt even though its own version didn't bump.
            let new_direction = if idx == 0 { None } else { Some(first_direction.unwrap_or(Direction::Ltr)) };
            let direction_changed = new_direction.is_some_and(|d| d != self.paragraphs[idx].direction_used);
            let counter_changed = self.paragraphs[idx].list_marker_counter != list_marker_counter;
            let needs_rebuild = self.paragraphs[idx].version_used != para.version
                || Some(idx) == ime_paragraph_idx
                || direction_changed
                || counter_changed;

            if needs_rebuild {
                let mut text = para.content.text.clone();
                if Some(idx) == ime_paragraph_idx {
                    if let Some((global_offset, ime_text)) = ime {
                        let local = (global_offset - para.global_text_offset) as usize;
                        let local = local.min(text.len());
                        let mut spliced = text[..local].to_vec();
                        spliced.extend_from_slice(ime_text);
                        spliced.extend_from_slice(&text[local..]);
                        text = spliced;
                    }
                }

                let base = LayoutAttributes::Base(self.flattened_layout_attrs.clone());
                let own = LayoutAttributes::Paragraph {
                    own: para.paragraph_attributes.clone(),
                    parent: Box::new(base),
                };
                let attrs = if idx == 0 {
                    own
                } else {
                    LayoutAttributes::DirectionOverride {
                        direction: first_direction.unwrap_or(Direction::Ltr),
                        parent: Box::new(own),
                    }
                };

                let laid = provider.layout_paragraph(params, &text, &attrs);
                let direction_used = laid.resolved_direction;
                if idx == 0 {
                    first_direction = Some(direction_used);
                }
                max_width = max_width.max(laid.max_width());
                self.paragraphs[idx] = LaidParagraph {
                    layout: laid,
                    direction_used,
                    global_text_offset: para.global_text_offset,
                    offset_y,
                    version_used: para.version,
                    list_marker_counter,
                };
            } else {
                if idx == 0 {
                    first_direction = Some(self.paragraphs[0].direction_used);
                }
                max_width = max_width.max(self.paragraphs[idx].layout.max_width());
                self.paragraphs[idx].global_text_offset = para.global_text_offset;
                self.paragraphs[idx].offset_y = offset_y;
                self.paragraphs[idx].list_marker_counter = list_marker_counter;
            }

            offset_y += self.paragraphs[idx].layout.height();
        }

        self.total_bounds = Rect::new(0.0, 0.0, max_width, offset_y);
    }

    fn paragraph_index_for_y(&self, y: f32) -> usize {
        self.paragraphs
            .iter()
            .position(|p| y < p.offset_y + p.layout.height())
            .unwrap_or_else(|| self.paragraphs.len().saturating_sub(1))
    }

    /// §4.C `hit_test`: resolve a document-relative point to a global [`TextPosition`].
    pub fn hit_test(&self, provider: &dyn LayoutProvider, movement: MovementType, x: f32, y: f32) -> TextPosition {
        if self.paragraphs.is_empty() {
            return TextPosition::document_start();
        }
        let idx = self.paragraph_index_for_y(y);
        let para = &self.paragraphs[idx];
        let local_y = (y - para.offset_y).max(0.0);
        let mut line_idx = 0usize;
        let mut acc = 0.0f32;
        for (i, line) in para.layout.lines.iter().enumerate() {
            if local_y < acc + line.bounds.height {
                line_idx = i;
                break;
            }
            acc += line.bounds.height;
            line_idx = i;
        }
        let local_offset = provider.hit_test_at_line(&para.layout, movement, line_idx, x);
        TextPosition::new(para.global_text_offset + local_offset, Affinity::Trailing)
    }

    /// §4.C `caret_info`: caret geometry at a global `pos`/`affinity`, with the paragraph's
    /// `offset_y` folded into the Y coordinate.
    pub fn caret_info(&self, provider: &dyn LayoutProvider, rich_text: &RichText, pos: TextPosition) -> Option<CaretInfo> {
        let resolved = rich_text.resolve(provider, pos, crate::position::AffinityUsage::Ignore);
        let para = self.paragraphs.get(resolved.paragraph_idx)?;
        let mut info = provider.caret_info_at(&para.layout, resolved.local_offset, pos.affinity);
        info.y += para.offset_y;
        Some(info)
    }

    /// §4.C `iterate_range_bounds`: selection-rectangle fragments for a global `range`.
    pub fn iterate_range_bounds(
        &self,
        provider: &dyn LayoutProvider,
        rich_text: &RichText,
        range: std::ops::Range<u32>,
        cb: &mut dyn FnMut(Rect),
    ) {
        for (idx, para) in self.paragraphs.iter().enumerate() {
            let rt_para = &rich_text.paragraphs[idx];
            let para_range = rt_para.global_text_offset..(rt_para.global_text_offset + rt_para.len());
            let lo = range.start.max(para_range.start);
            let hi = range.end.min(para_range.end);
            if lo >= hi {
                continue;
            }
            let local = (lo - rt_para.global_text_offset)..(hi - rt_para.global_text_offset);
            provider.range_bounds_iter(&para.layout, local, para.offset_y, cb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributePayload;
    use crate::collaborators::test_support::TestLayoutProvider;

    fn cps(s: &str) -> Vec<CodePoint> {
        s.chars().map(|c| c as u32).collect()
    }

    fn default_params() -> LayoutParams {
        LayoutParams { width: 400.0, tab_width: 32.0, line_height_multiplier: 1.0 }
    }

    #[test]
    fn rebuilds_only_stale_paragraphs() {
        let provider = TestLayoutProvider::new();
        let params = default_params();
        let mut rt = RichText::new();
        rt.append_utf32(&cps("first\nsecond"), None, crate::attribute::AttributeSpanFlags::empty(), None);
        let mut layout = RichLayout::new();
        layout.set_from_rich_text(&params, &provider, &rt, None);
        let v0_before = layout.paragraphs[0].version_used;
        let v1_before = layout.paragraphs[1].version_used;

        rt.set_attribute(0..1, Attribute::new(AttributeKind::FONT_WEIGHT, AttributePayload::Int(700)), crate::attribute::AttributeSpanFlags::empty(), None);
        layout.set_from_rich_text(&params, &provider, &rt, None);

        assert_ne!(layout.paragraphs[0].version_used, v0_before);
        assert_eq!(layout.paragraphs[1].version_used, v1_before);
    }

    #[test]
    fn apply_change_keeps_paragraph_count_aligned() {
        let mut rt = RichText::from_code_points(&cps("abc"), None);
        let provider = TestLayoutProvider::new();
        let params = default_params();
        let mut layout = RichLayout::new();
        layout.set_from_rich_text(&params, &provider, &rt, None);

        let source = RichText::from_code_points(&cps("\n"), None);
        let change = rt.insert(2..2, Some(&source));
        layout.apply_change(&change);
        assert_eq!(layout.paragraphs.len(), rt.paragraphs.len());
        layout.set_from_rich_text(&params, &provider, &rt, None);
        assert_eq!(layout.paragraphs.len(), 2);
    }

    #[test]
    fn vertical_offsets_stack() {
        let mut rt = RichText::new();
        rt.append_utf32(&cps("a\nb\nc"), None, crate::attribute::AttributeSpanFlags::empty(), None);
        let provider = TestLayoutProvider::new();
        let params = default_params();
        let mut layout = RichLayout::new();
        layout.set_from_rich_text(&params, &provider, &rt, None);
        assert_eq!(layout.paragraphs[0].offset_y, 0.0);
        assert!(layout.paragraphs[1].offset_y > 0.0);
        assert!(layout.paragraphs[2].offset_y > layout.paragraphs[1].offset_y);
    }

    #[test]
    fn ime_overlay_forces_rebuild_without_mutating_rich_text() {
        let mut rt = RichText::from_code_points(&cps("ab"), None);
        let provider = TestLayoutProvider::new();
        let params = default_params();
        let mut layout = RichLayout::new();
        layout.set_from_rich_text(&params, &provider, &rt, None);
        let composing = cps("X");
        layout.set_from_rich_text(&params, &provider, &rt, Some((1, &composing)));
        assert_eq!(rt.paragraphs[0].content.text, cps("ab"));
        assert_eq!(layout.paragraphs[0].layout.lines[0].text_range.end, 3);
    }
}
