//! Stage 2: Rich Text — an ordered sequence of paragraphs with global-offset indexing (spec §4.B).
//!
//! This is the workhorse of the whole engine: every structural edit funnels through
//! [`RichText::insert`], a 3-way merge of (start-paragraph prefix, source paragraphs,
//! end-paragraph suffix) that keeps paragraph segmentation, attribute spans, and global offsets
//! consistent in one pass.

use crate::attribute::{Attribute, AttributeKind, AttributeSpanFlags};
use crate::attributed_text::AttributedText;
use crate::collaborators::LayoutProvider;
use crate::line_ending::ends_with_paragraph_separator;
use crate::position::{Affinity, AffinityUsage, CodePoint, ParagraphPosition, TextPosition};

/// One paragraph: a code-point buffer with spans, plus paragraph-level attributes and the
/// bookkeeping fields that make it addressable globally (spec §3 "Paragraph").
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    /// The paragraph's text and attribute spans.
    pub content: AttributedText,
    /// Paragraph-level attributes (indent level, list marker style, paragraph direction, ...).
    pub paragraph_attributes: Vec<Attribute>,
    /// Code-point offset of this paragraph's first code point in the document.
    pub global_text_offset: u32,
    /// Strictly increases on every mutation; the layout cache's invalidation key.
    pub version: u32,
}

impl Paragraph {
    fn empty() -> Self {
        Self {
            content: AttributedText::new(),
            paragraph_attributes: Vec::new(),
            global_text_offset: 0,
            version: 0,
        }
    }

    /// Number of code points in this paragraph (including its terminating separator, if any).
    pub fn len(&self) -> u32 {
        self.content.text.len() as u32
    }

    /// `true` if this paragraph has no code points.
    pub fn is_empty(&self) -> bool {
        self.content.text.is_empty()
    }

    /// `true` if this paragraph does *not* end with a paragraph separator (only legal for the
    /// last paragraph in a [`RichText`]).
    pub fn is_open(&self) -> bool {
        !ends_with_paragraph_separator(&self.content.text)
    }

    fn first_attribute(&self, kind: AttributeKind) -> Option<&Attribute> {
        self.paragraph_attributes.iter().find(|a| a.kind == kind)
    }
}

/// A summary of a mutation, sufficient for [`crate::rich_layout::RichLayout`] to reshape its
/// paragraph vector without re-reading the whole document (spec §4.B "Change descriptor").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeDescriptor {
    /// Index of the first paragraph touched by the edit.
    pub start_paragraph_idx: usize,
    /// How many paragraphs *after* `start_paragraph_idx` (which is always reused/mutated in
    /// place, never itself counted here) were consumed by the edit.
    pub removed_paragraph_count: usize,
    /// How many *additional* paragraph slots (beyond the reused `start_paragraph_idx` slot) the
    /// edit introduces.
    pub inserted_paragraph_count: usize,
    /// The caret the editor should adopt after the edit. `affinity == Affinity::None` suppresses
    /// selection movement (used for pure attribute edits).
    pub edit_end_position: TextPosition,
}

/// An ordered sequence of paragraphs plus a monotonic version counter (spec §3 "Rich text").
#[derive(Debug, Clone, PartialEq)]
pub struct RichText {
    /// The document's paragraphs, in order.
    pub paragraphs: Vec<Paragraph>,
    /// Monotonically increasing counter; the source of every paragraph's `version` stamp.
    pub version_counter: u32,
}

impl Default for RichText {
    fn default() -> Self {
        Self::new()
    }
}

impl RichText {
    /// A document containing a single empty, open paragraph.
    pub fn new() -> Self {
        Self {
            paragraphs: vec![Paragraph::empty()],
            version_counter: 0,
        }
    }

    /// Build a rich text from plain code points, with `attribute` (if any) applied to the whole
    /// run and paragraphs split on separators. Mainly useful for tests and for synthesizing the
    /// `source_rich_text` argument to [`RichText::insert`] from plain pasted/typed text.
    pub fn from_code_points(cps: &[CodePoint], attribute: Option<Attribute>) -> Self {
        let mut rt = Self::new();
        rt.append_utf32(cps, attribute, AttributeSpanFlags::empty(), None);
        rt
    }

    fn next_version(&mut self) -> u32 {
        self.version_counter = self.version_counter.wrapping_add(1);
        self.version_counter
    }

    /// Total code-point length of the document.
    pub fn total_len(&self) -> u32 {
        self.paragraphs.last().map(|p| p.global_text_offset + p.len()).unwrap_or(0)
    }

    fn recompute_offsets_from(&mut self, from_idx: usize) {
        let mut offset = if from_idx == 0 {
            0
        } else {
            self.paragraphs[from_idx - 1].global_text_offset + self.paragraphs[from_idx - 1].len()
        };
        for p in &mut self.paragraphs[from_idx..] {
            p.global_text_offset = offset;
            offset += p.len();
        }
    }

    /// Binary-search the owning paragraph index for global offset `offset`.
    fn paragraph_index_for_offset(&self, offset: u32) -> usize {
        match self
            .paragraphs
            .binary_search_by_key(&offset, |p| p.global_text_offset)
        {
            Ok(idx) => idx,
            Err(insert_idx) => insert_idx.saturating_sub(1).min(self.paragraphs.len() - 1),
        }
    }

    /// §4.B "Paragraph position resolution": resolve a global [`TextPosition`] into the owning
    /// paragraph, its local offset, and a grapheme-aligned global offset.
    pub fn resolve(
        &self,
        provider: &dyn LayoutProvider,
        pos: TextPosition,
        usage: AffinityUsage,
    ) -> ParagraphPosition {
        let total = self.total_len();
        if pos.offset == 0 || self.paragraphs.is_empty() {
            return ParagraphPosition { paragraph_idx: 0, local_offset: 0, global_offset: 0 };
        }
        if pos.offset >= total {
            let idx = self.paragraphs.len() - 1;
            let local = self.paragraphs[idx].len();
            return ParagraphPosition { paragraph_idx: idx, local_offset: local, global_offset: total };
        }

        let idx = self.paragraph_index_for_offset(pos.offset);
        let para = &self.paragraphs[idx];
        let mut local = pos.offset - para.global_text_offset;
        local = provider.align_grapheme_offset(&para.content.text, local);

        if matches!(usage, AffinityUsage::Use) && matches!(pos.affinity, Affinity::Leading | Affinity::Eol) {
            let advanced = provider.next_grapheme_offset(&para.content.text, local);
            if advanced > para.len() {
                local = para.len();
            } else {
                local = advanced;
            }
            if local >= para.len() && matches!(pos.affinity, Affinity::Leading) && idx + 1 < self.paragraphs.len() {
                return ParagraphPosition {
                    paragraph_idx: idx + 1,
                    local_offset: 0,
                    global_offset: self.paragraphs[idx + 1].global_text_offset,
                };
            }
        }

        ParagraphPosition {
            paragraph_idx: idx,
            local_offset: local,
            global_offset: para.global_text_offset + local,
        }
    }

    /// §4.B `append_paragraph`.
    pub fn append_paragraph(&mut self, attrs: Vec<Attribute>) -> ChangeDescriptor {
        let last_idx = self.paragraphs.len() - 1;
        if self.paragraphs[last_idx].is_open() {
            let v = self.next_version();
            self.paragraphs[last_idx].content.append(&[0x000A]);
            self.paragraphs[last_idx].version = v;
        }
        let new_idx = self.paragraphs.len();
        let v = self.next_version();
        self.paragraphs.push(Paragraph {
            content: AttributedText::new(),
            paragraph_attributes: attrs,
            global_text_offset: 0,
            version: v,
        });
        self.recompute_offsets_from(last_idx);

        ChangeDescriptor {
            start_paragraph_idx: last_idx,
            removed_paragraph_count: 0,
            inserted_paragraph_count: 1,
            edit_end_position: TextPosition::new(self.paragraphs[new_idx].global_text_offset, Affinity::Trailing),
        }
    }

    /// §4.B `append_utf32`.
    pub fn append_utf32(
        &mut self,
        cps: &[CodePoint],
        attribute: Option<Attribute>,
        flags: AttributeSpanFlags,
        payload: Option<Vec<u8>>,
    ) -> ChangeDescriptor {
        if cps.is_empty() {
            let total = self.total_len();
            return ChangeDescriptor {
                start_paragraph_idx: self.paragraphs.len() - 1,
                removed_paragraph_count: 0,
                inserted_paragraph_count: 0,
                edit_end_position: TextPosition::new(total, Affinity::None),
            };
        }

        let fragments = split_on_separators(cps);
        let last_idx = self.paragraphs.len() - 1;
        let last_was_open = self.paragraphs[last_idx].is_open();
        let inherited_attrs = if last_was_open {
            self.paragraphs[last_idx].paragraph_attributes.clone()
        } else {
            Vec::new()
        };

        let start_idx = last_idx;
        let mut created = 0usize;
        for (i, frag) in fragments.iter().enumerate() {
            let attach_to_last = i == 0 && last_was_open;
            if attach_to_last {
                let v = self.next_version();
                self.paragraphs[last_idx].content.append_with_attribute(
                    frag,
                    attribute_or_noop(&attribute),
                    flags,
                    payload.clone(),
                );
                if attribute.is_none() {
                    // No attribute requested: undo the synthetic span `append_with_attribute`
                    // would have added.
                    self.paragraphs[last_idx].content.spans.pop();
                }
                self.paragraphs[last_idx].version = v;
            } else {
                let mut content = AttributedText::new();
                content.append_with_attribute(frag, attribute_or_noop(&attribute), flags, payload.clone());
                if attribute.is_none() {
                    content.spans.pop();
                }
                let v = self.next_version();
                self.paragraphs.push(Paragraph {
                    content,
                    paragraph_attributes: inherited_attrs.clone(),
                    global_text_offset: 0,
                    version: v,
                });
                created += 1;
            }
        }
        self.recompute_offsets_from(start_idx);
        let total = self.total_len();

        ChangeDescriptor {
            start_paragraph_idx: start_idx,
            removed_paragraph_count: 0,
            inserted_paragraph_count: created,
            edit_end_position: TextPosition::new(total, Affinity::Leading),
        }
    }

    /// §4.B `insert`: the 3-way merge workhorse. `range` is in global code-point offsets.
    /// `source` is cloned in (never consumed) so callers may reuse it (e.g. for undo replay).
    pub fn insert(&mut self, range: std::ops::Range<u32>, source: Option<&RichText>) -> ChangeDescriptor {
        let total = self.total_len();
        let range = range.start.min(total)..range.end.min(total);
        let range = if range.start <= range.end { range } else { range.end..range.start };

        let start_idx = self.paragraph_index_for_offset(range.start);
        let end_idx = self.paragraph_index_for_offset(range.end);
        let local_start = range.start - self.paragraphs[start_idx].global_text_offset;
        let local_end = range.end - self.paragraphs[end_idx].global_text_offset;

        let start_para = self.paragraphs[start_idx].clone();
        let end_para = self.paragraphs[end_idx].clone();

        // Prefix: start paragraph's content before the edit point, same attributes.
        let mut merged_start = AttributedText::new();
        merged_start.append_range(&start_para.content, 0..local_start);

        let empty_source = RichText::new();
        let source = source.unwrap_or(&empty_source);
        let src_count = source.paragraphs.len();

        let mut new_paragraphs: Vec<Paragraph> = Vec::new();
        let mut inserted_len = 0u32;

        if src_count <= 1 {
            // Single (or empty) source paragraph: merges directly into the start prefix, which
            // then also absorbs the end-paragraph suffix — everything collapses into one paragraph.
            if let Some(only) = source.paragraphs.first() {
                merged_start.append_range(&only.content, 0..only.len());
                inserted_len += only.len();
            }
            merged_start.append_range(&end_para.content, local_end..end_para.len());
            new_paragraphs.push(Paragraph {
                content: merged_start,
                paragraph_attributes: start_para.paragraph_attributes.clone(),
                global_text_offset: 0,
                version: 0,
            });
        } else {
            let first = &source.paragraphs[0];
            merged_start.append_range(&first.content, 0..first.len());
            inserted_len += first.len();
            new_paragraphs.push(Paragraph {
                content: merged_start,
                paragraph_attributes: start_para.paragraph_attributes.clone(),
                global_text_offset: 0,
                version: 0,
            });

            for mid in &source.paragraphs[1..src_count - 1] {
                let mut content = AttributedText::new();
                content.append_range(&mid.content, 0..mid.len());
                inserted_len += mid.len();
                new_paragraphs.push(Paragraph {
                    content,
                    paragraph_attributes: mid.paragraph_attributes.clone(),
                    global_text_offset: 0,
                    version: 0,
                });
            }

            let last = &source.paragraphs[src_count - 1];
            let mut merged_end = AttributedText::new();
            merged_end.append_range(&last.content, 0..last.len());
            inserted_len += last.len();
            merged_end.append_range(&end_para.content, local_end..end_para.len());
            new_paragraphs.push(Paragraph {
                content: merged_end,
                paragraph_attributes: end_para.paragraph_attributes.clone(),
                global_text_offset: 0,
                version: 0,
            });
        }

        let total_new_count = new_paragraphs.len();
        for p in &mut new_paragraphs {
            p.version = self.next_version();
        }

        let removed_beyond_start = end_idx - start_idx;
        self.paragraphs
            .splice(start_idx..=end_idx, new_paragraphs);
        self.recompute_offsets_from(start_idx);

        let edit_end_position = if inserted_len == 0 && range.start == 0 {
            TextPosition::new(self.paragraphs[start_idx].global_text_offset, Affinity::Trailing)
        } else {
            TextPosition::new(range.start + inserted_len, Affinity::Leading)
        };

        ChangeDescriptor {
            start_paragraph_idx: start_idx,
            removed_paragraph_count: removed_beyond_start,
            inserted_paragraph_count: total_new_count - 1,
            edit_end_position,
        }
    }

    /// `insert_range`: same as [`RichText::insert`] but clips `source` to `src_range` first.
    pub fn insert_range(
        &mut self,
        range: std::ops::Range<u32>,
        source: &RichText,
        src_range: std::ops::Range<u32>,
    ) -> ChangeDescriptor {
        let clipped = source.slice(src_range);
        self.insert(range, Some(&clipped))
    }

    /// Extract a sub-document spanning global `range`, preserving paragraph structure and spans.
    pub fn slice(&self, range: std::ops::Range<u32>) -> RichText {
        let total = self.total_len();
        let range = range.start.min(total)..range.end.min(total);
        if range.start >= range.end {
            return RichText::new();
        }
        // Reuse `insert`'s prefix/suffix extraction pattern to build a standalone document
        // containing only the sliced paragraphs.
        let start_idx = self.paragraph_index_for_offset(range.start);
        let end_idx = self.paragraph_index_for_offset(range.end.saturating_sub(1).max(range.start));
        let local_start = range.start - self.paragraphs[start_idx].global_text_offset;
        let local_end = range.end - self.paragraphs[end_idx].global_text_offset;

        let mut out = RichText { paragraphs: Vec::new(), version_counter: 0 };
        if start_idx == end_idx {
            let mut content = AttributedText::new();
            content.append_range(&self.paragraphs[start_idx].content, local_start..local_end);
            out.paragraphs.push(Paragraph {
                content,
                paragraph_attributes: self.paragraphs[start_idx].paragraph_attributes.clone(),
                global_text_offset: 0,
                version: 0,
            });
        } else {
            let mut first = AttributedText::new();
            first.append_range(&self.paragraphs[start_idx].content, local_start..self.paragraphs[start_idx].len());
            out.paragraphs.push(Paragraph {
                content: first,
                paragraph_attributes: self.paragraphs[start_idx].paragraph_attributes.clone(),
                global_text_offset: 0,
                version: 0,
            });
            for mid in &self.paragraphs[start_idx + 1..end_idx] {
                out.paragraphs.push(mid.clone());
            }
            let mut last = AttributedText::new();
            last.append_range(&self.paragraphs[end_idx].content, 0..local_end);
            out.paragraphs.push(Paragraph {
                content: last,
                paragraph_attributes: self.paragraphs[end_idx].paragraph_attributes.clone(),
                global_text_offset: 0,
                version: 0,
            });
        }
        out.recompute_offsets_from(0);
        out
    }

    /// §4.B `remove`: equivalent to `insert(range, None)`.
    pub fn remove(&mut self, range: std::ops::Range<u32>) -> ChangeDescriptor {
        self.insert(range, None)
    }

    /// Plain-text rendering of the whole document (for tests/diagnostics/clipboard export).
    pub fn to_utf32(&self) -> Vec<CodePoint> {
        let mut out = Vec::with_capacity(self.total_len() as usize);
        for p in &self.paragraphs {
            out.extend_from_slice(&p.content.text);
        }
        out
    }

    /// §4.B `set_paragraph_attribute`: overwrite the first span of matching kind for every
    /// paragraph touched by `range`, removing duplicates of that kind.
    pub fn set_paragraph_attribute(&mut self, range: std::ops::Range<u32>, attribute: Attribute) {
        for idx in self.each_paragraph_in_range(range) {
            let kind = attribute.kind;
            self.paragraphs[idx].paragraph_attributes.retain(|a| a.kind != kind);
            self.paragraphs[idx].paragraph_attributes.push(attribute.clone());
            self.version_counter = self.version_counter.wrapping_add(1);
            self.paragraphs[idx].version = self.version_counter;
        }
    }

    /// §4.B `set_paragraph_attribute_delta`: same as `set_paragraph_attribute`, except
    /// `INDENT_LEVEL` is applied as `max(0, current + delta)`.
    pub fn set_paragraph_attribute_delta(&mut self, range: std::ops::Range<u32>, kind: AttributeKind, delta: i32) {
        for idx in self.each_paragraph_in_range(range.clone()) {
            let current = self.paragraphs[idx]
                .first_attribute(kind)
                .and_then(|a| match &a.payload {
                    crate::attribute::AttributePayload::Int(i) => Some(*i),
                    _ => None,
                })
                .unwrap_or(0);
            let new_value = if kind == AttributeKind::INDENT_LEVEL {
                (current + delta).max(0)
            } else {
                current + delta
            };
            let attr = Attribute::new(kind, crate::attribute::AttributePayload::Int(new_value));
            self.paragraphs[idx].paragraph_attributes.retain(|a| a.kind != kind);
            self.paragraphs[idx].paragraph_attributes.push(attr);
            self.version_counter = self.version_counter.wrapping_add(1);
            self.paragraphs[idx].version = self.version_counter;
        }
    }

    fn each_paragraph_in_range(&self, range: std::ops::Range<u32>) -> Vec<usize> {
        let total = self.total_len();
        let range = range.start.min(total)..range.end.min(total).max(range.start.min(total));
        let start_idx = self.paragraph_index_for_offset(range.start);
        let end_idx = if range.end <= range.start {
            start_idx
        } else {
            self.paragraph_index_for_offset(range.end.saturating_sub(1))
        };
        (start_idx..=end_idx).collect()
    }

    /// §4.B `set_attribute`: delegate to the per-paragraph `AttributedText` for every paragraph
    /// slice overlapping `range`.
    pub fn set_attribute(
        &mut self,
        range: std::ops::Range<u32>,
        attribute: Attribute,
        flags: AttributeSpanFlags,
        payload: Option<Vec<u8>>,
    ) {
        self.for_each_overlapping_local_range(range, |para, local_range| {
            para.content.add_attribute(local_range, attribute.clone(), flags, payload.clone());
        });
    }

    /// §4.B `clear_attribute`.
    pub fn clear_attribute(&mut self, range: std::ops::Range<u32>, kind: AttributeKind) {
        self.for_each_overlapping_local_range(range, |para, local_range| {
            para.content.clear_attribute(local_range, kind);
        });
    }

    /// §4.B `clear_all_attributes`.
    pub fn clear_all_attributes(&mut self, range: std::ops::Range<u32>) {
        self.for_each_overlapping_local_range(range, |para, local_range| {
            para.content.clear_all_attributes(local_range);
        });
    }

    fn for_each_overlapping_local_range(
        &mut self,
        range: std::ops::Range<u32>,
        mut f: impl FnMut(&mut Paragraph, std::ops::Range<u32>),
    ) {
        let total = self.total_len();
        let range = range.start.min(total)..range.end.min(total);
        if range.start >= range.end {
            return;
        }
        for para in &mut self.paragraphs {
            let para_range = para.global_text_offset..(para.global_text_offset + para.len());
            let lo = range.start.max(para_range.start);
            let hi = range.end.min(para_range.end);
            if lo < hi {
                f(para, (lo - para.global_text_offset)..(hi - para.global_text_offset));
                para.version = self.version_counter.wrapping_add(1);
                self.version_counter = para.version;
            }
        }
    }

    /// §4.B `has_attribute`: true iff every code point in `range` carries a byte-equal
    /// (kind+payload) attribute.
    pub fn has_attribute(&self, range: std::ops::Range<u32>, attribute: &Attribute) -> bool {
        if range.start >= range.end {
            return false;
        }
        let mut covered = 0u32;
        for para in &self.paragraphs {
            let para_range = para.global_text_offset..(para.global_text_offset + para.len());
            let lo = range.start.max(para_range.start);
            let hi = range.end.min(para_range.end);
            if lo >= hi {
                continue;
            }
            let local = (lo - para.global_text_offset)..(hi - para.global_text_offset);
            for span in &para.content.spans {
                if span.attribute == *attribute {
                    covered += span.covered_len(&local);
                }
            }
        }
        covered == (range.end - range.start)
    }

    /// §4.B `get_attribute_text_range`: first span (in document order) that fully covers `range`.
    pub fn get_attribute_text_range(
        &self,
        range: std::ops::Range<u32>,
        kind: AttributeKind,
    ) -> Option<std::ops::Range<u32>> {
        for para in &self.paragraphs {
            let para_range = para.global_text_offset..(para.global_text_offset + para.len());
            let lo = range.start.max(para_range.start);
            let hi = range.end.min(para_range.end);
            if lo >= hi {
                continue;
            }
            let local = (lo - para.global_text_offset)..(hi - para.global_text_offset);
            for span in &para.content.spans {
                if span.attribute.kind == kind && span.covered_len(&local) == (local.end - local.start) {
                    return Some((span.text_range.start + para.global_text_offset)..(span.text_range.end + para.global_text_offset));
                }
            }
        }
        None
    }

    /// §4.B `get_attribute_payload`: payload of any span of `kind` containing the whole of `range`.
    pub fn get_attribute_payload(
        &self,
        range: std::ops::Range<u32>,
        kind: AttributeKind,
    ) -> Option<crate::attribute::AttributePayload> {
        for para in &self.paragraphs {
            let para_range = para.global_text_offset..(para.global_text_offset + para.len());
            let lo = range.start.max(para_range.start);
            let hi = range.end.min(para_range.end);
            if lo >= hi {
                continue;
            }
            let local = (lo - para.global_text_offset)..(hi - para.global_text_offset);
            for span in &para.content.spans {
                if span.attribute.kind == kind && span.covered_len(&local) == (local.end - local.start) {
                    return Some(span.attribute.payload.clone());
                }
            }
        }
        None
    }

    /// §4.B `remove_if`: remove every maximal contiguous run of code points satisfying
    /// `predicate`, coalesced into one `remove` call per run.
    pub fn remove_if(&mut self, predicate: impl Fn(CodePoint) -> bool) -> Vec<ChangeDescriptor> {
        let text = self.to_utf32();
        let mut runs: Vec<std::ops::Range<u32>> = Vec::new();
        let mut run_start: Option<u32> = None;
        for (i, &cp) in text.iter().enumerate() {
            let i = i as u32;
            if predicate(cp) {
                if run_start.is_none() {
                    run_start = Some(i);
                }
            } else if let Some(s) = run_start.take() {
                runs.push(s..i);
            }
        }
        if let Some(s) = run_start {
            runs.push(s..text.len() as u32);
        }
        runs.iter().rev().map(|r| self.remove(r.clone())).collect()
    }
}

fn attribute_or_noop(attribute: &Option<Attribute>) -> Attribute {
    attribute
        .clone()
        .unwrap_or_else(|| Attribute::flag(AttributeKind::new(0)))
}

fn split_on_separators(cps: &[CodePoint]) -> Vec<Vec<CodePoint>> {
    let mut fragments = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < cps.len() {
        if let Some(len) = crate::line_ending::paragraph_separator_len(cps, i) {
            fragments.push(cps[start..i + len].to_vec());
            i += len;
            start = i;
        } else {
            i += 1;
        }
    }
    if start < cps.len() || fragments.is_empty() {
        fragments.push(cps[start..].to_vec());
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::test_support::TestLayoutProvider;

    fn cps(s: &str) -> Vec<CodePoint> {
        s.chars().map(|c| c as u32).collect()
    }

    fn text_of(rt: &RichText) -> String {
        rt.to_utf32().iter().filter_map(|&c| char::from_u32(c)).collect()
    }

    #[test]
    fn s1_paragraph_split_on_lf_insertion() {
        let mut rt = RichText::from_code_points(&cps("abc"), None);
        let source = RichText::from_code_points(&cps("\n"), None);
        let change = rt.insert(2..2, Some(&source));
        assert_eq!(rt.paragraphs.len(), 2);
        assert_eq!(text_of(&rt), "ab\nc");
        assert_eq!(rt.paragraphs[0].content.text, cps("ab\n"));
        assert_eq!(rt.paragraphs[1].content.text, cps("c"));
        assert_eq!(change.start_paragraph_idx, 0);
        assert_eq!(change.removed_paragraph_count, 0);
        assert_eq!(change.inserted_paragraph_count, 1);
        assert_eq!(change.edit_end_position.offset, 3);
        assert_eq!(change.edit_end_position.affinity, Affinity::Leading);
    }

    #[test]
    fn total_len_and_offsets_invariant() {
        let mut rt = RichText::new();
        rt.append_utf32(&cps("line one\nline two\nline three"), None, AttributeSpanFlags::empty(), None);
        let mut sum = 0u32;
        for (i, p) in rt.paragraphs.iter().enumerate() {
            assert_eq!(p.global_text_offset, sum);
            if i > 0 {
                assert!(rt.paragraphs[i - 1].content.text.last().copied() == Some(0x000A) || i == rt.paragraphs.len());
            }
            sum += p.len();
        }
        assert_eq!(sum, rt.total_len());
    }

    #[test]
    fn merge_across_paragraphs_removes_separator() {
        let mut rt = RichText::new();
        rt.append_utf32(&cps("ab\ncd"), None, AttributeSpanFlags::empty(), None);
        assert_eq!(rt.paragraphs.len(), 2);
        let change = rt.remove(2..3); // removes the lone "\n"
        assert_eq!(rt.paragraphs.len(), 1);
        assert_eq!(text_of(&rt), "abcd");
        assert_eq!(change.removed_paragraph_count, 1);
        assert_eq!(change.inserted_paragraph_count, 0);
    }

    #[test]
    fn resolve_clamps_and_aligns() {
        let rt = RichText::from_code_points(&cps("hello"), None);
        let provider = TestLayoutProvider::new();
        let pos = rt.resolve(&provider, TextPosition::new(100, Affinity::Trailing), AffinityUsage::Ignore);
        assert_eq!(pos.global_offset, 5);
        let pos0 = rt.resolve(&provider, TextPosition::new(0, Affinity::Trailing), AffinityUsage::Ignore);
        assert_eq!(pos0.global_offset, 0);
    }

    #[test]
    fn has_attribute_requires_full_coverage_and_equal_payload() {
        use crate::attribute::AttributePayload;
        let mut rt = RichText::from_code_points(&cps("hello"), None);
        let bold = Attribute::new(AttributeKind::FONT_WEIGHT, AttributePayload::Int(700));
        rt.set_attribute(1..4, bold.clone(), AttributeSpanFlags::empty(), None);
        assert!(rt.has_attribute(1..4, &bold));
        assert!(!rt.has_attribute(0..4, &bold));
        let different = Attribute::new(AttributeKind::FONT_WEIGHT, AttributePayload::Int(400));
        assert!(!rt.has_attribute(1..4, &different));
    }

    #[test]
    fn remove_if_coalesces_contiguous_runs() {
        let mut rt = RichText::from_code_points(&cps("a..b..c"), None);
        rt.remove_if(|cp| cp == '.' as u32);
        assert_eq!(text_of(&rt), "abc");
    }
}
