//! Stage 4: Caret Engine — bidi-aware character/word/line/document motion, a code-point level
//! backspace cluster boundary scan, and the click-count-driven drag-selection state machine
//! (spec §4.D).
//!
//! Every function here is read-only: it answers "where does the caret go" against a
//! [`RichText`]/[`RichLayout`] pair, but never mutates either. The [`crate::editor::Editor`]
//! façade is what turns these answers into selection state.

use crate::collaborators::{Direction, LayoutProvider, MovementType, WordBoundaryStyle};
use crate::position::{Affinity, CodePoint, TextPosition};
use crate::rich_layout::RichLayout;
use crate::rich_text::RichText;

/// Whether caret motion follows logical code-point order (`Simple`) or visual/bidi-resolved
/// order (`Skribidi`, named after the teacher's own bidi caret resolver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretMode {
    /// Arrow keys always move in logical code-point order, ignoring run direction.
    Simple,
    /// Arrow keys move visually: Right always moves the caret rightward on screen, which in an
    /// RTL run means *decreasing* code-point offset.
    Skribidi,
}

/// Selects which platform's word/line/document motion rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorBehavior {
    /// Windows/Linux-style motion (Home/End are line-relative; Ctrl+Home/End are document-relative).
    Default,
    /// macOS-style motion (Cmd+Left/Right are line-relative; Cmd+Up/Down are document-relative;
    /// Option+Left/Right is word motion with macOS's skip-punctuation rule).
    MacOs,
}

impl From<EditorBehavior> for WordBoundaryStyle {
    fn from(b: EditorBehavior) -> Self {
        match b {
            EditorBehavior::Default => WordBoundaryStyle::Default,
            EditorBehavior::MacOs => WordBoundaryStyle::MacOs,
        }
    }
}

fn direction_at(layout: &RichLayout, provider: &dyn LayoutProvider, paragraph_idx: usize, local_offset: u32) -> Direction {
    layout
        .paragraphs
        .get(paragraph_idx)
        .map(|p| provider.get_text_direction_at(&p.layout, local_offset))
        .unwrap_or(Direction::Ltr)
}

/// Move one grapheme cluster. `visual_forward` is the key the user pressed (`true` for
/// Right/Down-like keys); in [`CaretMode::Skribidi`] this is reinterpreted against the run's
/// resolved direction. `stop_at_dir_change`, when set, halts the caret at a bidi run boundary
/// (flipping affinity) instead of crossing into the next run in one step.
pub fn move_char(
    rich: &RichText,
    layout: &RichLayout,
    provider: &dyn LayoutProvider,
    mode: CaretMode,
    pos: TextPosition,
    visual_forward: bool,
    stop_at_dir_change: bool,
) -> TextPosition {
    let resolved = rich.resolve(provider, pos, crate::position::AffinityUsage::Ignore);
    let idx = resolved.paragraph_idx;
    let Some(para) = rich.paragraphs.get(idx) else {
        return pos;
    };

    let direction = direction_at(layout, provider, idx, resolved.local_offset);
    let logical_forward = match mode {
        CaretMode::Simple => visual_forward,
        CaretMode::Skribidi => {
            if direction.is_rtl() {
                !visual_forward
            } else {
                visual_forward
            }
        }
    };

    if logical_forward {
        let next_local = provider.next_grapheme_offset(&para.content.text, resolved.local_offset);
        if next_local >= para.len() {
            if idx + 1 < rich.paragraphs.len() {
                if stop_at_dir_change {
                    let next_dir = direction_at(layout, provider, idx + 1, 0);
                    if next_dir != direction {
                        return TextPosition::new(para.global_text_offset + para.len(), Affinity::Leading);
                    }
                }
                return TextPosition::new(rich.paragraphs[idx + 1].global_text_offset, Affinity::Trailing);
            }
            return TextPosition::new(para.global_text_offset + para.len(), Affinity::Leading);
        }
        if stop_at_dir_change {
            let new_dir = direction_at(layout, provider, idx, next_local);
            if new_dir != direction {
                return TextPosition::new(para.global_text_offset + resolved.local_offset, Affinity::Leading);
            }
        }
        TextPosition::new(para.global_text_offset + next_local, Affinity::Trailing)
    } else {
        if resolved.local_offset == 0 {
            if idx > 0 {
                let prev = &rich.paragraphs[idx - 1];
                return TextPosition::new(prev.global_text_offset + prev.len(), Affinity::Leading);
            }
            return TextPosition::new(0, Affinity::Sol);
        }
        let prev_local = provider.prev_grapheme_offset(&para.content.text, resolved.local_offset);
        if stop_at_dir_change {
            let new_dir = direction_at(layout, provider, idx, prev_local);
            if new_dir != direction {
                return TextPosition::new(para.global_text_offset + resolved.local_offset, Affinity::Leading);
            }
        }
        TextPosition::new(para.global_text_offset + prev_local, Affinity::Trailing)
    }
}

/// Move by word, honoring `behavior`'s platform rules and crossing paragraph boundaries at the
/// ends of a document.
pub fn move_word(
    rich: &RichText,
    provider: &dyn LayoutProvider,
    behavior: EditorBehavior,
    pos: TextPosition,
    forward: bool,
) -> TextPosition {
    let resolved = rich.resolve(provider, pos, crate::position::AffinityUsage::Ignore);
    let idx = resolved.paragraph_idx;
    let Some(para) = rich.paragraphs.get(idx) else {
        return pos;
    };
    let style = WordBoundaryStyle::from(behavior);

    if forward {
        let next = provider.next_word_offset(&para.content.text, resolved.local_offset, style);
        if next >= para.len() && idx + 1 < rich.paragraphs.len() {
            return TextPosition::new(rich.paragraphs[idx + 1].global_text_offset, Affinity::Trailing);
        }
        TextPosition::new(para.global_text_offset + next.min(para.len()), Affinity::Trailing)
    } else {
        let prev = provider.prev_word_offset(&para.content.text, resolved.local_offset, style);
        if prev == 0 && resolved.local_offset == 0 && idx > 0 {
            let prev_para = &rich.paragraphs[idx - 1];
            return TextPosition::new(prev_para.global_text_offset + prev_para.len(), Affinity::Leading);
        }
        TextPosition::new(para.global_text_offset + prev, Affinity::Trailing)
    }
}

/// Start of the visual line containing `pos`.
pub fn move_line_start(rich: &RichText, layout: &RichLayout, provider: &dyn LayoutProvider, pos: TextPosition) -> TextPosition {
    let resolved = rich.resolve(provider, pos, crate::position::AffinityUsage::Ignore);
    let Some(lp) = layout.paragraphs.get(resolved.paragraph_idx) else {
        return pos;
    };
    let line_idx = lp.layout.line_index_for_offset(resolved.local_offset);
    let line_start = lp.layout.lines.get(line_idx).map(|l| l.text_range.start).unwrap_or(0);
    TextPosition::new(lp.global_text_offset + line_start, Affinity::Sol)
}

/// End of the visual line containing `pos`.
pub fn move_line_end(rich: &RichText, layout: &RichLayout, provider: &dyn LayoutProvider, pos: TextPosition) -> TextPosition {
    let resolved = rich.resolve(provider, pos, crate::position::AffinityUsage::Ignore);
    let Some(lp) = layout.paragraphs.get(resolved.paragraph_idx) else {
        return pos;
    };
    let line_idx = lp.layout.line_index_for_offset(resolved.local_offset);
    let line_end = lp.layout.lines.get(line_idx).map(|l| l.text_range.end).unwrap_or(0);
    TextPosition::new(lp.global_text_offset + line_end, Affinity::Eol)
}

/// Start of the document.
pub fn move_document_start() -> TextPosition {
    TextPosition::document_start()
}

/// End of the document.
pub fn move_document_end(rich: &RichText) -> TextPosition {
    TextPosition::new(rich.total_len(), Affinity::Leading)
}

/// Vertical motion (Up/Down), tracking a preferred X column across lines. `preferred_x` is
/// `Some` for repeated vertical moves in the same gesture (reset on any horizontal motion by the
/// caller) so the caret doesn't drift to the nearest-line-end column on short intervening lines.
pub fn move_vertical(
    rich: &RichText,
    layout: &RichLayout,
    provider: &dyn LayoutProvider,
    pos: TextPosition,
    down: bool,
    preferred_x: &mut Option<f32>,
) -> TextPosition {
    let resolved = rich.resolve(provider, pos, crate::position::AffinityUsage::Ignore);
    let Some(lp) = layout.paragraphs.get(resolved.paragraph_idx) else {
        return pos;
    };

    let x = preferred_x.unwrap_or_else(|| {
        provider.caret_info_at(&lp.layout, resolved.local_offset, pos.affinity).x
    });
    *preferred_x = Some(x);

    let line_idx = lp.layout.line_index_for_offset(resolved.local_offset);
    let line_y_mid = lp
        .layout
        .lines
        .get(line_idx)
        .map(|l| l.bounds.y + l.bounds.height / 2.0)
        .unwrap_or(0.0);
    let line_height = lp.layout.lines.get(line_idx).map(|l| l.bounds.height).unwrap_or(16.0);
    let target_y = lp.offset_y + line_y_mid + if down { line_height } else { -line_height };

    layout.hit_test(provider, MovementType::Character, x, target_y)
}

/// §4.D backspace cluster boundary scan: the offset backspace should delete back to from
/// `offset`, given raw paragraph-local `text`. Distinct from [`LayoutProvider::prev_grapheme_offset`]:
/// this is a fixed, locale-independent scan over CR+LF pairs, regional-indicator flag pairs,
/// keycap sequences, emoji+ZWJ sequences, variation selectors, and emoji tag sequences, matching
/// what users expect "one backspace, one visual symbol deleted" to mean even when a host's own
/// break-iterator disagrees.
pub fn backspace_boundary(text: &[CodePoint], offset: u32) -> u32 {
    const REGIONAL_INDICATOR: std::ops::RangeInclusive<u32> = 0x1F1E6..=0x1F1FF;
    const VARIATION_SELECTOR: std::ops::RangeInclusive<u32> = 0xFE00..=0xFE0F;
    const VARIATION_SELECTOR_SUPPLEMENT: std::ops::RangeInclusive<u32> = 0xE0100..=0xE01EF;
    const EMOJI_MODIFIER: std::ops::RangeInclusive<u32> = 0x1F3FB..=0x1F3FF;
    const TAG_CHAR: std::ops::RangeInclusive<u32> = 0xE0020..=0xE007E;
    const CANCEL_TAG: u32 = 0xE007F;
    const ZWJ: u32 = 0x200D;
    const COMBINING_ENCLOSING_KEYCAP: u32 = 0x20E3;
    const VARIATION_SELECTOR_16: u32 = 0xFE0F;
    const CR: u32 = 0x000D;
    const LF: u32 = 0x000A;

    let mut i = offset as usize;
    if i == 0 || i > text.len() {
        return 0;
    }
    i -= 1;

    // CR+LF counts as a single unit.
    if text[i] == LF && i > 0 && text[i - 1] == CR {
        return (i - 1) as u32;
    }

    // Emoji tag sequence: base emoji, tag chars, CANCEL_TAG.
    if text[i] == CANCEL_TAG {
        while i > 0 && TAG_CHAR.contains(&text[i - 1]) {
            i -= 1;
        }
        if i > 0 {
            i -= 1;
        }
        return i as u32;
    }

    // A trailing variation selector or skin-tone modifier is swallowed with its base character.
    if VARIATION_SELECTOR.contains(&text[i])
        || VARIATION_SELECTOR_SUPPLEMENT.contains(&text[i])
        || EMOJI_MODIFIER.contains(&text[i])
    {
        if i > 0 {
            i -= 1;
        }
    }

    // Emoji ZWJ sequence: keep consuming `ZWJ + preceding emoji (+ its own modifier)` pairs.
    while i > 0 && text[i] == ZWJ {
        i -= 1;
        if i > 0 {
            i -= 1;
        }
        if i > 0 && (VARIATION_SELECTOR.contains(&text[i]) || EMOJI_MODIFIER.contains(&text[i])) {
            i -= 1;
        }
    }

    // Regional-indicator flag pairs: delete two at a time unless an odd one is left dangling.
    if REGIONAL_INDICATOR.contains(&text[i]) {
        let mut run_len = 1usize;
        let mut j = i;
        while j > 0 && REGIONAL_INDICATOR.contains(&text[j - 1]) {
            j -= 1;
            run_len += 1;
        }
        if run_len % 2 == 0 && i > 0 {
            i -= 1;
        }
    }

    // Keycap sequence: base digit/#/* + optional VS16 + COMBINING_ENCLOSING_KEYCAP.
    if text[i] == COMBINING_ENCLOSING_KEYCAP {
        if i > 0 && text[i - 1] == VARIATION_SELECTOR_16 {
            i -= 1;
        }
        if i > 0 {
            i -= 1;
        }
    }

    i as u32
}

/// Which granularity a drag gesture selects by, driven by click count (spec §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMode {
    /// Single click: selects individual graphemes.
    Char,
    /// Double click: selects whole words.
    Word,
    /// Triple click (and beyond, wrapping back to `Word` after a quadruple click... actually
    /// wraps back to `Char` after three): selects whole lines.
    Line,
}

/// The window, in milliseconds, within which a second click at (about) the same position counts
/// as part of the same multi-click gesture.
pub const MULTI_CLICK_WINDOW_MS: u64 = 400;

/// Tracks click count/timing/position to resolve a drag gesture's [`ClickMode`], then produces
/// the selection for ongoing drag motion.
#[derive(Debug, Clone)]
pub struct DragState {
    mode: ClickMode,
    click_count: u8,
    anchor: TextPosition,
    anchor_word_or_line: (TextPosition, TextPosition),
    last_click_time_ms: u64,
    last_click_offset: u32,
}

impl DragState {
    /// Register a mouse-down at `pos`/`time_ms`, resolving the click count and resulting
    /// [`ClickMode`]. Clicks beyond three wrap back to `Char` (count resets to 1).
    pub fn on_mouse_down(&mut self, pos: TextPosition, time_ms: u64) {
        let same_spot = pos.offset == self.last_click_offset;
        let within_window = time_ms.saturating_sub(self.last_click_time_ms) <= MULTI_CLICK_WINDOW_MS;
        self.click_count = if same_spot && within_window {
            if self.click_count >= 3 {
                1
            } else {
                self.click_count + 1
            }
        } else {
            1
        };
        self.mode = match self.click_count {
            1 => ClickMode::Char,
            2 => ClickMode::Word,
            _ => ClickMode::Line,
        };
        self.anchor = pos;
        self.last_click_time_ms = time_ms;
        self.last_click_offset = pos.offset;
    }

    /// The currently resolved click mode.
    pub fn mode(&self) -> ClickMode {
        self.mode
    }

    /// Establish the anchor's word/line bounds once the gesture starts dragging (so subsequent
    /// `on_drag` calls can always extend from a fixed anchor range rather than the anchor point).
    pub fn set_anchor_bounds(&mut self, bounds: (TextPosition, TextPosition)) {
        self.anchor_word_or_line = bounds;
    }

    /// Resolve the selection for a drag to `current`, given the anchor's (word/line) bounds
    /// resolved by the caller via the layout/word-boundary collaborators.
    pub fn on_drag(&self, current: TextPosition, current_bounds: (TextPosition, TextPosition)) -> (TextPosition, TextPosition) {
        match self.mode {
            ClickMode::Char => {
                if current.offset >= self.anchor.offset {
                    (self.anchor, current)
                } else {
                    (current, self.anchor)
                }
            }
            ClickMode::Word | ClickMode::Line => {
                let (a_lo, a_hi) = self.anchor_word_or_line;
                let (c_lo, c_hi) = current_bounds;
                if current.offset >= self.anchor.offset {
                    (a_lo, c_hi)
                } else {
                    (c_lo, a_hi)
                }
            }
        }
    }
}

impl Default for DragState {
    fn default() -> Self {
        Self {
            mode: ClickMode::Char,
            click_count: 0,
            anchor: TextPosition::document_start(),
            anchor_word_or_line: (TextPosition::document_start(), TextPosition::document_start()),
            last_click_time_ms: 0,
            last_click_offset: u32::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeSpanFlags;
    use crate::collaborators::test_support::TestLayoutProvider;

    fn cps(s: &str) -> Vec<CodePoint> {
        s.chars().map(|c| c as u32).collect()
    }

    fn setup(text: &str) -> (RichText, RichLayout, TestLayoutProvider) {
        let mut rt = RichText::new();
        rt.append_utf32(&cps(text), None, AttributeSpanFlags::empty(), None);
        let provider = TestLayoutProvider::new();
        let mut layout = RichLayout::new();
        let params = crate::collaborators::LayoutParams { width: 400.0, tab_width: 32.0, line_height_multiplier: 1.0 };
        layout.set_from_rich_text(&params, &provider, &rt, None);
        (rt, layout, provider)
    }

    #[test]
    fn move_char_crosses_paragraph_boundary() {
        let (rt, layout, provider) = setup("ab\ncd");
        let pos = TextPosition::new(2, Affinity::Trailing); // just before the paragraph separator
        let next = move_char(&rt, &layout, &provider, CaretMode::Simple, pos, true, false);
        assert_eq!(next.offset, 3); // crosses the separator into "cd"
    }

    /// Resolves direction per code point instead of `TestLayoutProvider`'s whole-paragraph-only
    /// direction, so a direction-change stop partway through a single paragraph is observable.
    struct MixedDirectionProvider {
        inner: TestLayoutProvider,
        text: Vec<CodePoint>,
    }

    impl MixedDirectionProvider {
        fn new(text: &str) -> Self {
            Self { inner: TestLayoutProvider::new(), text: cps(text) }
        }

        fn is_strong_rtl(cp: u32) -> bool {
            (0x0590..=0x08FF).contains(&cp)
        }
    }

    impl LayoutProvider for MixedDirectionProvider {
        fn layout_paragraph(
            &self,
            params: &crate::collaborators::LayoutParams,
            text: &[CodePoint],
            attrs: &crate::collaborators::LayoutAttributes,
        ) -> crate::collaborators::LaidLines {
            self.inner.layout_paragraph(params, text, attrs)
        }

        fn next_grapheme_offset(&self, text: &[CodePoint], offset: u32) -> u32 {
            self.inner.next_grapheme_offset(text, offset)
        }

        fn prev_grapheme_offset(&self, text: &[CodePoint], offset: u32) -> u32 {
            self.inner.prev_grapheme_offset(text, offset)
        }

        fn align_grapheme_offset(&self, text: &[CodePoint], offset: u32) -> u32 {
            self.inner.align_grapheme_offset(text, offset)
        }

        fn next_word_offset(&self, text: &[CodePoint], offset: u32, behavior: WordBoundaryStyle) -> u32 {
            self.inner.next_word_offset(text, offset, behavior)
        }

        fn prev_word_offset(&self, text: &[CodePoint], offset: u32, behavior: WordBoundaryStyle) -> u32 {
            self.inner.prev_word_offset(text, offset, behavior)
        }

        fn get_text_direction_at(&self, _laid: &crate::collaborators::LaidLines, pos: u32) -> Direction {
            match self.text.get(pos as usize) {
                Some(&cp) if Self::is_strong_rtl(cp) => Direction::Rtl,
                _ => Direction::Ltr,
            }
        }

        fn hit_test_at_line(
            &self,
            laid: &crate::collaborators::LaidLines,
            movement: MovementType,
            line_idx: usize,
            x: f32,
        ) -> u32 {
            self.inner.hit_test_at_line(laid, movement, line_idx, x)
        }

        fn caret_info_at(&self, laid: &crate::collaborators::LaidLines, pos: u32, affinity: Affinity) -> crate::collaborators::CaretInfo {
            self.inner.caret_info_at(laid, pos, affinity)
        }

        fn range_bounds_iter(
            &self,
            laid: &crate::collaborators::LaidLines,
            range: std::ops::Range<u32>,
            offset_y: f32,
            cb: &mut dyn FnMut(crate::collaborators::Rect),
        ) {
            self.inner.range_bounds_iter(laid, range, offset_y, cb)
        }
    }

    #[test]
    fn move_char_stops_at_direction_change_from_trailing() {
        // "א" (U+05D0, strong RTL) followed by "b" (LTR). Caret at offset 1 TRAILING (right
        // after the RTL letter) moving forward must stop AT the current position with
        // Leading affinity, not advance into "b" (spec §4.D step 3, scenario S4).
        let text = "\u{05D0}b";
        let provider = MixedDirectionProvider::new(text);
        let mut rt = RichText::new();
        rt.append_utf32(&cps(text), None, AttributeSpanFlags::empty(), None);
        let params = crate::collaborators::LayoutParams { width: 400.0, tab_width: 32.0, line_height_multiplier: 1.0 };
        let mut layout = RichLayout::new();
        layout.set_from_rich_text(&params, &provider, &rt, None);

        let pos = TextPosition::new(1, Affinity::Trailing);
        let next = move_char(&rt, &layout, &provider, CaretMode::Simple, pos, true, true);
        assert_eq!(next.offset, 1);
        assert_eq!(next.affinity, Affinity::Leading);
    }

    #[test]
    fn backspace_crlf_deletes_as_one_unit() {
        let text = cps("a\r\nb");
        let boundary = backspace_boundary(&text, 3);
        assert_eq!(boundary, 1);
    }

    #[test]
    fn backspace_regional_indicator_pair_deletes_together() {
        // U+1F1FA U+1F1F8 = "US" flag.
        let text: Vec<CodePoint> = vec![0x1F1FA, 0x1F1F8];
        let boundary = backspace_boundary(&text, 2);
        assert_eq!(boundary, 0);
    }

    #[test]
    fn click_count_resolves_mode_and_wraps_after_three() {
        let mut drag = DragState::default();
        let pos = TextPosition::new(5, Affinity::Trailing);
        drag.on_mouse_down(pos, 0);
        assert_eq!(drag.mode(), ClickMode::Char);
        drag.on_mouse_down(pos, 100);
        assert_eq!(drag.mode(), ClickMode::Word);
        drag.on_mouse_down(pos, 200);
        assert_eq!(drag.mode(), ClickMode::Line);
        drag.on_mouse_down(pos, 300);
        assert_eq!(drag.mode(), ClickMode::Char);
    }

    #[test]
    fn click_outside_window_resets_to_char() {
        let mut drag = DragState::default();
        let pos = TextPosition::new(5, Affinity::Trailing);
        drag.on_mouse_down(pos, 0);
        drag.on_mouse_down(pos, 1000);
        assert_eq!(drag.mode(), ClickMode::Char);
    }
}
