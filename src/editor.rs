//! Stage 6: Editor Façade — selection, IME composition overlay, active attributes, keyboard/mouse
//! dispatch, undo wiring, and the change/input-filter callbacks (spec §4.F).
//!
//! This is the only module that *owns* mutable editor state end to end; every other module
//! (`rich_text`, `rich_layout`, `caret`, `undo`) is a pure function library over borrowed state.
//! Collaborators (`LayoutProvider`/`FontProvider`) are never stored on `Editor` — per spec §5 they
//! are borrowed fresh on every call, the same way the teacher's `CommandExecutor` takes its
//! `LayoutEngine` dependencies as call parameters rather than caching a trait object.

use bitflags::bitflags;

use crate::attribute::{Attribute, AttributeKind, AttributeSpanFlags};
use crate::caret::{self, CaretMode, ClickMode, DragState, EditorBehavior};
use crate::collaborators::{
    CaretInfo, FontProvider, FontQuery, LayoutParams, LayoutProvider, MovementType,
};
use crate::delta::TextDelta;
use crate::position::{Affinity, AffinityUsage, CodePoint, TextPosition, TextRange};
use crate::rich_layout::RichLayout;
use crate::rich_text::RichText;
use crate::undo::UndoEngine;

/// Keyboard keys the façade's dispatch table understands (spec §6 keyboard surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Arrow left.
    Left,
    /// Arrow right.
    Right,
    /// Arrow up.
    Up,
    /// Arrow down.
    Down,
    /// Home.
    Home,
    /// End.
    End,
    /// Backspace.
    Backspace,
    /// Forward delete.
    Delete,
    /// Enter / Return.
    Enter,
}

bitflags! {
    /// Modifier keys held during a keyboard or mouse event (spec §6 modifier bitmask).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        /// Shift: extends the selection instead of collapsing it.
        const SHIFT = 1 << 0;
        /// Control (Default behavior's word/document modifier).
        const CONTROL = 1 << 1;
        /// Command (macOS behavior's line/document modifier).
        const COMMAND = 1 << 2;
        /// Option/Alt (macOS behavior's word modifier).
        const OPTION = 1 << 3;
    }
}

/// Construction-time configuration (spec §4.F, §6 "Configuration").
#[derive(Debug, Clone)]
pub struct EditorParams {
    /// How many undo transactions to retain.
    pub max_undo_levels: usize,
    /// Logical vs. visual (bidi-aware) caret motion.
    pub caret_mode: CaretMode,
    /// Platform word/line/document motion rules.
    pub editor_behavior: EditorBehavior,
    /// Document-wide fallback attributes paragraph 0 falls back to in layout.
    pub base_attributes: Vec<Attribute>,
}

impl Default for EditorParams {
    fn default() -> Self {
        Self {
            max_undo_levels: 200,
            caret_mode: CaretMode::Simple,
            editor_behavior: EditorBehavior::Default,
            base_attributes: Vec::new(),
        }
    }
}

/// The active IME composition overlay (spec §4.F "IME composition").
#[derive(Debug, Clone)]
struct Composition {
    /// Global offset the composition replaced/was inserted at.
    base: u32,
    /// The text currently being composed (not yet part of `RichText`).
    text: Vec<CodePoint>,
    /// The IME's own caret, local to `text`.
    caret_in_composition: u32,
}

impl Composition {
    fn selection(&self) -> TextRange {
        let pos = TextPosition::new(self.base + self.caret_in_composition, Affinity::Trailing);
        TextRange::caret(pos)
    }
}

/// A coarse notification of one externally visible mutation (spec §4.F "Change callback").
/// Mirrors the teacher's `StateChange`, minus the cursor/viewport variants this façade doesn't
/// model as separate states.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorChange {
    /// What kind of mutation occurred.
    pub kind: EditorChangeKind,
    /// The structured delta, when `kind` is `Text`.
    pub text_delta: Option<TextDelta>,
}

/// The kind of mutation an [`EditorChange`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorChangeKind {
    /// Code points were inserted or removed.
    Text,
    /// Attribute spans changed without any code-point change.
    Attributes,
}

type ChangeCallback = Box<dyn FnMut(&EditorChange)>;
type InputFilter = Box<dyn FnMut(&mut RichText) -> bool>;

/// The rich-text editor façade: owns document, layout cache, selection, composition overlay,
/// drag state, and undo history; dispatches keyboard/mouse/IME events against them.
pub struct Editor {
    rich_text: RichText,
    layout: RichLayout,
    selection: TextRange,
    composition: Option<Composition>,
    drag: DragState,
    undo: UndoEngine,
    active_attributes: Vec<Attribute>,
    preferred_x: Option<f32>,
    caret_mode: CaretMode,
    editor_behavior: EditorBehavior,
    change_callback: Option<ChangeCallback>,
    input_filter: Option<InputFilter>,
    #[cfg(debug_assertions)]
    in_callback: bool,
}

impl Editor {
    /// Construct an editor over an empty single-paragraph document.
    pub fn new(params: EditorParams) -> Self {
        let mut layout = RichLayout::new();
        layout.set_base_attributes(params.base_attributes);
        Self {
            rich_text: RichText::new(),
            layout,
            selection: TextRange::caret(TextPosition::document_start()),
            composition: None,
            drag: DragState::default(),
            undo: UndoEngine::new(params.max_undo_levels),
            active_attributes: Vec::new(),
            preferred_x: None,
            caret_mode: params.caret_mode,
            editor_behavior: params.editor_behavior,
            change_callback: None,
            input_filter: None,
            #[cfg(debug_assertions)]
            in_callback: false,
        }
    }

    /// The document text, for read-only inspection.
    pub fn rich_text(&self) -> &RichText {
        &self.rich_text
    }

    /// The current layout cache, for read-only inspection (e.g. painting).
    pub fn layout(&self) -> &RichLayout {
        &self.layout
    }

    /// Register the change callback. Replaces any previously registered callback.
    pub fn set_change_callback(&mut self, cb: impl FnMut(&EditorChange) + 'static) {
        self.change_callback = Some(Box::new(cb));
    }

    /// Register the input filter. Replaces any previously registered filter.
    pub fn set_input_filter(&mut self, filter: impl FnMut(&mut RichText) -> bool + 'static) {
        self.input_filter = Some(Box::new(filter));
    }

    /// §4.F "current selection": the composition's own caret while composing, else the stored
    /// selection. Every public query that accepts the "current selection" sentinel resolves it
    /// through this method at call time.
    pub fn selection(&self) -> TextRange {
        match &self.composition {
            Some(c) => c.selection(),
            None => self.selection,
        }
    }

    fn resolve_range(&self, range: Option<TextRange>) -> TextRange {
        range.unwrap_or_else(|| self.selection())
    }

    /// Relayout the document under `params`/`provider`. Hosts call this once before reading
    /// caret/hit-test geometry after any mutation; kept separate from mutation methods so a host
    /// can batch several edits before paying for one relayout, matching the teacher's own
    /// `LayoutEngine::rebuild` being a distinct step from `PieceTable` edits.
    pub fn relayout(&mut self, params: &LayoutParams, provider: &dyn LayoutProvider) {
        let ime = self.composition.as_ref().map(|c| (c.base, c.text.as_slice()));
        self.layout.set_from_rich_text(params, provider, &self.rich_text, ime);
    }

    fn notify(&mut self, kind: EditorChangeKind, text_delta: Option<TextDelta>) {
        let Some(cb) = self.change_callback.as_mut() else { return };
        #[cfg(debug_assertions)]
        {
            assert!(!self.in_callback, "change callback attempted to re-enter the editor");
            self.in_callback = true;
        }
        cb(&EditorChange { kind, text_delta });
        #[cfg(debug_assertions)]
        {
            self.in_callback = false;
        }
    }

    fn text_delta_for(before_len: u32, after_len: u32, start: u32, removed: &RichText, inserted: &RichText) -> TextDelta {
        TextDelta {
            before_len,
            after_len,
            edits: vec![crate::delta::TextDeltaEdit {
                start,
                deleted_text: removed.to_utf32(),
                inserted_text: inserted.to_utf32(),
            }],
        }
    }

    /// Re-derive [`Editor::active_attributes`] from the grapheme immediately before `pos`
    /// (spec §4.F "Active attributes"). Called after every caret-moving operation.
    fn rederive_active_attributes(&mut self, pos: TextPosition) {
        self.active_attributes.clear();
        if pos.offset == 0 {
            return;
        }
        let probe = pos.offset - 1;
        for para in &self.rich_text.paragraphs {
            let para_start = para.global_text_offset;
            let para_end = para_start + para.len();
            if probe < para_start || probe >= para_end {
                continue;
            }
            let local = probe - para_start;
            for span in &para.content.spans {
                if span.contains(local) {
                    self.active_attributes.retain(|a: &Attribute| a.kind != span.attribute.kind);
                    self.active_attributes.push(span.attribute.clone());
                }
            }
            break;
        }
    }

    fn set_selection_after_motion(&mut self, pos: TextPosition, extend: bool) {
        let anchor = if extend { self.selection.start } else { pos };
        self.selection = TextRange { start: anchor, end: pos };
        self.rederive_active_attributes(pos);
    }

    // ---- Navigation --------------------------------------------------------------------

    /// Move the caret one grapheme, per `forward` (spec §4.D character motion).
    pub fn move_char(&mut self, provider: &dyn LayoutProvider, forward: bool, extend: bool) {
        self.preferred_x = None;
        let pos = caret::move_char(&self.rich_text, &self.layout, provider, self.caret_mode, self.selection().end, forward, self.caret_mode == CaretMode::Skribidi);
        self.set_selection_after_motion(pos, extend);
    }

    /// Move the caret one word, per `forward` (spec §4.D word motion).
    pub fn move_word(&mut self, provider: &dyn LayoutProvider, forward: bool, extend: bool) {
        self.preferred_x = None;
        let pos = caret::move_word(&self.rich_text, provider, self.editor_behavior, self.selection().end, forward);
        self.set_selection_after_motion(pos, extend);
    }

    /// Move the caret to the start of its visual line.
    pub fn move_line_start(&mut self, provider: &dyn LayoutProvider, extend: bool) {
        self.preferred_x = None;
        let pos = caret::move_line_start(&self.rich_text, &self.layout, provider, self.selection().end);
        self.set_selection_after_motion(pos, extend);
    }

    /// Move the caret to the end of its visual line.
    pub fn move_line_end(&mut self, provider: &dyn LayoutProvider, extend: bool) {
        self.preferred_x = None;
        let pos = caret::move_line_end(&self.rich_text, &self.layout, provider, self.selection().end);
        self.set_selection_after_motion(pos, extend);
    }

    /// Move the caret to the start of the document.
    pub fn move_document_start(&mut self, extend: bool) {
        self.preferred_x = None;
        self.set_selection_after_motion(caret::move_document_start(), extend);
    }

    /// Move the caret to the end of the document.
    pub fn move_document_end(&mut self, extend: bool) {
        self.preferred_x = None;
        let pos = caret::move_document_end(&self.rich_text);
        self.set_selection_after_motion(pos, extend);
    }

    /// Move the caret vertically (Up/Down), tracking [`Editor::preferred_x`] across lines.
    pub fn move_vertical(&mut self, provider: &dyn LayoutProvider, down: bool, extend: bool) {
        let pos = caret::move_vertical(&self.rich_text, &self.layout, provider, self.selection().end, down, &mut self.preferred_x);
        self.set_selection_after_motion(pos, extend);
    }

    // ---- Text mutation ------------------------------------------------------------------

    /// Replace `range` (default: current selection) with `source` (default: empty, i.e. a pure
    /// deletion). Runs the input filter first; an empty result after filtering is a no-op.
    /// `allow_amend` controls whether this edit may coalesce with an adjacent undo state.
    pub fn replace_range(
        &mut self,
        range: Option<TextRange>,
        source: Option<&RichText>,
        allow_amend: bool,
    ) -> bool {
        let range = self.resolve_range(range).as_offset_range();
        let mut scratch = source.cloned().unwrap_or_default();
        if source.is_some() {
            if let Some(filter) = self.input_filter.as_mut() {
                let keep = filter(&mut scratch);
                if !keep || scratch.total_len() == 0 {
                    // Filter rejected the insert, or emptied it (spec §4.F/§7: the insert is
                    // skipped entirely — no change descriptor, no undo state, no callback).
                    return false;
                }
            }
        }

        let before_len = self.rich_text.total_len();
        let removed = self.rich_text.slice(range.clone());
        let inserted_len = scratch.total_len();

        self.undo.begin(self.selection());
        self.rich_text.insert_range(range.clone(), &scratch, 0..inserted_len);
        let after_len = self.rich_text.total_len();
        let inserted_range = range.start..(range.start + inserted_len);
        self.undo.record_text_edit(range.clone(), removed.clone(), inserted_range.clone(), scratch.clone(), allow_amend);

        let end_pos = TextPosition::new(inserted_range.end, Affinity::Leading);
        self.undo.end(TextRange::caret(end_pos));
        self.selection = TextRange::caret(end_pos);
        self.rederive_active_attributes(end_pos);

        let delta = Self::text_delta_for(before_len, after_len, range.start, &removed, &scratch);
        self.notify(EditorChangeKind::Text, Some(delta));
        true
    }

    /// Insert plain UTF-32 text at the current selection, replacing it. `allow_amend` is `true`
    /// for ordinary typed input (so consecutive keystrokes coalesce) and `false` for commands that
    /// should always start a fresh undo step (e.g. Enter, per the key-binding table).
    pub fn insert_codepoints(&mut self, cps: &[CodePoint], allow_amend: bool) -> bool {
        let mut source = RichText::from_code_points(cps, None);
        for attr in self.active_attributes.clone() {
            source.set_attribute(0..cps.len() as u32, attr, AttributeSpanFlags::empty(), None);
        }
        self.replace_range(None, Some(&source), allow_amend)
    }

    /// Delete the current selection, or one backward cluster from a caret via the backspace
    /// boundary scan (spec §4.D).
    pub fn backspace(&mut self, provider: &dyn LayoutProvider) -> bool {
        let sel = self.selection();
        if !sel.is_caret() {
            return self.replace_range(Some(sel), None, false);
        }
        let resolved = self.rich_text.resolve(provider, sel.end, AffinityUsage::Ignore);
        let Some(para) = self.rich_text.paragraphs.get(resolved.paragraph_idx) else { return false };
        if resolved.local_offset == 0 {
            if resolved.paragraph_idx == 0 {
                return false;
            }
            let prev = &self.rich_text.paragraphs[resolved.paragraph_idx - 1];
            let local_start = caret::backspace_boundary(&prev.content.text, prev.len());
            let start = prev.global_text_offset + local_start; // start of the separator cluster (1 unit for LF, 2 for CRLF)
            let range = TextRange::caret(TextPosition::new(start, Affinity::Trailing));
            let end = TextRange { start: range.start, end: sel.end };
            return self.replace_range(Some(end), None, false);
        }
        let local_start = caret::backspace_boundary(&para.content.text, resolved.local_offset);
        let start = para.global_text_offset + local_start;
        let range = TextRange { start: TextPosition::new(start, Affinity::Trailing), end: sel.end };
        self.replace_range(Some(range), None, false)
    }

    /// Delete the current selection, or one forward grapheme from a caret.
    pub fn delete_forward(&mut self, provider: &dyn LayoutProvider) -> bool {
        let sel = self.selection();
        if !sel.is_caret() {
            return self.replace_range(Some(sel), None, false);
        }
        let next = caret::move_char(&self.rich_text, &self.layout, provider, CaretMode::Simple, sel.end, true, false);
        if next.offset == sel.end.offset {
            return false;
        }
        self.replace_range(Some(TextRange { start: sel.end, end: next }), None, false)
    }

    /// Insert a paragraph separator (Enter). Never coalesces with adjacent undo states.
    pub fn insert_paragraph_break(&mut self) -> bool {
        self.insert_codepoints(&[0x000A], false)
    }

    // ---- Attributes ----------------------------------------------------------------------

    /// Toggle `attribute` over `range` (default: current selection), per spec §4.F: if every
    /// code point already carries an equal span, it is removed; otherwise it is applied. On a
    /// caret (empty selection) this only updates [`Editor::active_attributes`] for subsequent
    /// typed input.
    pub fn toggle_attribute(&mut self, range: Option<TextRange>, attribute: Attribute) {
        let resolved = self.resolve_range(range);
        if resolved.is_caret() {
            if self.active_attributes.iter().any(|a| *a == attribute) {
                self.active_attributes.retain(|a| a.kind != attribute.kind);
            } else {
                self.active_attributes.retain(|a| a.kind != attribute.kind);
                self.active_attributes.push(attribute);
            }
            return;
        }
        let r = resolved.as_offset_range();
        let before = self.rich_text.slice(r.clone());
        if self.rich_text.has_attribute(r.clone(), &attribute) {
            self.rich_text.clear_attribute(r.clone(), attribute.kind);
        } else {
            self.rich_text.clear_attribute(r.clone(), attribute.kind);
            self.rich_text.set_attribute(r.clone(), attribute, AttributeSpanFlags::empty(), None);
        }
        let after = self.rich_text.slice(r.clone());
        self.undo.begin(resolved);
        self.undo.record_attribute_edit(r, before, after);
        self.undo.end(resolved);
        self.notify(EditorChangeKind::Attributes, None);
    }

    /// Apply `delta` to a paragraph-level integer attribute (e.g. indent level) over every
    /// paragraph touched by `range` (default: current selection).
    pub fn adjust_paragraph_attribute(&mut self, range: Option<TextRange>, kind: AttributeKind, delta: i32) {
        let resolved = self.resolve_range(range);
        let r = resolved.as_offset_range();
        let before = self.rich_text.slice(r.clone());
        self.rich_text.set_paragraph_attribute_delta(r.clone(), kind, delta);
        let after = self.rich_text.slice(r.clone());
        self.undo.begin(resolved);
        self.undo.record_attribute_edit(r, before, after);
        self.undo.end(resolved);
        self.notify(EditorChangeKind::Attributes, None);
    }

    // ---- IME composition -------------------------------------------------------------------

    /// Begin or update an IME composition. The first call captures the composition base and, if
    /// the selection was non-empty, clears it with an amendable empty-insert undo state so a
    /// later commit coalesces into the same undo step (spec §4.F, and the §9 open-question
    /// resolution: `allow_amend` lives on the undo state, not a transient flag).
    pub fn set_composition(&mut self, cps: &[CodePoint], caret_position: u32) {
        if self.composition.is_none() {
            let sel = self.selection;
            let (lo, _) = sel.offset_ordered();
            if !sel.is_caret() {
                self.replace_range(Some(sel), None, true);
            }
            self.composition = Some(Composition { base: lo.offset, text: Vec::new(), caret_in_composition: 0 });
        }
        if let Some(c) = self.composition.as_mut() {
            c.text = cps.to_vec();
            c.caret_in_composition = caret_position.min(cps.len() as u32);
        }
    }

    /// Commit the composition: clears the overlay and performs a normal insert of `cps` (or the
    /// overlay's own text if `cps` is `None`). A commit without a prior `set_composition` is
    /// treated as a plain insert (spec §7).
    pub fn commit_composition(&mut self, cps: Option<&[CodePoint]>) -> bool {
        let committed = match (cps, self.composition.take()) {
            (Some(cps), _) => cps.to_vec(),
            (None, Some(c)) => c.text,
            (None, None) => Vec::new(),
        };
        if committed.is_empty() {
            return false;
        }
        self.insert_codepoints(&committed, false)
    }

    /// Discard the composition overlay without inserting anything.
    pub fn clear_composition(&mut self) {
        self.composition = None;
    }

    /// `true` if an IME composition is currently active.
    pub fn is_composing(&self) -> bool {
        self.composition.is_some()
    }

    // ---- Caret/selection geometry ----------------------------------------------------------

    /// Caret geometry at the current selection's active end, with a preview override (spec §4.F
    /// "Preview caret metrics") applied when [`Editor::active_attributes`] specifies a font
    /// different from the one the layout actually used.
    pub fn caret_info(&self, provider: &dyn LayoutProvider, fonts: &dyn FontProvider) -> Option<CaretInfo> {
        let pos = self.selection().end;
        let mut info = self.layout.caret_info(provider, &self.rich_text, pos)?;
        if let Some(family) = self.active_attributes.iter().find_map(|a| match (&a.kind, &a.payload) {
            (k, crate::attribute::AttributePayload::Text(name)) if *k == AttributeKind::FONT_FAMILY => Some(name.clone()),
            _ => None,
        }) {
            let query = FontQuery { family: Some(family), ..FontQuery::default() };
            if let Some(handle) = fonts.match_fonts(&query).first().copied() {
                let metrics = fonts.font_metrics(handle);
                let caret_metrics = fonts.caret_metrics(handle);
                info.ascender = metrics.ascender;
                info.descender = metrics.descender;
                info.slope = caret_metrics.slope;
            }
        }
        Some(info)
    }

    // ---- Mouse --------------------------------------------------------------------------

    /// A mouse-down event at document coordinates `(x, y)` (spec §6 mouse surface).
    pub fn on_mouse_down(&mut self, provider: &dyn LayoutProvider, x: f32, y: f32, extend: bool, time_ms: u64) {
        let pos = self.layout.hit_test(provider, MovementType::Character, x, y);
        if extend {
            self.selection = TextRange { start: self.selection.start, end: pos };
            self.rederive_active_attributes(pos);
            return;
        }
        self.drag.on_mouse_down(pos, time_ms);
        match self.drag.mode() {
            ClickMode::Char => {
                self.selection = TextRange::caret(pos);
            }
            ClickMode::Word => {
                let lo = caret::move_word(&self.rich_text, provider, self.editor_behavior, pos, false);
                let hi = caret::move_word(&self.rich_text, provider, self.editor_behavior, pos, true);
                self.drag.set_anchor_bounds((lo, hi));
                self.selection = TextRange { start: lo, end: hi };
            }
            ClickMode::Line => {
                let lo = caret::move_line_start(&self.rich_text, &self.layout, provider, pos);
                let hi = caret::move_line_end(&self.rich_text, &self.layout, provider, pos);
                self.drag.set_anchor_bounds((lo, hi));
                self.selection = TextRange { start: lo, end: hi };
            }
        }
        self.rederive_active_attributes(self.selection.end);
    }

    /// A mouse-drag event at document coordinates `(x, y)`.
    pub fn on_mouse_drag(&mut self, provider: &dyn LayoutProvider, x: f32, y: f32) {
        let pos = self.layout.hit_test(provider, MovementType::Character, x, y);
        let bounds = match self.drag.mode() {
            ClickMode::Char => (pos, pos),
            ClickMode::Word => (
                caret::move_word(&self.rich_text, provider, self.editor_behavior, pos, false),
                caret::move_word(&self.rich_text, provider, self.editor_behavior, pos, true),
            ),
            ClickMode::Line => (
                caret::move_line_start(&self.rich_text, &self.layout, provider, pos),
                caret::move_line_end(&self.rich_text, &self.layout, provider, pos),
            ),
        };
        let (start, end) = self.drag.on_drag(pos, bounds);
        self.selection = TextRange { start, end };
        self.rederive_active_attributes(end);
    }

    // ---- Keyboard dispatch ----------------------------------------------------------------

    /// Dispatch one keyboard event per the key-binding table in spec §6. Returns `true` if the
    /// key was handled.
    pub fn on_key(&mut self, provider: &dyn LayoutProvider, key: Key, mods: Modifiers) -> bool {
        let extend = mods.contains(Modifiers::SHIFT);
        let word_mod = match self.editor_behavior {
            EditorBehavior::Default => mods.contains(Modifiers::CONTROL),
            EditorBehavior::MacOs => mods.contains(Modifiers::OPTION),
        };
        let doc_mod = match self.editor_behavior {
            EditorBehavior::Default => mods.contains(Modifiers::CONTROL),
            EditorBehavior::MacOs => mods.contains(Modifiers::COMMAND),
        };
        let line_mod = self.editor_behavior == EditorBehavior::MacOs && mods.contains(Modifiers::COMMAND);

        match key {
            Key::Left | Key::Right => {
                let forward = key == Key::Right;
                if word_mod {
                    self.move_word(provider, forward, extend);
                } else if line_mod {
                    if forward {
                        self.move_line_end(provider, extend);
                    } else {
                        self.move_line_start(provider, extend);
                    }
                } else {
                    self.move_char(provider, forward, extend);
                }
                true
            }
            Key::Up | Key::Down => {
                let down = key == Key::Down;
                if doc_mod {
                    if down {
                        self.move_document_end(extend);
                    } else {
                        self.move_document_start(extend);
                    }
                } else {
                    self.move_vertical(provider, down, extend);
                }
                true
            }
            Key::Home => {
                if doc_mod {
                    self.move_document_start(extend);
                } else {
                    self.move_line_start(provider, extend);
                }
                true
            }
            Key::End => {
                if doc_mod {
                    self.move_document_end(extend);
                } else {
                    self.move_line_end(provider, extend);
                }
                true
            }
            Key::Backspace => {
                self.backspace(provider);
                true
            }
            Key::Delete => {
                self.delete_forward(provider);
                true
            }
            Key::Enter => {
                self.insert_paragraph_break();
                true
            }
        }
    }

    // ---- Undo/redo --------------------------------------------------------------------------

    /// Undo the most recent transaction, restoring text/attributes/selection.
    pub fn undo(&mut self) -> bool {
        let Some(selection) = self.undo.apply_undo(&mut self.rich_text) else { return false };
        self.selection = selection;
        self.rederive_active_attributes(selection.end);
        self.notify(EditorChangeKind::Text, None);
        true
    }

    /// Redo the most recently undone transaction.
    pub fn redo(&mut self) -> bool {
        let Some(selection) = self.undo.apply_redo(&mut self.rich_text) else { return false };
        self.selection = selection;
        self.rederive_active_attributes(selection.end);
        self.notify(EditorChangeKind::Text, None);
        true
    }

    /// `true` if there is a transaction to undo.
    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    /// `true` if there is a transaction to redo.
    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Mark the current history position as saved.
    pub fn mark_clean(&mut self) {
        self.undo.mark_clean();
    }

    /// `true` if the document matches its last-marked-clean state.
    pub fn is_clean(&self) -> bool {
        self.undo.is_clean()
    }

    // ---- Clipboard-adjacent queries ---------------------------------------------------------

    /// The current selection's text as UTF-32 code points.
    pub fn selection_text_utf32(&self) -> Vec<CodePoint> {
        self.rich_text.slice(self.selection().as_offset_range()).to_utf32()
    }

    /// The current selection's text as a UTF-8 `String` (lossy for unpaired surrogates, which
    /// cannot occur in well-formed input but are handled gracefully rather than panicking).
    pub fn selection_text_utf8(&self) -> String {
        self.selection_text_utf32().iter().filter_map(|&cp| char::from_u32(cp)).collect()
    }

    /// The current selection as a standalone [`RichText`], preserving attribute spans.
    pub fn selection_rich_text(&self) -> RichText {
        self.rich_text.slice(self.selection().as_offset_range())
    }

    /// Paste plain UTF-8 text at the current selection.
    pub fn paste_utf8(&mut self, text: &str) -> bool {
        let cps: Vec<CodePoint> = text.chars().map(|c| c as u32).collect();
        self.paste_utf32(&cps)
    }

    /// Paste plain UTF-32 code points at the current selection.
    pub fn paste_utf32(&mut self, cps: &[CodePoint]) -> bool {
        let source = RichText::from_code_points(cps, None);
        self.replace_range(None, Some(&source), false)
    }

    /// Paste a [`RichText`] (preserving its attribute spans) at the current selection.
    pub fn paste_rich_text(&mut self, source: &RichText) -> bool {
        self.replace_range(None, Some(source), false)
    }

    /// Cut the current selection: returns its text and removes it.
    pub fn cut(&mut self) -> RichText {
        let cut = self.selection_rich_text();
        self.replace_range(None, None, false);
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributePayload;
    use crate::collaborators::test_support::TestLayoutProvider;

    fn params() -> LayoutParams {
        LayoutParams { width: 400.0, tab_width: 32.0, line_height_multiplier: 1.0 }
    }

    fn cps(s: &str) -> Vec<CodePoint> {
        s.chars().map(|c| c as u32).collect()
    }

    #[test]
    fn s1_insert_lf_splits_paragraph_and_moves_caret() {
        let mut editor = Editor::new(EditorParams::default());
        let provider = TestLayoutProvider::new();
        editor.paste_utf32(&cps("abc"));
        editor.relayout(&params(), &provider);
        editor.selection = TextRange::caret(TextPosition::new(2, Affinity::Trailing));
        editor.insert_codepoints(&[0x000A], false);
        assert_eq!(editor.rich_text.paragraphs.len(), 2);
        assert_eq!(editor.selection().end.offset, 3);
    }

    #[test]
    fn s3_typed_characters_coalesce_into_one_undo() {
        let mut editor = Editor::new(EditorParams::default());
        editor.insert_codepoints(&cps("h"), true);
        editor.insert_codepoints(&cps("i"), true);
        assert!(editor.can_undo());
        editor.undo();
        assert_eq!(editor.rich_text.to_utf32(), Vec::<CodePoint>::new());
        assert_eq!(editor.selection().end.offset, 0);
        editor.redo();
        assert_eq!(editor.rich_text.to_utf32(), cps("hi"));
        assert_eq!(editor.selection().end.offset, 2);
    }

    #[test]
    fn s5_attribute_toggle_undoes_and_redoes() {
        let mut editor = Editor::new(EditorParams::default());
        editor.paste_utf32(&cps("hello"));
        let bold = Attribute::new(AttributeKind::FONT_WEIGHT, AttributePayload::Int(700));
        let range = TextRange { start: TextPosition::new(1, Affinity::Trailing), end: TextPosition::new(4, Affinity::Trailing) };
        editor.toggle_attribute(Some(range), bold.clone());
        assert!(editor.rich_text.has_attribute(1..4, &bold));
        editor.undo();
        assert!(!editor.rich_text.has_attribute(1..4, &bold));
        editor.redo();
        assert!(editor.rich_text.has_attribute(1..4, &bold));
    }

    #[test]
    fn s6_ime_commit_inserts_as_single_undo_state() {
        let mut editor = Editor::new(EditorParams::default());
        editor.set_composition(&[0x4f60], 1); // "你"
        assert!(editor.is_composing());
        assert_eq!(editor.selection().end.offset, 1);
        editor.commit_composition(None);
        assert!(!editor.is_composing());
        assert_eq!(editor.rich_text.to_utf32(), vec![0x4f60]);
        assert_eq!(editor.selection().end.offset, 1);
        assert!(editor.can_undo());
        editor.undo();
        assert_eq!(editor.rich_text.to_utf32(), Vec::<CodePoint>::new());
    }

    #[test]
    fn backspace_on_flag_sequence_removes_both_scalars() {
        let mut editor = Editor::new(EditorParams::default());
        editor.paste_utf32(&[('A' as u32), 0x1F1EB, 0x1F1EE]); // "A" + RI F + RI I
        let provider = TestLayoutProvider::new();
        editor.relayout(&params(), &provider);
        editor.selection = TextRange::caret(TextPosition::new(3, Affinity::Trailing));
        editor.backspace(&provider);
        assert_eq!(editor.rich_text.to_utf32(), vec!['A' as u32]);
    }

    #[test]
    fn backspace_at_paragraph_start_removes_whole_crlf_separator() {
        let mut editor = Editor::new(EditorParams::default());
        let provider = TestLayoutProvider::new();
        editor.paste_utf32(&cps("a\r\nb"));
        editor.relayout(&params(), &provider);
        // Caret at the start of the second paragraph ("b").
        editor.selection = TextRange::caret(TextPosition::new(3, Affinity::Trailing));
        editor.backspace(&provider);
        // Both CR and LF must be removed together, leaving "ab" with no orphan CR.
        assert_eq!(editor.rich_text.to_utf32(), cps("ab"));
    }

    #[test]
    fn click_then_drag_extends_word_selection() {
        let mut editor = Editor::new(EditorParams::default());
        editor.paste_utf32(&cps("hello world"));
        let provider = TestLayoutProvider::new();
        editor.relayout(&params(), &provider);
        editor.on_mouse_down(&provider, 1.0 * 8.0, 0.0, false, 0);
        editor.on_mouse_down(&provider, 1.0 * 8.0, 0.0, false, 100); // double click -> word mode
        assert_eq!(editor.drag.mode(), ClickMode::Word);
        editor.on_mouse_drag(&provider, 9.0 * 8.0, 0.0);
        assert_eq!(editor.selection().as_offset_range(), 0..11);
    }
}
