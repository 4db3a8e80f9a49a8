#![warn(missing_docs)]
//! Rich Editor Core — a headless rich-text editing kernel.
//!
//! # Overview
//!
//! `rich_editor_core` owns the document model, incremental layout cache, caret/selection state
//! machine, and transactional undo history for a rich-text document. It does not shape glyphs,
//! run the bidirectional algorithm, or paint anything; those concerns are supplied by a host
//! through the [`collaborators`] trait boundary, the same way the host supplies a
//! `LayoutProvider`/`FontProvider` pair rather than the engine embedding a shaping stack.
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Editor Façade (selection, IME, undo wiring) │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Undo Engine (nested transactions)           │
//! ├─────────────────────────────────────────────┤
//! │  Caret Engine (motion, backspace, drag)      │
//! ├─────────────────────────────────────────────┤
//! │  Rich Layout (incremental per-paragraph cache)│
//! ├─────────────────────────────────────────────┤
//! │  Rich Text (paragraphs, global offsets)      │
//! ├─────────────────────────────────────────────┤
//! │  Attributed Text (per-paragraph spans)       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use rich_editor_core::{Editor, EditorParams};
//!
//! let mut editor = Editor::new(EditorParams::default());
//!
//! editor.paste_utf8("hello");
//! assert_eq!(editor.rich_text().to_utf32().len(), 5);
//!
//! editor.undo();
//! assert_eq!(editor.rich_text().to_utf32().len(), 0);
//! ```
//!
//! # Module Description
//!
//! - [`attribute`] - attribute tags, payloads, and spans (§4.A)
//! - [`attributed_text`] - per-paragraph code-point buffer plus spans (§4.A)
//! - [`rich_text`] - paragraph sequence with global-offset indexing (§4.B)
//! - [`rich_layout`] - incremental layout cache (§4.C)
//! - [`caret`] - caret motion, backspace boundary scan, drag state (§4.D)
//! - [`undo`] - nested-transaction undo engine (§4.E)
//! - [`editor`] - the façade tying every layer together (§4.F)
//! - [`delta`] - structured text-change deltas for host integrations
//! - [`collaborators`] - external trait contracts (layout, font)
//! - [`position`] - text position and affinity primitives
//! - [`line_ending`] - paragraph-separator classification and CRLF normalization

pub mod attribute;
pub mod attributed_text;
pub mod caret;
pub mod collaborators;
pub mod delta;
pub mod editor;
pub mod line_ending;
pub mod position;
pub mod rich_layout;
pub mod rich_text;
pub mod undo;

pub use attribute::{Attribute, AttributeKind, AttributePayload, AttributeSpan, AttributeSpanFlags};
pub use attributed_text::AttributedText;
pub use caret::{CaretMode, ClickMode, DragState, EditorBehavior};
pub use collaborators::{CaretInfo, Direction, FontProvider, LayoutParams, LayoutProvider, Rect};
pub use delta::{TextDelta, TextDeltaEdit};
pub use editor::{Editor, EditorChange, EditorChangeKind, EditorParams, Key, Modifiers};
pub use line_ending::LineEnding;
pub use position::{Affinity, CodePoint, TextPosition, TextRange};
pub use rich_layout::RichLayout;
pub use rich_text::{ChangeDescriptor, Paragraph, RichText};
pub use undo::UndoEngine;
