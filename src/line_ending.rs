//! Line-ending helpers and paragraph-separator classification.
//!
//! The rich-text model is code-point indexed and paragraph-segmented (§4.B). A paragraph ends
//! with exactly one paragraph separator: LF, CR+LF (stored verbatim as its original two code
//! points and always treated as a single separator — see [`paragraph_separator_len`] and
//! [`crate::caret::backspace_boundary`]), or one of the Unicode `Bidi_Paragraph_Separator` code
//! points. No newline normalization happens on load; [`LineEnding::detect_in_text`] /
//! [`LineEnding::apply_to_text`] are for hosts that want to normalize at their own load/save
//! boundary, outside this crate.

/// The preferred newline sequence used when serializing a document back to UTF-8 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// Unix-style LF (`'\n'`).
    Lf,
    /// Windows-style CRLF (`"\r\n"`).
    Crlf,
}

impl LineEnding {
    /// Detect the dominant line ending from source text.
    ///
    /// Policy: if the input contains any CRLF (`"\r\n"`), returns [`LineEnding::Crlf`],
    /// otherwise [`LineEnding::Lf`].
    pub fn detect_in_text(text: &str) -> Self {
        if text.contains("\r\n") {
            Self::Crlf
        } else {
            Self::Lf
        }
    }

    /// Convert an LF-normalized text to this line ending for saving.
    pub fn apply_to_text(self, text: &str) -> String {
        match self {
            Self::Lf => text.to_string(),
            Self::Crlf => text.replace('\n', "\r\n"),
        }
    }
}

/// Code points that end a paragraph, per the Unicode `Bidi_Paragraph_Separator` property plus
/// the plain LF used internally for CRLF-normalized text.
const BIDI_PARAGRAPH_SEPARATORS: [u32; 6] = [
    0x000A, // LF
    0x000D, // CR (only reached when not immediately followed by LF; see `paragraph_separator_len`)
    0x001C, 0x001D, 0x001E, // information separators
    0x0085, // NEL
];

const PARAGRAPH_SEPARATOR_PS: u32 = 0x2029;

/// Returns the length (in code points) of the paragraph separator starting at `text[at]`, or
/// `None` if `text[at]` does not begin one.
///
/// CR+LF is reported as a single two-code-point separator; LF, Unicode `Bidi_Paragraph_Separator`
/// code points, and U+2029 PARAGRAPH SEPARATOR are reported as length 1.
pub fn paragraph_separator_len(text: &[u32], at: usize) -> Option<usize> {
    let cp = *text.get(at)?;
    if cp == 0x000D {
        if text.get(at + 1) == Some(&0x000A) {
            return Some(2);
        }
        return Some(1);
    }
    if cp == PARAGRAPH_SEPARATOR_PS || BIDI_PARAGRAPH_SEPARATORS.contains(&cp) {
        return Some(1);
    }
    None
}

/// Returns `true` if `text` ends with exactly one paragraph separator.
pub fn ends_with_paragraph_separator(text: &[u32]) -> bool {
    if text.is_empty() {
        return false;
    }
    // Scan backward for the longest separator ending at `text.len()`.
    if text.len() >= 2 && text[text.len() - 2] == 0x000D && text[text.len() - 1] == 0x000A {
        return true;
    }
    let last = text[text.len() - 1];
    last == 0x000A || last == PARAGRAPH_SEPARATOR_PS || BIDI_PARAGRAPH_SEPARATORS.contains(&last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_crlf() {
        assert_eq!(LineEnding::detect_in_text("a\r\nb"), LineEnding::Crlf);
        assert_eq!(LineEnding::detect_in_text("a\nb"), LineEnding::Lf);
    }

    #[test]
    fn crlf_counts_as_one_separator() {
        let text: Vec<u32> = "a\r\nb".chars().map(|c| c as u32).collect();
        assert_eq!(paragraph_separator_len(&text, 1), Some(2));
    }

    #[test]
    fn lf_is_one_separator() {
        let text: Vec<u32> = "a\nb".chars().map(|c| c as u32).collect();
        assert_eq!(paragraph_separator_len(&text, 1), Some(1));
        assert!(ends_with_paragraph_separator(&"a\n".chars().map(|c| c as u32).collect::<Vec<_>>()));
        assert!(!ends_with_paragraph_separator(&"a".chars().map(|c| c as u32).collect::<Vec<_>>()));
    }
}
