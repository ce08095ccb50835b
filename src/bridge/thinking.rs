//! Cross-chunk removal of "thinking" spans from assistant text.
//!
//! Recognized markers are `<think>`, `<thinking>`, `<thought>` and
//! `<antthinking>` with their closing forms, case-insensitive and with
//! whitespace allowed inside the brackets (`< Thinking >`, `</ think>`).
//!
//! [`ThinkingStripper`] is a two-state machine (normal / inside thinking).
//! A span ends only at the closing marker with the same name as its opener:
//! `<thinking>a</thought>b` hides everything after `<thinking>`.
//! Fragments are pushed as they stream in; a `<` that might still become a
//! marker is held back as the *tail* until enough input arrives to decide,
//! so a marker split across chunks is still recognized.

/// Marker names, lowercase.
const TAG_NAMES: &[&str] = &["think", "thinking", "thought", "antthinking"];

/// Longest possible marker is `<` + `/` + `antthinking` + `>` plus a little
/// inner whitespace; anything longer cannot be a marker.
const MAX_TAG_LEN: usize = 32;

/// Incremental thinking-span stripper.
#[derive(Debug, Clone, Default)]
pub struct ThinkingStripper {
    /// Name of the marker that opened the current span.
    open: Option<&'static str>,
    tail: String,
    visible: String,
}

/// Result of scanning text that starts with `<`.
#[derive(Debug, PartialEq, Eq)]
enum TagScan {
    /// A complete marker of `len` bytes.
    Complete {
        closing: bool,
        name: &'static str,
        len: usize,
    },
    /// Input ends before the marker could be decided.
    Partial,
    /// Not a marker; the `<` is ordinary text.
    NotATag,
}

impl ThinkingStripper {
    /// Empty stripper in the normal state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next fragment.
    pub fn push(&mut self, fragment: &str) {
        if self.open.is_none() && self.tail.is_empty() && !fragment.contains('<') {
            self.visible.push_str(fragment);
            return;
        }

        let mut input = std::mem::take(&mut self.tail);
        input.push_str(fragment);
        let mut rest = input.as_str();

        while let Some(open) = rest.find('<') {
            self.emit(&rest[..open]);
            let candidate = &rest[open..];

            match scan_tag(candidate) {
                TagScan::Complete { closing, name, len } => {
                    match (self.open, closing) {
                        // Stray closing marker outside a span stays as text.
                        (None, true) => self.emit(&candidate[..len]),
                        (None, false) => self.open = Some(name),
                        (Some(opener), true) if opener == name => self.open = None,
                        // Mismatched or nested markers inside a span are hidden.
                        (Some(_), _) => {}
                    }
                    rest = &candidate[len..];
                }
                TagScan::Partial => {
                    self.tail = candidate.to_owned();
                    return;
                }
                TagScan::NotATag => {
                    self.emit("<");
                    rest = &candidate[1..];
                }
            }
        }

        self.emit(rest);
    }

    /// Visible text so far, excluding any undecided tail.
    #[must_use]
    pub fn visible(&self) -> &str {
        &self.visible
    }

    /// Whether an opening marker is currently unclosed.
    #[must_use]
    pub fn in_thinking(&self) -> bool {
        self.open.is_some()
    }

    /// End of input: an undecided tail outside a span is ordinary text.
    pub fn finish(&mut self) {
        let tail = std::mem::take(&mut self.tail);
        self.emit(&tail);
    }

    /// Return to the initial state.
    pub fn reset(&mut self) {
        self.open = None;
        self.tail.clear();
        self.visible.clear();
    }

    fn emit(&mut self, text: &str) {
        if self.open.is_none() {
            self.visible.push_str(text);
        }
    }
}

/// Strip thinking spans from a complete text.
#[must_use]
pub fn strip_thinking(text: &str) -> String {
    if !text.contains('<') {
        return text.to_owned();
    }
    let mut stripper = ThinkingStripper::new();
    stripper.push(text);
    stripper.finish();
    stripper.visible
}

/// Scan `text` (which starts with `<`) for a marker.
fn scan_tag(text: &str) -> TagScan {
    let bytes = text.as_bytes();
    let mut pos = 1;

    let skip_ws = |mut pos: usize| {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        pos
    };

    pos = skip_ws(pos);
    let closing = bytes.get(pos) == Some(&b'/');
    if closing {
        pos += 1;
    }
    pos = skip_ws(pos);

    let name_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
        pos += 1;
    }
    let name = text[name_start..pos].to_ascii_lowercase();

    if pos >= MAX_TAG_LEN {
        return TagScan::NotATag;
    }

    if pos == bytes.len() {
        // Name may still be growing.
        return if TAG_NAMES.iter().any(|tag| tag.starts_with(name.as_str())) {
            TagScan::Partial
        } else {
            TagScan::NotATag
        };
    }

    let Some(&name) = TAG_NAMES.iter().find(|tag| **tag == name) else {
        return TagScan::NotATag;
    };

    pos = skip_ws(pos);
    match bytes.get(pos) {
        Some(b'>') => TagScan::Complete {
            closing,
            name,
            len: pos + 1,
        },
        None if pos < MAX_TAG_LEN => TagScan::Partial,
        _ => TagScan::NotATag,
    }
}
