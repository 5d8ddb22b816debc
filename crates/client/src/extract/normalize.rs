//! Whitespace normalization for extracted text.

use webchat_core::{MAX_CONTENT_CHARS, content::truncate_chars};

/// Collapse every whitespace run (newlines included) to one space and trim.
pub fn clean_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Join fields with single spaces, clean, and cap at [`MAX_CONTENT_CHARS`].
pub fn combine_fields<S: AsRef<str>>(fields: &[S]) -> String {
    let joined = fields.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
    truncate_chars(clean_text(&joined), MAX_CONTENT_CHARS)
}
