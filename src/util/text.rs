use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

/// Render width passed to html2text. Long lines get re-joined by
/// [`collapse_whitespace`] afterwards, so the exact value only affects
/// intermediate wrapping.
const RENDER_WIDTH: usize = 200;

/// Ellipsis marker appended when a summary is cut short.
pub const ELLIPSIS: char = '…';

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\r\n]+").unwrap())
}

/// Converts an HTML fragment to plain text.
///
/// Tags are dropped, entities are decoded, and all whitespace runs (including
/// the newlines introduced by line wrapping) collapse to single spaces. Feeds
/// put markup in the strangest places — titles included — so this is applied
/// to every remote-supplied text field before it reaches the cache.
pub fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let text = html2text::config::plain()
        .string_from_read(html.as_bytes(), RENDER_WIDTH)
        .unwrap_or_else(|_| {
            // html2text refuses some malformed fragments; a bare tag strip is
            // still better than passing markup through.
            tag_re().replace_all(html, " ").into_owned()
        });
    collapse_whitespace(&text).into_owned()
}

/// Collapses whitespace runs to single spaces and trims the ends.
pub fn collapse_whitespace(s: &str) -> Cow<'_, str> {
    let trimmed = s.trim();
    if !trimmed.contains(['\n', '\t', '\r']) && !trimmed.contains("  ") {
        return Cow::Borrowed(trimmed);
    }
    Cow::Owned(ws_re().replace_all(trimmed, " ").into_owned())
}

/// Truncates a string to a character budget.
///
/// When the input exceeds `max_chars`, the result holds the first
/// `max_chars - 1` characters followed by `…`; otherwise the input is returned
/// unchanged. The marker is only present when truncation actually occurred.
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }
    match s.char_indices().nth(max_chars) {
        // Fewer than or exactly max_chars characters: fits as-is.
        None => Cow::Borrowed(s),
        Some(_) => {
            let cut = s
                .char_indices()
                .nth(max_chars - 1)
                .map(|(idx, _)| idx)
                .unwrap_or(0);
            let mut out = String::with_capacity(cut + ELLIPSIS.len_utf8());
            out.push_str(&s[..cut]);
            out.push(ELLIPSIS);
            Cow::Owned(out)
        }
    }
}
