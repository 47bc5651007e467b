//! Text utilities shared by the synchronizers.
//!
//! Everything the remote hands us — titles, authors, bodies — may contain
//! HTML, entities, and raw control whitespace. These helpers normalize that
//! into the plain single-line text the cache stores.

mod text;

pub use text::{collapse_whitespace, html_to_text, truncate_chars, ELLIPSIS};
