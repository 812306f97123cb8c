//! Post-processing of model output.
//!
//! Two rules, applied in order:
//!
//! 1. Remove every code point outside 7-bit ASCII.
//! 2. Trim leading and trailing whitespace, counting the ASCII separators
//!    U+001C..=U+001F as whitespace.
//!
//! Rule 1 is lossy: accented names, `µ`, `°`, currency signs and typographic
//! dashes disappear (`"µg/dL"` becomes `"g/dL"`). Both rules together are
//! idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_NON_ASCII: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x00-\x7F]+").unwrap());

/// Normalise raw model text for display.
pub fn clean_result(raw: &str) -> String {
    strip_non_ascii(raw).trim_matches(is_trimmable).to_string()
}

fn is_trimmable(c: char) -> bool {
    c.is_ascii_whitespace() || matches!(c, '\x0b' | '\x1c'..='\x1f')
}

// ── Rule 1: Strip non-ASCII ──────────────────────────────────────────────────

fn strip_non_ascii(input: &str) -> std::borrow::Cow<'_, str> {
    RE_NON_ASCII.replace_all(input, "")
}
