//! Label decoding
//!
//! The platform stores built-in labels wrapped as `_$!<Name>!$_`. Custom
//! labels and labels coming through scripting bridges arrive as plain text.

use regex::Regex;
use std::sync::LazyLock;

/// Prefix the platform puts in front of encoded labels
pub const ENCODED_LABEL_MARKER: &str = "_$!";

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(.*)>").expect("static label pattern is valid"));

/// Decode a raw platform label into its canonical lowercase form.
///
/// Marker without a bracketed name falls back to the lowercased input.
pub fn decode_label(raw: &str) -> String {
    let mut label = raw;

    if label.starts_with(ENCODED_LABEL_MARKER) {
        if let Some(caps) = BRACKETED.captures(label) {
            if let Some(inner) = caps.get(1) {
                label = inner.as_str();
            }
        }
    }

    label.to_lowercase()
}
