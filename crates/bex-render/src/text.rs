//! Small text helpers shared by the renderers.

/// Escape a string for use in HTML text content.
#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Quote a string as an HTML attribute value, quotes included.
#[must_use]
pub fn attr(value: &str) -> String {
    format!("\"{}\"", escape_html(value))
}

/// Make a string safe to use as a file or directory name.
#[must_use]
pub fn sanitize_filename(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control() && !matches!(ch, '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>'))
        .collect::<String>()
        .trim()
        .to_string()
}
