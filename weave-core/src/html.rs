//! HTML text helpers shared by the in-memory document and the server.

use indexmap::IndexMap;

/// Escape text content: `&`, `<` and `>`.
pub fn escape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape a double-quoted attribute value: text escapes plus `"`.
pub fn escape_attr(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}

/// Parse an inline style declaration list into property/value pairs.
pub fn parse_style(s: &str) -> IndexMap<String, String> {
    s.split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim();
            (!property.is_empty()).then(|| (property.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Serialize property/value pairs as an inline style declaration list.
pub fn serialize_style(style: &IndexMap<String, String>) -> String {
    style
        .iter()
        .map(|(property, value)| format!("{property}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Elements that never have content or a closing tag.
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}
