//! Small helpers shared by the fragment renderers.
use serde_json::Value;

/// Escape text for safe interpolation into HTML bodies and quoted attributes.
pub fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Plain-text rendering of a JSON value as it appears in a table cell.
///
/// Strings are shown without quotes, arrays are comma-joined, objects fall back to compact JSON.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(","),
        Value::Object(_) => v.to_string(),
    }
}

/// Loose truthiness used when probing payload fields (`error`, `message`, ...).
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `true` for absolute `http://` or `https://` links.
pub fn is_web_url(s: &str) -> bool {
    let s = s.trim_start();
    ["http://", "https://"]
        .iter()
        .any(|scheme| s.get(..scheme.len()).is_some_and(|p| p.eq_ignore_ascii_case(scheme)))
}

/// Pretty-printed JSON inside the raw result box.
pub fn raw_box(v: &Value) -> String {
    let pretty = serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string());
    format!(r#"<div class="result-box">{}</div>"#, escape(&pretty))
}
