//! Helpers for pulling structured payloads out of free-form model output.

use serde::de::DeserializeOwned;

/// Returns the text between `<tag>` and `</tag>`, trimmed.
pub fn extract_tagged(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].trim().to_string())
}

/// Locates the first JSON object in `text`, tolerating code fences and prose.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse_structured<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
    let json = extract_json(text)
        .ok_or_else(|| anyhow::anyhow!("model output contains no JSON object"))?;
    serde_json::from_str(json).map_err(|e| anyhow::anyhow!("malformed model JSON: {e}"))
}
