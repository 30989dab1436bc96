use super::state::PageDocument;
use regex::Regex;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strips `http(s)://` tokens, collapses whitespace and trims.
pub fn remove_urls(text: &str) -> String {
    let without_urls = URL_PATTERN.replace_all(text, "");
    WHITESPACE
        .replace_all(&without_urls, " ")
        .trim()
        .to_string()
}

/// Post length as the router measures it: characters, links excluded.
pub fn post_length(post: &str) -> usize {
    remove_urls(post).chars().count()
}

pub fn format_docs(docs: &[PageDocument]) -> String {
    let body = docs
        .iter()
        .enumerate()
        .map(|(index, doc)| {
            format!(
                "<document index=\"{index}\" url=\"{}\">\n{}\n</document>",
                doc.url, doc.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("<documents>\n{body}\n</documents>")
}

/// Truncate to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
