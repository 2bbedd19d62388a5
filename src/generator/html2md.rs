use html2md::parse_html;
use once_cell::sync::Lazy;
use regex::Regex;

static NON_CONTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)\s*>")
        .expect("valid regex")
});

pub fn run(bytes: &[u8]) -> Result<String, String> {
    let html_content = String::from_utf8_lossy(bytes);

    let markdown = html_to_markdown(&html_content);

    if markdown.trim().is_empty() {
        return Err("Empty or invalid HTML content".to_string());
    }

    Ok(markdown)
}

/// Shared with the EPUB generator, whose chapters are XHTML documents.
pub(crate) fn html_to_markdown(html: &str) -> String {
    let cleaned = NON_CONTENT.replace_all(html, "");
    parse_html(&cleaned)
}
