// Helpers that shape submitted files before an adapter parses them
use proctor_common::FileMap;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Document used when a markup submission has no HTML file
pub const EMPTY_DOCUMENT: &str = "<html><body></body></html>";

fn body_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body>").expect("body regex must compile"))
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<link\s+[^>]*href="([^"]+)"[^>]*/?>"#).expect("link regex must compile")
    })
}

fn script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<script\s+[^>]*src="([^"]+)"[^>]*>\s*</script>"#)
            .expect("script regex must compile")
    })
}

fn style_close_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)</style").expect("style regex must compile"))
}

/// Inner markup of `<body>`, or the whole document when it has none
pub fn extract_body_content(html: &str) -> &str {
    match body_pattern().captures(html).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => html,
    }
}

/// Inline `<link href>` and `<script src>` references to submitted files.
///
/// References to names that are not in `files` are left untouched.
pub fn resolve_file_references(html: &str, files: &FileMap) -> String {
    let linked = link_pattern().replace_all(html, |caps: &Captures| match files.get(&caps[1]) {
        Some(code) => format!("<style>{}</style>", escape_style_text(code)),
        None => caps[0].to_string(),
    });

    script_pattern()
        .replace_all(&linked, |caps: &Captures| match files.get(&caps[1]) {
            Some(code) => format!("<script>{}</script>", code),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Keep stylesheet text from closing its `<style>` element early
pub fn escape_style_text(css: &str) -> String {
    style_close_pattern().replace_all(css, "<\\/style").into_owned()
}
