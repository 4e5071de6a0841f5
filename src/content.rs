//! HTML text utilities shared by blog storage and exports.

use regex::{Captures, Regex};

/// Average reading speed used for reading-time estimates.
pub const WORDS_PER_MINUTE: usize = 200;

lazy_static::lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new(r"(?s)<!--.*?-->|<[^>]*>").unwrap();
    static ref NAMED_TAG_REGEX: Regex =
        Regex::new(r"(?s)<!--.*?-->|</?([a-zA-Z][a-zA-Z0-9]*)\b[^>]*>").unwrap();
    static ref WORD_REGEX: Regex = Regex::new(r"\p{L}[\p{L}'\-]*").unwrap();
}

/// Remove every tag (and comment), keeping the text between them.
pub fn strip_tags(html: &str) -> String {
    TAG_REGEX.replace_all(html, "").into_owned()
}

/// Remove every tag except those whose (case-insensitive) name is in `allowed`.
pub fn strip_tags_except(html: &str, allowed: &[&str]) -> String {
    NAMED_TAG_REGEX
        .replace_all(html, |caps: &Captures| match caps.get(1) {
            Some(name) if allowed.contains(&name.as_str().to_ascii_lowercase().as_str()) => {
                caps[0].to_string()
            }
            _ => String::new(),
        })
        .into_owned()
}

/// Count words in an HTML fragment. A word is a run of letters that may
/// contain apostrophes and hyphens.
pub fn word_count(html: &str) -> usize {
    // Tags separate words: `</p><p>` must not join the neighbouring text.
    let text = TAG_REGEX.replace_all(html, " ");
    WORD_REGEX.find_iter(&text).count()
}

/// Estimated reading time in whole minutes, never less than one.
pub fn reading_time(html: &str) -> i32 {
    let words = word_count(html);
    words.div_ceil(WORDS_PER_MINUTE).max(1) as i32
}

/// Sanitize user or model supplied HTML before it is stored.
pub fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags_removes_markup_and_comments() {
        let html = "<p>Hello <strong>world</strong><!-- note --></p>";
        assert_eq!(strip_tags(html), "Hello world");
    }

    #[test]
    fn test_strip_tags_except_keeps_allowed() {
        let html = r#"<div class="x"><p>One <span>two</span> <EM>three</EM></p></div>"#;
        assert_eq!(
            strip_tags_except(html, &["p", "em"]),
            "<p>One two <EM>three</EM></p>"
        );
    }

    #[test]
    fn test_word_count_ignores_tags() {
        assert_eq!(word_count("<h1>Rust's borrow-checker</h1><p>is   great</p>"), 4);
        assert_eq!(word_count("<p>42 - 7</p>"), 0);
        assert_eq!(word_count("<p>one</p><p>two</p><li>three</li>"), 3);
    }

    #[test]
    fn test_reading_time_counts_words_across_paragraphs() {
        let html = vec!["<p>word</p>"; 201].concat();
        assert_eq!(reading_time(&html), 2);
    }

    #[test]
    fn test_reading_time_rounds_up_with_minimum() {
        assert_eq!(reading_time(""), 1);
        let words = vec!["word"; 400].join(" ");
        assert_eq!(reading_time(&words), 2);
        let words = vec!["word"; 401].join(" ");
        assert_eq!(reading_time(&words), 3);
    }

    #[test]
    fn test_sanitize_html_drops_scripts() {
        let cleaned = sanitize_html("<p>ok</p><script>alert(1)</script>");
        assert_eq!(cleaned, "<p>ok</p>");
    }
}
