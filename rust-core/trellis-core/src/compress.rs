//! HTML output compression.

use regex::Regex;
use std::sync::OnceLock;

fn between_tags() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r">\s+<").expect("static pattern is valid"))
}

/// Remove whitespace runs sitting strictly between `>` and `<`
///
/// Text inside elements keeps its whitespace.
#[must_use]
pub fn compress_html(html: &str) -> String {
    between_tags().replace_all(html, "><").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace_between_tags() {
        assert_eq!(compress_html("<div>   </div>"), "<div></div>");
        assert_eq!(
            compress_html("<ul>\n  <li>a</li>\n  <li>b</li>\n</ul>"),
            "<ul><li>a</li><li>b</li></ul>"
        );
    }

    #[test]
    fn test_keeps_text_whitespace() {
        assert_eq!(
            compress_html("<p>hello   world</p> <p> x </p>"),
            "<p>hello   world</p><p> x </p>"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(compress_html(""), "");
    }
}
