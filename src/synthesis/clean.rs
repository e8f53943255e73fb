//! Normalize drafted text for speech.
//!
//! Removes markup the drafter may leave behind and collapses whitespace.
//! Words are never dropped or reworded: the audio must stay in sync with the
//! stored script.

use regex::Regex;
use std::sync::LazyLock;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"</?[A-Za-z][^<>]*>"));

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| compile(r"!?\[([^\]]*)\]\([^)]*\)"));

/// Heading hashes, quote markers, and bullets at the start of a line.
static LINE_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?m)^[ \t]*(?:#{1,6}|>+|\*)[ \t]+"));

/// Emphasis and code markers opening a word.
static OPENING_EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"(^|[\s(\["'])(?:[*_`]|~~)+"#));

/// Emphasis and code markers closing a word.
static CLOSING_EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| compile(r#"(?:[*_`]|~~)+($|[\s.,;:!?)\]"'])"#));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"\s+"));

// SAFETY: only called with the hardcoded patterns above
#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("hardcoded regex pattern")
}

/// Clean one turn's text for synthesis.
pub fn clean_for_speech(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, " ");
    let text = MARKDOWN_LINK.replace_all(&text, "$1");
    let text = LINE_MARKERS.replace_all(&text, "");
    let text = OPENING_EMPHASIS.replace_all(&text, "$1");
    let text = CLOSING_EMPHASIS.replace_all(&text, "$1");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Whether the text still has something to say after cleaning.
pub fn is_speakable(text: &str) -> bool {
    !clean_for_speech(text).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_emphasis() {
        assert_eq!(
            clean_for_speech("This is **really** _important_."),
            "This is really important."
        );
    }

    #[test]
    fn keeps_link_text() {
        assert_eq!(
            clean_for_speech("See [the paper](https://example.org/p.pdf) for details"),
            "See the paper for details"
        );
    }

    #[test]
    fn strips_html_tags() {
        assert_eq!(
            clean_for_speech("<speak>Hello <b>there</b></speak>"),
            "Hello there"
        );
    }

    #[test]
    fn collapses_whitespace_and_newlines() {
        assert_eq!(clean_for_speech("  one\n\n two\t three  "), "one two three");
    }

    #[test]
    fn never_drops_words() {
        let text = "Photosynthesis converts light, water, and carbon dioxide into sugar.";
        assert_eq!(clean_for_speech(text), text);
    }

    #[test]
    fn symbols_inside_words_are_kept() {
        assert_eq!(clean_for_speech("C# and snake_case"), "C# and snake_case");
        assert_eq!(clean_for_speech("if a > b or a < b"), "if a > b or a < b");
        assert_eq!(clean_for_speech("roughly ~5 km"), "roughly ~5 km");
    }

    #[test]
    fn strips_line_markers() {
        assert_eq!(
            clean_for_speech("## Results\n> Quoted line\n* first point"),
            "Results Quoted line first point"
        );
    }

    #[test]
    fn strips_inline_code_markers() {
        assert_eq!(clean_for_speech("Call `render` twice."), "Call render twice.");
    }

    #[test]
    fn markup_only_text_is_not_speakable() {
        assert!(!is_speakable("** __ ``"));
        assert!(!is_speakable("   "));
        assert!(is_speakable("ok"));
    }
}
