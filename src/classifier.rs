use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

static EXCLUDED: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new("highlight|promo|recap|live")
        .case_insensitive(true)
        .build()
        .expect("exclusion pattern is valid")
});

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Compile a serial's name pattern, matched case-insensitively.
///
/// An edge of the pattern that is a word character must sit on a word boundary, so
/// `Show` does not match inside `OtherShow`. Edges like `)` match as written.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let start = if pattern.chars().next().is_some_and(is_word_char) {
        r"\b"
    } else {
        ""
    };
    let end = if pattern.chars().next_back().is_some_and(is_word_char) {
        r"\b"
    } else {
        ""
    };
    RegexBuilder::new(&format!("{start}(?:{pattern}){end}"))
        .case_insensitive(true)
        .build()
}

/// Whether `title` is a regular episode of the serial matched by `name_pattern`.
///
/// Highlights, promos, recaps and live streams are rejected even when the name matches.
/// Titles do not need to mention "episode".
#[must_use]
pub fn is_episode(title: &str, name_pattern: &Regex) -> bool {
    name_pattern.is_match(title) && !EXCLUDED.is_match(title)
}
