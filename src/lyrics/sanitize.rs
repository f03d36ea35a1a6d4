//! Cleanup of user-supplied lyrics before they reach the generator.

use std::sync::LazyLock;

use regex::Regex;

static RE_CONTROL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f]").expect("valid regex"));
static RE_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n+").expect("valid regex"));
static RE_SEMICOLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*;\s*").expect("valid regex"));
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalizes punctuation and whitespace and caps the length.
///
/// Full-width punctuation becomes ASCII, newlines become spaces and `;`
/// section separators get single spaces around them. `max_chars == 0`
/// disables the cap.
pub fn sanitize_user_lyrics(raw: &str, max_chars: usize) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }

    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let s = RE_CONTROL.replace_all(&s, " ");
    let s = s
        .replace('；', ";")
        .replace('，', ",")
        .replace('。', ".")
        .replace('！', "!")
        .replace('？', "?");
    let s = RE_NEWLINES.replace_all(&s, " ");
    let s = RE_SEMICOLON.replace_all(&s, " ; ");
    let s = RE_SPACES.replace_all(&s, " ");
    let s = s.trim();

    if max_chars > 0 && s.chars().count() > max_chars {
        s.chars().take(max_chars).collect::<String>().trim_end().to_string()
    } else {
        s.to_string()
    }
}
