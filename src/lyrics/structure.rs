//! Section-tagged lyric strings.
//!
//! The generation command reads lyrics as `;`-separated sections such as
//! `[intro-short] ; [verse] a. b. ; [chorus] c. d. ; [outro-short]`.
//! Intro and outro sections carry no words.

use std::sync::LazyLock;

use regex::Regex;

static RE_STRUCTURE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(intro|inst|outro|verse|chorus|bridge)[^\]]*\]").expect("valid regex")
});

static RE_SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[。\r\n]+|[.!?]+").expect("valid regex"));

/// Maximum sentences kept from plain text.
const MAX_SENTENCES: usize = 12;

/// Tracks at least this long get medium intro and outro sections.
const MEDIUM_SECTION_SEC: u32 = 120;

pub fn intro_tag(duration_sec: u32) -> &'static str {
    if duration_sec >= MEDIUM_SECTION_SEC {
        "[intro-medium]"
    } else {
        "[intro-short]"
    }
}

pub fn outro_tag(duration_sec: u32) -> &'static str {
    if duration_sec >= MEDIUM_SECTION_SEC {
        "[outro-medium]"
    } else {
        "[outro-short]"
    }
}

/// Wordless intro/outro shape used when an instrumental request has no prompt.
pub fn default_instrumental_description(duration_sec: u32) -> String {
    format!("{} ; {}", intro_tag(duration_sec), outro_tag(duration_sec))
}

/// True when `text` already contains section tags.
pub fn has_structure_tags(text: &str) -> bool {
    RE_STRUCTURE_TAG.is_match(text)
}

/// True when `text` mentions an outro section.
pub fn has_outro(text: &str) -> bool {
    text.to_lowercase().contains("[outro")
}

/// Appends an outro section unless one is present.
pub fn ensure_outro(text: &str, duration_sec: u32) -> String {
    let s = text.trim().trim_end_matches(';').trim();
    if s.is_empty() || has_outro(s) {
        return s.to_string();
    }
    format!("{} ; {}", s, outro_tag(duration_sec))
}

/// Splits plain text into at most twelve sentence-like units.
fn sentences(text: &str) -> Vec<&str> {
    let parts: Vec<&str> = RE_SENTENCE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .take(MAX_SENTENCES)
        .collect();
    if parts.is_empty() {
        vec![text.trim()]
    } else {
        parts
    }
}

fn join_sentences(parts: &[&str]) -> String {
    let mut joined = parts.join(". ");
    if !joined.is_empty() && !joined.ends_with('.') {
        joined.push('.');
    }
    joined
}

/// Turns user text into a tagged lyric string.
///
/// Tagged text is kept and gets an outro if missing. Plain text becomes one
/// verse (first four sentences) and one chorus (next four, or a repeat of
/// the opening lines when there are not enough).
pub fn normalize_lyrics(raw: &str, duration_sec: u32) -> String {
    let text = raw.trim();
    if text.is_empty() {
        return String::new();
    }
    if has_structure_tags(text) {
        return ensure_outro(text, duration_sec);
    }

    let parts = sentences(text);
    let verse = &parts[..parts.len().min(4)];
    let chorus = if parts.len() > 4 {
        &parts[4..parts.len().min(8)]
    } else {
        &parts[..parts.len().min(2)]
    };

    format!(
        "[intro-short] ; [verse] {} ; [chorus] {} ; {}",
        join_sentences(verse),
        join_sentences(chorus),
        outro_tag(duration_sec)
    )
}

/// Sections of the wordless fallback structure for a given duration.
///
/// Under a minute: one verse/chorus pair. Up to two and a half minutes: two
/// pairs. Longer: two pairs, a bridge and a final chorus.
pub fn skeleton_sections(duration_sec: u32) -> Vec<&'static str> {
    let mut sections = vec!["intro", "verse", "chorus"];
    if duration_sec >= 60 {
        sections.extend(["verse", "chorus"]);
    }
    if duration_sec >= 150 {
        sections.extend(["bridge", "chorus"]);
    }
    sections.push("outro");
    sections
}

/// Deterministic lyric skeleton for a vocal request that supplied no lyrics.
pub fn lyric_skeleton(duration_sec: u32) -> String {
    skeleton_sections(duration_sec)
        .into_iter()
        .map(|section| match section {
            "intro" => intro_tag(duration_sec).to_string(),
            "outro" => outro_tag(duration_sec).to_string(),
            "verse" => "[verse] la la la, la la la. na na na, na na na.".to_string(),
            "chorus" => "[chorus] oh oh oh, oh oh oh. la la la, la la.".to_string(),
            _ => "[bridge] mm mm mm. ah ah ah.".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outro_tag_by_duration() {
        assert_eq!(outro_tag(30), "[outro-short]");
        assert_eq!(outro_tag(119), "[outro-short]");
        assert_eq!(outro_tag(120), "[outro-medium]");
    }

    #[test]
    fn default_description_shape() {
        assert_eq!(default_instrumental_description(30), "[intro-short] ; [outro-short]");
        assert_eq!(default_instrumental_description(180), "[intro-medium] ; [outro-medium]");
    }

    #[test]
    fn detects_structure_tags_case_insensitively() {
        assert!(has_structure_tags("[Verse] hello"));
        assert!(has_structure_tags("x [chorus-2] y"));
        assert!(!has_structure_tags("[hook] hello"));
        assert!(!has_structure_tags("plain words"));
    }

    #[test]
    fn tagged_lyrics_get_outro() {
        let out = normalize_lyrics("[verse] hello world ;", 30);
        assert_eq!(out, "[verse] hello world ; [outro-short]");

        let kept = normalize_lyrics("[verse] hi ; [outro-short]", 200);
        assert_eq!(kept, "[verse] hi ; [outro-short]");
    }

    #[test]
    fn plain_text_becomes_verse_and_chorus() {
        let out = normalize_lyrics("one. two. three. four. five. six", 30);
        assert_eq!(
            out,
            "[intro-short] ; [verse] one. two. three. four. ; [chorus] five. six. ; [outro-short]"
        );
    }

    #[test]
    fn short_text_repeats_opening_in_chorus() {
        let out = normalize_lyrics("窗外下雨。想你了", 30);
        assert_eq!(
            out,
            "[intro-short] ; [verse] 窗外下雨. 想你了. ; [chorus] 窗外下雨. 想你了. ; [outro-short]"
        );
    }

    #[test]
    fn empty_lyrics_stay_empty() {
        assert_eq!(normalize_lyrics("   ", 30), "");
    }

    #[test]
    fn sentence_cap() {
        let text = (1..=20).map(|i| format!("s{}", i)).collect::<Vec<_>>().join(". ");
        let out = normalize_lyrics(&text, 30);
        assert!(out.contains("s8"));
        assert!(!out.contains("s9"));
    }

    #[test]
    fn skeleton_for_ninety_seconds_has_two_pairs() {
        assert_eq!(
            skeleton_sections(90),
            vec!["intro", "verse", "chorus", "verse", "chorus", "outro"]
        );
        let text = lyric_skeleton(90);
        assert!(text.starts_with("[intro-short] ; [verse]"));
        assert!(text.ends_with("[outro-short]"));
        assert_eq!(text.matches("[verse]").count(), 2);
        assert_eq!(text.matches("[chorus]").count(), 2);
        assert!(has_structure_tags(&text));
    }

    #[test]
    fn skeleton_bands() {
        assert_eq!(skeleton_sections(30), vec!["intro", "verse", "chorus", "outro"]);
        let long = skeleton_sections(200);
        assert_eq!(long.iter().filter(|s| **s == "chorus").count(), 3);
        assert!(long.contains(&"bridge"));
        assert!(lyric_skeleton(200).starts_with("[intro-medium]"));
    }

    #[test]
    fn skeleton_is_deterministic() {
        assert_eq!(lyric_skeleton(90), lyric_skeleton(90));
    }
}
