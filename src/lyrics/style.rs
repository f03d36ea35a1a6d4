//! Deterministic style tags extracted from a free-text prompt.
//!
//! The generation model follows short English tags more reliably than
//! prose, so common genre, instrument, and mood words (English or Chinese)
//! are mapped to stable tags and merged with any user-provided style.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static RE_BPM_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:bpm|tempo)\s*[:=]?\s*(\d{2,3})\b").expect("valid regex"));
static RE_BPM_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{2,3})\s*bpm\b").expect("valid regex"));
static RE_BPM_CJK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:节拍|速度)\s*[:=]?\s*(\d{2,3})").expect("valid regex"));

const CJK_NEGATIONS: [&str; 5] = ["不要", "别", "无", "没有", "不需要"];
const ENGLISH_NEGATIONS: [&str; 2] = ["no", "without"];

/// (keywords, tag) pairs; English keywords are matched lower-cased.
const KEYWORD_TAGS: &[(&[&str], &str)] = &[
    (&["lofi", "lo-fi", "低保真"], "lo-fi"),
    (&["jazz", "爵士"], "jazz"),
    (&["rock", "摇滚"], "rock"),
    (&["pop", "流行"], "pop"),
    (&["electronic", "edm", "电子"], "electronic"),
    (&["classical", "古典"], "classical"),
    (&["folk", "民谣"], "folk"),
    (&["hip hop", "hip-hop", "嘻哈"], "hip hop"),
    (&["ambient", "氛围"], "ambient"),
    (&["piano", "钢琴"], "piano"),
    (&["guitar", "吉他"], "guitar"),
    (&["violin", "小提琴"], "violin"),
    (&["cello", "大提琴"], "cello"),
    (&["drums", "鼓点", "架子鼓"], "drums"),
    (&["synth", "合成器"], "synth"),
    (&["sad", "悲伤", "伤感"], "sad"),
    (&["happy", "欢快", "快乐"], "happy"),
    (&["calm", "relaxing", "平静", "放松"], "calm"),
    (&["energetic", "激昂", "热血"], "energetic"),
    (&["romantic", "浪漫"], "romantic"),
];

/// (keywords, tag) pairs for explicit exclusions like "不要鼓点" or "no drums".
const NEGATIVE_TAGS: &[(&[&str], &str)] = &[
    (&["鼓", "鼓点", "架子鼓", "drums"], "no drums"),
    (&["贝斯", "低音", "bass"], "no bass"),
    (&["人声", "唱", "歌词", "vocals"], "no vocals"),
    (&["说唱", "rap"], "no rap"),
    (&["电子", "合成器", "synth"], "no synth"),
];

fn is_negated(text: &str, keyword: &str) -> bool {
    let padded = format!(" {}", text);
    CJK_NEGATIONS
        .iter()
        .any(|prefix| text.contains(&format!("{}{}", prefix, keyword)))
        || ENGLISH_NEGATIONS
            .iter()
            .any(|word| padded.contains(&format!(" {} {}", word, keyword)))
}

fn matches_any_not_negated(text: &str, keywords: &[&str]) -> bool {
    keywords
        .iter()
        .any(|kw| text.contains(kw) && !is_negated(text, kw))
}

/// Tempo mentioned in the prompt, if within 40-220 BPM.
pub fn extract_bpm(text: &str) -> Option<u32> {
    [&*RE_BPM_PREFIX, &*RE_BPM_SUFFIX, &*RE_BPM_CJK]
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|bpm| (40..=220).contains(bpm))
}

/// Maps a prompt to stable English style tags.
pub fn suggest_style_tags(prompt: &str) -> Vec<String> {
    let text = prompt.to_lowercase();
    let mut tags: Vec<String> = Vec::new();

    for (keywords, tag) in KEYWORD_TAGS {
        if matches_any_not_negated(&text, keywords) {
            tags.push((*tag).to_string());
        }
    }

    if tags.iter().any(|t| t == "piano")
        && tags.iter().any(|t| t == "violin")
        && ["合奏", "二重奏", "duet"].iter().any(|k| text.contains(k))
    {
        tags.extend(["piano and violin", "violin lead", "duet"].map(String::from));
    }

    if let Some(bpm) = extract_bpm(&text) {
        tags.push(format!("{} bpm", bpm));
    }

    for (keywords, tag) in NEGATIVE_TAGS {
        if keywords.iter().any(|kw| is_negated(&text, kw)) {
            tags.push((*tag).to_string());
        }
    }

    dedup_tags(tags)
}

/// Drops blank tags and case-insensitive duplicates, keeping first occurrence.
fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().trim_matches(',').trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect()
}

/// Merges a comma-separated user style with extra tags.
pub fn merge_style_tags(base_style: Option<&str>, extra_tags: &[String]) -> String {
    let mut tags: Vec<String> = base_style
        .unwrap_or_default()
        .split(',')
        .map(str::to_string)
        .collect();
    tags.extend(extra_tags.iter().cloned());
    dedup_tags(tags).join(", ")
}
