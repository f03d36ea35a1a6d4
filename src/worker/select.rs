//! Choosing one artifact among the files the generation command wrote.
//!
//! The command may emit a mix plus separated stems, and its file naming
//! is not under our control. Candidates are ranked by a pluggable
//! [`CandidateScorer`] and ties go to the shorter, then lexicographically
//! earlier, file name.

use std::path::{Path, PathBuf};

use crate::types::GenerationMode;

/// Ranks a candidate file name for a generation mode. Higher wins.
pub trait CandidateScorer: Send + Sync {
    fn score(&self, file_name: &str, mode: GenerationMode) -> i32;
}

/// Scores file names by stem keywords.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordScorer;

const FULL_MIX: &[&str] = &["mix", "full", "song", "all"];
const A_CAPPELLA: &[&str] = &["vocal_only", "acap", "a_cappella", "a-cappella", "vocals_only"];
const VOCAL: &[&str] = &["vocal", "vocals"];
const BACKING: &[&str] = &["bgm", "instrumental", "inst"];
const ANY_STEM: &[&str] = &["bgm", "inst", "instrument", "vocal", "vocals", "acap", "sep", "separate"];

fn contains_any(name: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| name.contains(k))
}

impl CandidateScorer for KeywordScorer {
    fn score(&self, file_name: &str, mode: GenerationMode) -> i32 {
        let name = file_name.to_lowercase();
        let mut score = 0;

        match mode {
            GenerationMode::Song => {
                if contains_any(&name, FULL_MIX) {
                    score += 50;
                }
                if contains_any(&name, A_CAPPELLA) {
                    score -= 80;
                }
                if contains_any(&name, VOCAL) {
                    score -= 30;
                }
                if !contains_any(&name, ANY_STEM) {
                    score += 10;
                }
            }
            GenerationMode::Instrumental => {
                if contains_any(&name, BACKING) {
                    score += 50;
                }
                if contains_any(&name, VOCAL) || contains_any(&name, A_CAPPELLA) {
                    score -= 80;
                }
            }
            GenerationMode::VocalOnly => {
                if contains_any(&name, A_CAPPELLA) {
                    score += 60;
                }
                if contains_any(&name, VOCAL) {
                    score += 20;
                }
                if contains_any(&name, BACKING) {
                    score -= 60;
                }
            }
            GenerationMode::Separate => {
                if contains_any(&name, FULL_MIX) {
                    score += 20;
                }
            }
        }

        score
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Picks exactly one candidate, or `None` when there are none.
pub fn select_candidate(
    candidates: &[PathBuf],
    mode: GenerationMode,
    scorer: &dyn CandidateScorer,
) -> Option<PathBuf> {
    if candidates.len() == 1 {
        return candidates.first().cloned();
    }

    candidates
        .iter()
        .map(|path| {
            let name = file_name(path);
            (scorer.score(&name, mode), name, path)
        })
        .max_by(|(score_a, name_a, _), (score_b, name_b, _)| {
            score_a
                .cmp(score_b)
                .then_with(|| name_b.len().cmp(&name_a.len()))
                .then_with(|| name_b.cmp(name_a))
        })
        .map(|(_, _, path)| path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("/jobs/x/audios").join(n)).collect()
    }

    fn pick(names: &[&str], mode: GenerationMode) -> String {
        let chosen = select_candidate(&paths(names), mode, &KeywordScorer).unwrap();
        file_name(&chosen)
    }

    #[test]
    fn song_prefers_mix_over_vocal_only() {
        assert_eq!(
            pick(&["song_mix.flac", "song_vocal_only.flac"], GenerationMode::Song),
            "song_mix.flac"
        );
    }

    #[test]
    fn instrumental_tie_breaks_on_shorter_name() {
        let scorer = KeywordScorer;
        let mix = scorer.score("song_mix.flac", GenerationMode::Instrumental);
        assert!(mix <= 0);
        assert_eq!(
            pick(&["song_vocal_only.flac", "song_mix.flac"], GenerationMode::Instrumental),
            "song_mix.flac"
        );
    }

    #[test]
    fn instrumental_prefers_bgm() {
        assert_eq!(
            pick(&["out_mix.flac", "out_bgm.flac", "out_vocal.flac"], GenerationMode::Instrumental),
            "out_bgm.flac"
        );
    }

    #[test]
    fn vocal_only_prefers_acapella() {
        assert_eq!(
            pick(&["take_bgm.flac", "take_acapella.flac", "take.flac"], GenerationMode::VocalOnly),
            "take_acapella.flac"
        );
    }

    #[test]
    fn separate_prefers_full_mix() {
        assert_eq!(
            pick(&["a_vocal.flac", "a_bgm.flac", "a_full.flac"], GenerationMode::Separate),
            "a_full.flac"
        );
    }

    #[test]
    fn equal_scores_and_lengths_break_lexicographically() {
        assert_eq!(pick(&["b.flac", "a.flac"], GenerationMode::Separate), "a.flac");
    }

    #[test]
    fn single_candidate_is_taken_as_is() {
        assert_eq!(pick(&["x_vocal.flac"], GenerationMode::Instrumental), "x_vocal.flac");
    }

    #[test]
    fn no_candidates() {
        assert!(select_candidate(&[], GenerationMode::Song, &KeywordScorer).is_none());
    }

    struct PreferLongest;

    impl CandidateScorer for PreferLongest {
        fn score(&self, file_name: &str, _mode: GenerationMode) -> i32 {
            file_name.len() as i32
        }
    }

    #[test]
    fn scorer_is_swappable() {
        let chosen = select_candidate(
            &paths(&["a.flac", "abcdef.flac"]),
            GenerationMode::Song,
            &PreferLongest,
        )
        .unwrap();
        assert!(chosen.ends_with("abcdef.flac"));
    }
}
