//! Lyric and style text preparation.
//!
//! Shared by the worker (building the command's input descriptor) and the
//! orchestrator (filling in lyrics and style before generation).

pub mod sanitize;
pub mod structure;
pub mod style;

pub use sanitize::sanitize_user_lyrics;
pub use structure::{
    default_instrumental_description, ensure_outro, has_outro, has_structure_tags, intro_tag,
    lyric_skeleton, normalize_lyrics, outro_tag, skeleton_sections,
};
pub use style::{extract_bpm, merge_style_tags, suggest_style_tags};
