//! Title and cover enrichment.
//!
//! Enrichment is cosmetic: the pipeline bounds each call with a timeout and
//! falls back to [`FallbackEnricher`] on any error.

use async_trait::async_trait;

use crate::error::Result;

pub const FALLBACK_TITLE: &str = "AI Composition";
const TITLE_CHARS: usize = 12;

#[async_trait]
pub trait Enricher: Send + Sync {
    /// Track title for `prompt`.
    async fn title(&self, prompt: &str) -> Result<String>;

    /// Path or URL of a cover image, if one can be produced.
    async fn cover(&self, prompt: &str) -> Result<Option<String>>;
}

/// Deterministic enrichment that never calls out.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackEnricher;

impl FallbackEnricher {
    pub fn title_for(prompt: &str) -> String {
        let head: String = prompt.trim().chars().take(TITLE_CHARS).collect();
        let head = head.trim();
        if head.is_empty() {
            FALLBACK_TITLE.to_string()
        } else {
            head.to_string()
        }
    }
}

#[async_trait]
impl Enricher for FallbackEnricher {
    async fn title(&self, prompt: &str) -> Result<String> {
        Ok(Self::title_for(prompt))
    }

    async fn cover(&self, _prompt: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_prompt_head() {
        assert_eq!(FallbackEnricher::title_for("rainy night jazz piano"), "rainy night");
        assert_eq!(FallbackEnricher::title_for("  lofi  "), "lofi");
        assert_eq!(FallbackEnricher::title_for("夜晚的城市灯光和雨声交织在一起"), "夜晚的城市灯光和雨声交织");
    }

    #[test]
    fn empty_prompt_gets_generic_title() {
        assert_eq!(FallbackEnricher::title_for("   "), FALLBACK_TITLE);
    }

    #[tokio::test]
    async fn no_cover() {
        assert!(FallbackEnricher.cover("x").await.unwrap().is_none());
    }
}
