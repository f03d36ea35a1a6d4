//! Long-form generation from a short-clip model by crossfading segments.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{GeneratedAudio, Generator};
use crate::audio::{crossfade_concat, encode_wav, seconds_to_frames, Waveform};
use crate::client::ClipSource;
use crate::config::SegmentConfig;
use crate::error::{DaemonError, Result};
use crate::types::{AudioFormat, GenerationRequest};

/// Stitches clips from a [`ClipSource`] into a track of the requested length.
pub struct SegmentedGenerator<C: ClipSource> {
    source: C,
    config: SegmentConfig,
}

impl<C: ClipSource> SegmentedGenerator<C> {
    pub fn new(source: C, config: SegmentConfig) -> Self {
        Self { source, config }
    }

    /// Requested duration clamped to what the clip model supports.
    pub fn target_duration(&self, requested: u32) -> f64 {
        requested.clamp(self.config.min_duration_sec, self.config.max_duration_sec) as f64
    }

    /// Generates the full waveform for `prompt`.
    pub async fn generate_waveform(&self, prompt: &str, requested: u32) -> Result<Waveform> {
        let target = self.target_duration(requested);
        if target <= self.config.max_clip_sec {
            return self.source.generate_clip(prompt, target).await;
        }

        let chunk_sec = self.config.max_clip_sec.min(self.config.chunk_sec);
        let overlap_sec = self.config.overlap_sec;
        let mut segments: Vec<Waveform> = Vec::new();
        let mut total_frames = 0usize;

        loop {
            let clip = self.source.generate_clip(prompt, chunk_sec).await?;
            if clip.frames() == 0 {
                return Err(DaemonError::generation_failed("clip source returned no audio"));
            }
            total_frames += clip.frames();
            segments.push(clip);
            debug!(
                segment = segments.len(),
                total_frames, "generated segment"
            );

            let sample_rate = segments[0].sample_rate;
            if total_frames >= seconds_to_frames(target + overlap_sec, sample_rate) {
                break;
            }
        }

        let sample_rate = segments[0].sample_rate;
        let mut stitched =
            crossfade_concat(&segments, seconds_to_frames(overlap_sec, sample_rate))?;
        stitched.trim_frames(seconds_to_frames(target, sample_rate));
        Ok(stitched)
    }
}

#[async_trait]
impl<C: ClipSource> Generator for SegmentedGenerator<C> {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAudio> {
        let started = Instant::now();
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(DaemonError::validation("prompt must not be empty"));
        }

        let waveform = self.generate_waveform(prompt, request.duration_sec).await?;
        let bytes = encode_wav(&waveform)?;
        info!(
            duration_sec = waveform.duration_sec(),
            sample_rate = waveform.sample_rate,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "segmented generation finished"
        );

        Ok(GeneratedAudio {
            bytes,
            format: AudioFormat::Wav,
            duration_sec: waveform.duration_sec(),
            sample_rate: waveform.sample_rate,
            model_name: self.source.model_name().to_string(),
        })
    }

    fn name(&self) -> &str {
        self.source.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::read_wav_info;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns `rate * duration` frames of a constant per call.
    struct FixedClips {
        rate: u32,
        calls: AtomicUsize,
        durations: Mutex<Vec<f64>>,
    }

    impl FixedClips {
        fn new(rate: u32) -> Self {
            Self {
                rate,
                calls: AtomicUsize::new(0),
                durations: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ClipSource for FixedClips {
        async fn generate_clip(&self, _prompt: &str, duration_sec: f64) -> Result<Waveform> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.durations.lock().unwrap().push(duration_sec);
            let frames = seconds_to_frames(duration_sec, self.rate);
            Ok(Waveform::mono(self.rate, vec![0.5; frames]))
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn generator(rate: u32) -> SegmentedGenerator<FixedClips> {
        SegmentedGenerator::new(FixedClips::new(rate), SegmentConfig::default())
    }

    #[test]
    fn duration_is_clamped() {
        let g = generator(100);
        assert_eq!(g.target_duration(1), 5.0);
        assert_eq!(g.target_duration(60), 60.0);
        assert_eq!(g.target_duration(600), 120.0);
    }

    #[tokio::test]
    async fn short_request_is_one_clip() {
        let g = generator(100);
        let wave = g.generate_waveform("rain", 20).await.unwrap();
        assert_eq!(wave.frames(), 2_000);
        assert_eq!(g.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn long_request_is_stitched_and_trimmed() {
        let g = generator(100);
        let wave = g.generate_waveform("rain", 60).await.unwrap();

        // 25 s chunks until >= 62 s of raw audio: three clips.
        assert_eq!(g.source.calls.load(Ordering::SeqCst), 3);
        assert!(g
            .source
            .durations
            .lock()
            .unwrap()
            .iter()
            .all(|d| *d == 25.0));
        assert_eq!(wave.frames(), 6_000);
        // Crossfading equal constants leaves the signal unchanged.
        assert!(wave.channels[0].iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[tokio::test]
    async fn generate_encodes_wav() {
        let g = generator(100);
        let audio = g.generate(&GenerationRequest::new("rain", 30)).await.unwrap();
        assert_eq!(audio.format, AudioFormat::Wav);
        assert_eq!(audio.model_name, "fixed");
        let info = read_wav_info(&audio.bytes).unwrap();
        assert_eq!(info.sample_rate, 100);
        assert!((info.duration_sec - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let g = generator(100);
        assert!(g.generate(&GenerationRequest::new("  ", 30)).await.is_err());
    }
}
