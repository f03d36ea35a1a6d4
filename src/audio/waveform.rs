//! In-memory multi-channel audio buffer.

use crate::error::{DaemonError, Result};

/// Planar audio: one sample vector per channel, all the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl Waveform {
    /// Builds a waveform, checking that every channel has the same length.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if channels.is_empty() {
            return Err(DaemonError::validation("waveform needs at least one channel"));
        }
        let frames = channels[0].len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(DaemonError::validation("waveform channels differ in length"));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Single-channel waveform.
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels: vec![samples],
        }
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Drops everything after `frames`. Never pads.
    pub fn trim_frames(&mut self, frames: usize) {
        for channel in &mut self.channels {
            channel.truncate(frames);
        }
    }

    /// Interleaves channels frame by frame.
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for i in 0..frames {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }
}

/// Converts seconds to a whole number of frames at `sample_rate`.
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> usize {
    (seconds.max(0.0) * sample_rate as f64).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaves_frame_by_frame() {
        let wf = Waveform::new(8000, vec![vec![0.1, 0.2], vec![-0.1, -0.2]]).unwrap();
        assert_eq!(wf.channel_count(), 2);
        assert_eq!(wf.frames(), 2);
        assert_eq!(wf.interleaved(), vec![0.1, -0.1, 0.2, -0.2]);
    }

    #[test]
    fn mismatched_channel_lengths_are_rejected() {
        assert!(Waveform::new(8000, vec![vec![0.0; 4], vec![0.0; 3]]).is_err());
    }

    #[test]
    fn trim_never_pads() {
        let mut wf = Waveform::mono(10, vec![0.5; 5]);
        wf.trim_frames(20);
        assert_eq!(wf.frames(), 5);
        wf.trim_frames(3);
        assert_eq!(wf.frames(), 3);
    }

    #[test]
    fn duration_and_frame_conversion() {
        let wf = Waveform::mono(32000, vec![0.0; 64000]);
        assert_eq!(wf.duration_sec(), 2.0);
        assert_eq!(seconds_to_frames(2.0, 32000), 64000);
        assert_eq!(seconds_to_frames(-1.0, 32000), 0);
    }
}
