//! WAV encoding and header inspection.
//!
//! Stitched waveforms are encoded with hound as 32-bit float WAV. Artifacts
//! downloaded from the worker are inspected for their real duration.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::waveform::Waveform;
use crate::error::{DaemonError, Result};

fn float_spec(waveform: &Waveform) -> WavSpec {
    WavSpec {
        channels: waveform.channel_count(),
        sample_rate: waveform.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

/// Encodes a waveform into an in-memory WAV file.
pub fn encode_wav(waveform: &Waveform) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, float_spec(waveform))?;
        for sample in waveform.interleaved() {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Header facts about a WAV file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub duration_sec: f64,
}

/// Reads the header of an in-memory WAV file.
pub fn read_wav_info(bytes: &[u8]) -> Result<WavInfo> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(DaemonError::validation("WAV header reports a zero sample rate"));
    }
    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        duration_sec: reader.duration() as f64 / spec.sample_rate as f64,
    })
}
