//! Crossfade stitching of generated segments.
//!
//! Models that cannot produce a full-length track in one call generate it
//! in overlapping segments; this joins them into one continuous waveform.

use super::waveform::Waveform;
use crate::error::{DaemonError, Result};

/// Joins `segments` with a linear crossfade of `overlap` frames at each seam.
///
/// The output has `sum(frames) - (n - 1) * overlap` frames and the channel
/// count and sample rate of the inputs. Amplitudes are not normalized.
/// A single segment is returned unchanged.
///
/// # Errors
///
/// Returns a validation error when the list is empty, when segments differ
/// in channel count or sample rate, or when a segment has no more than
/// `2 * overlap` frames.
pub fn crossfade_concat(segments: &[Waveform], overlap: usize) -> Result<Waveform> {
    let first = segments
        .first()
        .ok_or_else(|| DaemonError::validation("no segments to stitch"))?;

    if segments.len() == 1 {
        return Ok(first.clone());
    }

    for (i, seg) in segments.iter().enumerate() {
        if seg.channel_count() != first.channel_count() {
            return Err(DaemonError::validation(format!(
                "segment {} has {} channels, expected {}",
                i,
                seg.channel_count(),
                first.channel_count()
            )));
        }
        if seg.sample_rate != first.sample_rate {
            return Err(DaemonError::validation(format!(
                "segment {} has sample rate {}, expected {}",
                i, seg.sample_rate, first.sample_rate
            )));
        }
        if seg.frames() <= 2 * overlap {
            return Err(DaemonError::validation(format!(
                "segment {} too short to crossfade: {} frames, overlap {}",
                i,
                seg.frames(),
                overlap
            )));
        }
    }

    let (fade_out, fade_in) = fade_curves(overlap);
    let mut out = first.clone();

    for seg in &segments[1..] {
        for (acc, next) in out.channels.iter_mut().zip(&seg.channels) {
            let start = acc.len() - overlap;
            for i in 0..overlap {
                acc[start + i] = acc[start + i] * fade_out[i] + next[i] * fade_in[i];
            }
            acc.extend_from_slice(&next[overlap..]);
        }
    }

    Ok(out)
}

/// Linear fade-out (1 to 0) and fade-in (0 to 1) over `len` samples,
/// both endpoints included.
fn fade_curves(len: usize) -> (Vec<f32>, Vec<f32>) {
    match len {
        0 => (Vec::new(), Vec::new()),
        1 => (vec![1.0], vec![0.0]),
        _ => {
            let step = 1.0 / (len - 1) as f32;
            let fade_in: Vec<f32> = (0..len).map(|i| i as f32 * step).collect();
            let fade_out = fade_in.iter().map(|v| 1.0 - v).collect();
            (fade_out, fade_in)
        }
    }
}
