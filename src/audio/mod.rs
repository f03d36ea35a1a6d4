//! Audio buffers, WAV I/O and segment stitching.

pub mod stitch;
pub mod wav;
pub mod waveform;

pub use stitch::crossfade_concat;
pub use wav::{encode_wav, read_wav_info, WavInfo};
pub use waveform::{seconds_to_frames, Waveform};
