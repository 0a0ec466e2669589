//! Microphone capture and Opus encoding for the clip's audio track
//!
//! - `capture`: cpal input stream feeding a bounded PCM queue
//! - `encoder`: libopus encoder producing packets muxide can mux into MP4

mod capture;
mod encoder;

pub use capture::{AudioCapture, AudioFrame, AudioInput, CAPTURE_SAMPLE_RATE};
pub use encoder::{EncodedAudio, OpusEncoder};
