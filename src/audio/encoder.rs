//! Opus encoding via libopus
//!
//! Input is accumulated into 20 ms frames. Packet timestamps count encoded
//! samples from zero, so they start with the clip and never decrease.

use super::capture::{AudioFrame, CAPTURE_SAMPLE_RATE};
use crate::errors::CameraError;

/// 20 ms at 48 kHz, per channel
const OPUS_FRAME_SAMPLES: usize = 960;

/// OPUS_APPLICATION_AUDIO from opus.h
const OPUS_APPLICATION_AUDIO: i32 = 2049;

/// Largest packet libopus is asked to write
const MAX_PACKET_BYTES: usize = 4000;

/// One Opus packet
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    pub data: Vec<u8>,
    /// Seconds from the first encoded sample
    pub pts: f64,
}

/// PCM → Opus encoder. Single-threaded; moved into the recording worker.
pub struct OpusEncoder {
    encoder: *mut libopus_sys::OpusEncoder,
    channels: u16,
    pending: Vec<f32>,
    samples_encoded: u64,
}

// SAFETY: the libopus state is owned exclusively and is not `Sync`; it is
// only ever touched by the thread currently holding the encoder.
unsafe impl Send for OpusEncoder {}

impl OpusEncoder {
    /// 48 kHz encoder for `channels` (1 or 2) at `bitrate` bits per second
    pub fn new(channels: u16, bitrate: u32) -> Result<Self, CameraError> {
        if channels != 1 && channels != 2 {
            return Err(CameraError::AudioError(format!(
                "Opus supports mono or stereo, not {} channels",
                channels
            )));
        }

        let mut error: i32 = 0;
        let encoder = unsafe {
            libopus_sys::opus_encoder_create(
                CAPTURE_SAMPLE_RATE as i32,
                channels as i32,
                OPUS_APPLICATION_AUDIO,
                &mut error,
            )
        };
        if encoder.is_null() || error != 0 {
            return Err(CameraError::AudioError(format!(
                "Failed to create Opus encoder: error code {}",
                error
            )));
        }

        let result = unsafe {
            libopus_sys::opus_encoder_ctl(encoder, libopus_sys::OPUS_SET_BITRATE_REQUEST as i32, bitrate as i32)
        };
        if result != 0 {
            unsafe { libopus_sys::opus_encoder_destroy(encoder) };
            return Err(CameraError::AudioError(format!(
                "Failed to set Opus bitrate {}: error code {}",
                bitrate, result
            )));
        }

        Ok(Self {
            encoder,
            channels,
            pending: Vec::with_capacity(OPUS_FRAME_SAMPLES * channels as usize * 2),
            samples_encoded: 0,
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Queue `frame` and encode every complete 20 ms frame
    pub fn encode(&mut self, frame: &AudioFrame) -> Result<Vec<EncodedAudio>, CameraError> {
        if frame.sample_rate != CAPTURE_SAMPLE_RATE || frame.channels != self.channels {
            return Err(CameraError::AudioError(format!(
                "Expected {} Hz x{}, got {} Hz x{}",
                CAPTURE_SAMPLE_RATE, self.channels, frame.sample_rate, frame.channels
            )));
        }
        self.pending.extend_from_slice(&frame.samples);
        self.encode_pending()
    }

    /// Pad the tail with silence and encode it
    pub fn flush(&mut self) -> Result<Vec<EncodedAudio>, CameraError> {
        let frame_len = OPUS_FRAME_SAMPLES * self.channels as usize;
        let partial = self.pending.len() % frame_len;
        if partial != 0 {
            self.pending.resize(self.pending.len() + frame_len - partial, 0.0);
        }
        self.encode_pending()
    }

    fn encode_pending(&mut self) -> Result<Vec<EncodedAudio>, CameraError> {
        let frame_len = OPUS_FRAME_SAMPLES * self.channels as usize;
        let mut packets = Vec::new();

        while self.pending.len() >= frame_len {
            let mut output = vec![0u8; MAX_PACKET_BYTES];
            let len = unsafe {
                libopus_sys::opus_encode_float(
                    self.encoder,
                    self.pending.as_ptr(),
                    OPUS_FRAME_SAMPLES as i32,
                    output.as_mut_ptr(),
                    output.len() as i32,
                )
            };
            if len < 0 {
                return Err(CameraError::AudioError(format!("Opus encoding failed: error code {}", len)));
            }
            self.pending.drain(..frame_len);
            output.truncate(len as usize);

            packets.push(EncodedAudio {
                data: output,
                pts: self.samples_encoded as f64 / CAPTURE_SAMPLE_RATE as f64,
            });
            self.samples_encoded += OPUS_FRAME_SAMPLES as u64;
        }
        Ok(packets)
    }
}

impl Drop for OpusEncoder {
    fn drop(&mut self) {
        if !self.encoder.is_null() {
            unsafe { libopus_sys::opus_encoder_destroy(self.encoder) };
        }
    }
}
