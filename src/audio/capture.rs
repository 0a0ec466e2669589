//! PCM capture from the default input device

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};

use crate::errors::CameraError;
use crate::types::AudioSource;

/// Opus only runs at 48 kHz, so capture does too
pub const CAPTURE_SAMPLE_RATE: u32 = 48_000;

/// Frames queued before the newest are dropped. Roughly five seconds of
/// 20 ms callbacks.
const MAX_BUFFER_FRAMES: usize = 256;

/// Interleaved f32 samples from one stream callback
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Input device a recorder captures from, resolved at `prepare`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInput {
    pub name: String,
    pub channels: u16,
}

impl AudioInput {
    /// Default input for `source`, or `None` for `AudioSource::None`.
    ///
    /// Asks for at most `max_channels` channels (mono or stereo).
    pub fn for_source(source: AudioSource, max_channels: u16) -> Result<Option<Self>, CameraError> {
        if source == AudioSource::None {
            return Ok(None);
        }
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| CameraError::AudioError("No default audio input device".to_string()))?;
        let name = device
            .name()
            .map_err(|e| CameraError::AudioError(format!("Failed to get device name: {}", e)))?;
        let config = device
            .default_input_config()
            .map_err(|e| CameraError::AudioError(format!("Failed to get device config: {}", e)))?;

        let channels = config.channels().min(max_channels).clamp(1, 2);
        log::debug!("Audio source {:?} -> {} ({} ch)", source, name, channels);
        Ok(Some(Self { name, channels }))
    }
}

/// Live input stream. Not `Send`: open it on the thread that drains it.
pub struct AudioCapture {
    stream: Option<Stream>,
    receiver: crossbeam_channel::Receiver<AudioFrame>,
    running: Arc<AtomicBool>,
    channels: u16,
}

impl AudioCapture {
    pub fn open(input: &AudioInput) -> Result<Self, CameraError> {
        let host = cpal::default_host();
        let device = host
            .input_devices()
            .map_err(|e| CameraError::AudioError(format!("Failed to enumerate devices: {}", e)))?
            .find(|d| d.name().ok().as_deref() == Some(input.name.as_str()))
            .ok_or_else(|| CameraError::AudioError(format!("Audio device not found: {}", input.name)))?;

        let config = StreamConfig {
            channels: input.channels,
            sample_rate: cpal::SampleRate(CAPTURE_SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        let (sender, receiver) = crossbeam_channel::bounded(MAX_BUFFER_FRAMES);
        let running = Arc::new(AtomicBool::new(false));
        let flag = running.clone();
        let channels = input.channels;

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !flag.load(Ordering::Relaxed) {
                        return;
                    }
                    // never block the audio callback
                    let _ = sender.try_send(AudioFrame {
                        samples: data.to_vec(),
                        sample_rate: CAPTURE_SAMPLE_RATE,
                        channels,
                    });
                },
                |err| log::error!("Audio capture error: {}", err),
                None,
            )
            .map_err(|e| CameraError::AudioError(format!("Failed to build stream: {}", e)))?;

        Ok(Self {
            stream: Some(stream),
            receiver,
            running,
            channels,
        })
    }

    /// Idempotent
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.running.load(Ordering::Relaxed) {
            return Ok(());
        }
        if let Some(stream) = &self.stream {
            stream
                .play()
                .map_err(|e| CameraError::AudioError(format!("Failed to start stream: {}", e)))?;
            self.running.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Idempotent
    pub fn stop(&mut self) -> Result<(), CameraError> {
        if !self.running.load(Ordering::Relaxed) {
            return Ok(());
        }
        if let Some(stream) = &self.stream {
            stream
                .pause()
                .map_err(|e| CameraError::AudioError(format!("Failed to stop stream: {}", e)))?;
            self.running.store(false, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Everything queued so far, without blocking
    pub fn drain(&self) -> Vec<AudioFrame> {
        self.receiver.try_iter().collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::debug!("Audio stream stop on drop failed: {}", e);
        }
        self.stream = None;
    }
}
