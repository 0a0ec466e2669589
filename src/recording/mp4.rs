//! MP4 file recorder: pulls frames from the bound camera on a worker thread,
//! encodes them to H.264 and muxes into MP4.
//!
//! The worker owns the encoder and muxer while recording and hands them back
//! when it exits, either on `stop` or when `max_duration` elapses.
//!
//! With the `audio` feature a configured audio source adds an Opus track.
//! The worker opens the microphone itself and `start` fails if it cannot.
//! Without the feature clips are video only.

use super::encoder::H264Encoder;
use super::{MediaRecorder, RecorderFactory, RecorderSettings, RecorderState, RecordingStats};
use crate::errors::CameraError;
use crate::platform::{lock_device, SharedDevice};
#[cfg(feature = "audio")]
use crate::audio::{AudioCapture, AudioFrame, AudioInput, EncodedAudio, OpusEncoder, CAPTURE_SAMPLE_RATE};
#[cfg(not(feature = "audio"))]
use crate::types::AudioSource;
#[cfg(feature = "audio")]
use muxide::api::AudioCodec;
use muxide::api::{Metadata, MuxerBuilder, VideoCodec};
use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Consecutive capture failures after which the worker gives up
const MAX_CAPTURE_FAILURES: u32 = 10;

type FileMuxer = muxide::api::Muxer<BufWriter<File>>;

struct Pipeline {
    encoder: H264Encoder,
    muxer: FileMuxer,
    frame_duration_secs: f64,
    frames: u64,
    dropped: u64,
    reached_max_duration: bool,
    #[cfg(feature = "audio")]
    audio: Option<AudioTrack>,
}

/// Opus track state carried by the worker
#[cfg(feature = "audio")]
struct AudioTrack {
    input: AudioInput,
    encoder: OpusEncoder,
    /// Packets waiting for the first video frame
    pending: Vec<EncodedAudio>,
    packets: u64,
}

impl Pipeline {
    fn write(&mut self, frame: &crate::types::CameraFrame) -> Result<(), CameraError> {
        let encoded = self.encoder.encode(frame)?;
        if encoded.data.is_empty() {
            self.dropped += 1;
            return Ok(());
        }
        let pts = self.frames as f64 * self.frame_duration_secs;
        self.muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| CameraError::MuxingError(format!("Failed to write frame: {}", e)))?;
        self.frames += 1;
        Ok(())
    }
}

#[cfg(feature = "audio")]
impl Pipeline {
    fn open_audio(&self) -> Result<Option<AudioCapture>, CameraError> {
        let Some(track) = &self.audio else {
            return Ok(None);
        };
        let mut capture = AudioCapture::open(&track.input)?;
        capture.start()?;
        log::info!("Capturing audio from {}", track.input.name);
        Ok(Some(capture))
    }

    /// Encode `frames` and mux every packet once the video track has begun
    fn write_audio(&mut self, frames: &[AudioFrame]) -> Result<(), CameraError> {
        let Some(track) = self.audio.as_mut() else {
            return Ok(());
        };
        for frame in frames {
            let packets = track.encoder.encode(frame)?;
            track.pending.extend(packets);
        }
        // muxide rejects audio ahead of the first video sample
        if self.frames == 0 {
            return Ok(());
        }
        for packet in track.pending.drain(..) {
            self.muxer
                .write_audio(packet.pts, &packet.data)
                .map_err(|e| CameraError::MuxingError(format!("Failed to write audio: {}", e)))?;
            track.packets += 1;
        }
        Ok(())
    }

    /// Drain the stream one last time and flush the encoder tail
    fn finish_audio(&mut self, capture: Option<AudioCapture>) {
        let Some(mut capture) = capture else {
            return;
        };
        if let Err(e) = capture.stop() {
            log::warn!("Audio stream failed to stop: {}", e);
        }
        let tail = capture.drain();
        let flushed = self.write_audio(&tail).and_then(|_| {
            let track = match self.audio.as_mut() {
                Some(track) => track,
                None => return Ok(()),
            };
            let packets = track.encoder.flush()?;
            track.pending.extend(packets);
            self.write_audio(&[])
        });
        if let Err(e) = flushed {
            log::warn!("Audio tail dropped: {}", e);
        }
        if let Some(track) = &self.audio {
            log::debug!("Muxed {} audio packets from {}", track.packets, track.input.name);
        }
    }
}

/// Records the bound camera to an MP4 file
pub struct Mp4Recorder {
    state: RecorderState,
    device: Option<SharedDevice>,
    settings: Option<RecorderSettings>,
    pipeline: Option<Pipeline>,
    worker: Option<JoinHandle<Pipeline>>,
    stop_flag: Arc<AtomicBool>,
}

impl Mp4Recorder {
    pub fn new() -> Self {
        Self {
            state: RecorderState::Initial,
            device: None,
            settings: None,
            pipeline: None,
            worker: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    fn join_worker(&mut self) -> Result<Pipeline, CameraError> {
        self.stop_flag.store(true, Ordering::Relaxed);
        let worker = self
            .worker
            .take()
            .ok_or_else(|| CameraError::StopFailed("recording worker missing".to_string()))?;
        worker
            .join()
            .map_err(|_| CameraError::StopFailed("recording worker panicked".to_string()))
    }
}

impl Default for Mp4Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaRecorder for Mp4Recorder {
    fn state(&self) -> RecorderState {
        self.state
    }

    fn set_camera(&mut self, device: SharedDevice) -> Result<(), CameraError> {
        self.state.require(RecorderState::Initial, "set_camera")?;
        self.device = Some(device);
        Ok(())
    }

    fn configure(&mut self, settings: RecorderSettings) -> Result<(), CameraError> {
        self.state.require(RecorderState::Initial, "configure")?;
        #[cfg(not(feature = "audio"))]
        if settings.audio_source != AudioSource::None {
            log::warn!(
                "Built without the audio feature; audio source {:?} ignored",
                settings.audio_source
            );
        }
        self.settings = Some(settings);
        Ok(())
    }

    fn prepare(&mut self) -> Result<(), CameraError> {
        self.state.require(RecorderState::Initial, "prepare")?;
        if self.device.is_none() {
            return Err(CameraError::IllegalState("prepare called without a camera".to_string()));
        }
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| CameraError::IllegalState("prepare called before configure".to_string()))?;
        settings.validate()?;

        let path = settings
            .output_path
            .as_ref()
            .ok_or_else(|| CameraError::ConfigurationError("output path not set".to_string()))?;
        let profile = &settings.profile;
        let fps = profile.video_frame_rate as f64;

        let encoder = H264Encoder::new(profile.video_frame_width, profile.video_frame_height)
            .map_err(|e| CameraError::ConfigurationError(e.to_string()))?;
        let (width, height) = encoder.output_size();

        #[cfg(feature = "audio")]
        let audio = match AudioInput::for_source(settings.audio_source, profile.audio_channels)? {
            Some(input) => {
                let encoder = OpusEncoder::new(input.channels, profile.audio_bitrate)?;
                Some(AudioTrack {
                    input,
                    encoder,
                    pending: Vec::new(),
                    packets: 0,
                })
            }
            None => None,
        };

        let file = File::create(path)
            .map_err(|e| CameraError::IoError(format!("Failed to create {}: {}", path.display(), e)))?;

        // muxide writes an identity matrix; the hint is carried in the title for players that read it
        let metadata = Metadata::new()
            .with_title(&format!("clipcam rotate={}", settings.orientation_hint))
            .with_current_time();
        let builder = MuxerBuilder::new(BufWriter::new(file))
            .video(VideoCodec::H264, width, height, fps)
            .with_fast_start(true)
            .with_metadata(metadata);
        #[cfg(feature = "audio")]
        let builder = match &audio {
            Some(track) => builder.audio(AudioCodec::Opus, CAPTURE_SAMPLE_RATE, track.encoder.channels()),
            None => builder,
        };
        let muxer = builder
            .build()
            .map_err(|e| CameraError::IoError(format!("Failed to create muxer: {}", e)))?;

        self.pipeline = Some(Pipeline {
            encoder,
            muxer,
            frame_duration_secs: 1.0 / fps,
            frames: 0,
            dropped: 0,
            reached_max_duration: false,
            #[cfg(feature = "audio")]
            audio,
        });
        self.state = RecorderState::Prepared;
        log::info!("Recorder prepared: {}x{}@{} -> {}", width, height, fps, path.display());
        Ok(())
    }

    fn start(&mut self) -> Result<(), CameraError> {
        self.state.require(RecorderState::Prepared, "start")?;
        let mut pipeline = self
            .pipeline
            .take()
            .ok_or_else(|| CameraError::IllegalState("no prepared pipeline".to_string()))?;
        let device = self
            .device
            .clone()
            .ok_or_else(|| CameraError::IllegalState("no camera bound".to_string()))?;
        let max_duration = self.settings.as_ref().and_then(|s| s.max_duration);

        self.stop_flag.store(false, Ordering::Relaxed);
        let stop_flag = self.stop_flag.clone();
        #[cfg(feature = "audio")]
        let (opened_tx, opened_rx) = crossbeam_channel::bounded::<Result<(), CameraError>>(1);

        let worker = std::thread::Builder::new()
            .name("clipcam-recorder".to_string())
            .spawn(move || {
                #[cfg(feature = "audio")]
                let capture = match pipeline.open_audio() {
                    Ok(capture) => {
                        let _ = opened_tx.send(Ok(()));
                        capture
                    }
                    Err(e) => {
                        let _ = opened_tx.send(Err(e));
                        return pipeline;
                    }
                };

                let started = Instant::now();
                let mut failures = 0u32;
                while !stop_flag.load(Ordering::Relaxed) {
                    if max_duration.is_some_and(|max| started.elapsed() >= max) {
                        log::info!("Max duration reached, recording stopped");
                        pipeline.reached_max_duration = true;
                        break;
                    }
                    let frame = lock_device(&device).capture_frame();
                    match frame.and_then(|f| pipeline.write(&f)) {
                        Ok(()) => failures = 0,
                        Err(e) => {
                            pipeline.dropped += 1;
                            failures += 1;
                            if failures >= MAX_CAPTURE_FAILURES {
                                log::error!("Giving up after {} capture failures: {}", failures, e);
                                break;
                            }
                            log::debug!("Frame dropped: {}", e);
                            std::thread::sleep(Duration::from_millis(10));
                        }
                    }
                    #[cfg(feature = "audio")]
                    if let Some(capture) = &capture {
                        if let Err(e) = pipeline.write_audio(&capture.drain()) {
                            log::debug!("Audio dropped: {}", e);
                        }
                    }
                }
                #[cfg(feature = "audio")]
                pipeline.finish_audio(capture);
                pipeline
            })
            .map_err(|e| CameraError::IoError(format!("Failed to spawn recorder: {}", e)))?;

        #[cfg(feature = "audio")]
        {
            let opened = opened_rx
                .recv()
                .unwrap_or_else(|_| Err(CameraError::AudioError("recording worker exited".to_string())));
            if let Err(e) = opened {
                // the worker returned before recording anything; keep it prepared
                match worker.join() {
                    Ok(pipeline) => self.pipeline = Some(pipeline),
                    Err(_) => log::warn!("Recording worker panicked while opening audio"),
                }
                return Err(e);
            }
        }

        self.worker = Some(worker);
        self.state = RecorderState::Recording;
        Ok(())
    }

    fn stop(&mut self) -> Result<RecordingStats, CameraError> {
        self.state.require(RecorderState::Recording, "stop")?;
        // Terminal whatever the outcome
        self.state = RecorderState::Stopped;
        let pipeline = self.join_worker()?;

        if pipeline.frames == 0 {
            return Err(CameraError::StopFailed("no frames were recorded".to_string()));
        }

        let output_path = self
            .settings
            .as_ref()
            .and_then(|s| s.output_path.as_ref())
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let (dropped, reached_max_duration) = (pipeline.dropped, pipeline.reached_max_duration);

        let stats = pipeline
            .muxer
            .finish_with_stats()
            .map_err(|e| CameraError::StopFailed(format!("Failed to finalize recording: {}", e)))?;

        log::info!(
            "Recording stopped: {} frames, {} audio packets, {:.2}s, {} bytes",
            stats.video_frames,
            stats.audio_frames,
            stats.duration_secs,
            stats.bytes_written
        );

        Ok(RecordingStats {
            video_frames: stats.video_frames,
            audio_frames: stats.audio_frames,
            dropped_frames: dropped,
            duration_secs: stats.duration_secs,
            bytes_written: stats.bytes_written,
            reached_max_duration,
            output_path,
        })
    }

    fn release(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.join_worker() {
                log::warn!("Recorder released while recording: {}", e);
            }
        }
        self.pipeline = None;
        self.device = None;
        self.state = RecorderState::Released;
    }
}

/// Creates `Mp4Recorder`s
#[derive(Debug, Default, Clone, Copy)]
pub struct Mp4RecorderFactory;

impl RecorderFactory for Mp4RecorderFactory {
    fn create(&self) -> Box<dyn MediaRecorder> {
        Box::new(Mp4Recorder::new())
    }
}
