//! Audio device adapters: cpal microphone source and speaker sink.
//!
//! The codec itself is out of scope; [`ChunkEncoder`] is an opaque byte
//! producer and the default [`PcmEncoder`] is a raw passthrough so the
//! operator binary works end to end without an external codec.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use aircast_shared::constants::{AUDIO_ENCODING, CHUNK_INTERVAL_MS};

use crate::playback::{PlaybackSink, SinkError};

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("No output device available")]
    NoOutputDevice,

    #[error("Audio stream error: {0}")]
    StreamError(String),
}

/// Turns raw capture frames into encoded chunk bytes. Opaque to the rest
/// of the system; only the encoding label is negotiated.
pub trait ChunkEncoder: Send + 'static {
    fn encoding(&self) -> &'static str;
    fn encode(&mut self, samples: &[f32]) -> Vec<u8>;
}

/// Raw PCM passthrough (f32 little-endian).
#[derive(Debug, Clone, Copy, Default)]
pub struct PcmEncoder;

impl ChunkEncoder for PcmEncoder {
    fn encoding(&self) -> &'static str {
        AUDIO_ENCODING
    }

    fn encode(&mut self, samples: &[f32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(samples.len() * 4);
        for sample in samples {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }
}

fn decode_pcm(chunk: &[u8]) -> Result<Vec<f32>, SinkError> {
    if chunk.len() % 4 != 0 {
        return Err(SinkError::Rejected(format!(
            "PCM chunk length {} not sample-aligned",
            chunk.len()
        )));
    }
    Ok(chunk
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            chunk_ms: CHUNK_INTERVAL_MS,
        }
    }
}

impl CaptureConfig {
    pub fn chunk_size_samples(&self) -> usize {
        (self.sample_rate as usize * self.channels as usize * self.chunk_ms as usize) / 1000
    }
}

/// Audio-only capture source over the default input device.
pub struct MicSource {
    config: CaptureConfig,
    active: Arc<AtomicBool>,
}

impl MicSource {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start capturing. Returns a channel of encoded chunks, roughly one
    /// every `chunk_ms`. Failure to acquire the device is final; the
    /// caller does not retry.
    pub fn start<E: ChunkEncoder>(
        &mut self,
        mut encoder: E,
    ) -> Result<tokio::sync::mpsc::Receiver<Bytes>, DeviceError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(DeviceError::NoInputDevice)?;

        info!(device = ?device.name(), "Using input device");

        let config = cpal::StreamConfig {
            channels: self.config.channels,
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let chunk_size = self.config.chunk_size_samples();
        let (chunk_tx, chunk_rx) = tokio::sync::mpsc::channel::<Bytes>(64);
        let mut buffer = Vec::with_capacity(chunk_size);
        let active = self.active.clone();
        active.store(true, Ordering::SeqCst);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    if !active.load(Ordering::Relaxed) {
                        return;
                    }
                    buffer.extend_from_slice(data);
                    while buffer.len() >= chunk_size {
                        let frame: Vec<f32> = buffer.drain(..chunk_size).collect();
                        let encoded = Bytes::from(encoder.encode(&frame));
                        if chunk_tx.try_send(encoded).is_err() {
                            warn!("Capture chunk channel full, dropping chunk");
                        }
                    }
                },
                move |err| {
                    error!("Audio input error: {err}");
                },
                None,
            )
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        // Keep stream alive; the active flag turns the callback into a no-op.
        std::mem::forget(stream);

        debug!(chunk_size, "Audio capture started");
        Ok(chunk_rx)
    }

    pub fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        debug!("Audio capture stopped");
    }
}

/// Playback sink over the default output device. Decodes PCM chunks and
/// feeds them to the output stream callback.
pub struct SpeakerSink {
    sample_tx: std::sync::mpsc::Sender<Vec<f32>>,
    active: Arc<AtomicBool>,
}

impl SpeakerSink {
    pub fn new(config: &CaptureConfig) -> Result<Self, DeviceError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DeviceError::NoOutputDevice)?;

        info!(device = ?device.name(), "Using output device");

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (sample_tx, sample_rx) = std::sync::mpsc::channel::<Vec<f32>>();
        let active = Arc::new(AtomicBool::new(true));
        let callback_active = active.clone();

        let mut play_buffer: std::collections::VecDeque<f32> = std::collections::VecDeque::new();

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    if !callback_active.load(Ordering::Relaxed) {
                        play_buffer.clear();
                        data.fill(0.0);
                        return;
                    }
                    while let Ok(frame) = sample_rx.try_recv() {
                        play_buffer.extend(frame.iter());
                    }
                    for sample in data.iter_mut() {
                        *sample = play_buffer.pop_front().unwrap_or(0.0);
                    }
                },
                move |err| {
                    error!("Audio output error: {err}");
                },
                None,
            )
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        std::mem::forget(stream);
        debug!("Audio playback started");

        Ok(Self { sample_tx, active })
    }

    /// Stop playback. The output callback falls back to silence and
    /// further appends are rejected.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        debug!("Audio playback stopped");
    }
}

impl Drop for SpeakerSink {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait::async_trait]
impl PlaybackSink for SpeakerSink {
    fn supports(&self, encoding: &str) -> bool {
        encoding == AUDIO_ENCODING
    }

    async fn append(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if !self.active.load(Ordering::Relaxed) {
            return Err(SinkError::Unavailable("speaker stopped".into()));
        }
        let samples = decode_pcm(&chunk)?;
        self.sample_tx
            .send(samples)
            .map_err(|_| SinkError::Unavailable("output stream gone".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_size_samples() {
        let config = CaptureConfig::default();
        // 48 kHz mono at 250 ms
        assert_eq!(config.chunk_size_samples(), 12000);
    }

    #[test]
    fn test_pcm_encoder_output_is_sample_aligned() {
        let mut encoder = PcmEncoder;
        let encoded = encoder.encode(&[0.0, 0.5, -0.5]);
        assert_eq!(encoded.len(), 12);

        let decoded = decode_pcm(&encoded).unwrap();
        assert_eq!(decoded, vec![0.0, 0.5, -0.5]);
    }

    #[test]
    fn test_decode_rejects_misaligned_chunk() {
        assert!(matches!(
            decode_pcm(&[1, 2, 3]),
            Err(SinkError::Rejected(_))
        ));
    }

    #[test]
    fn test_pcm_encoder_reports_negotiated_encoding() {
        assert_eq!(PcmEncoder.encoding(), AUDIO_ENCODING);
    }

    #[tokio::test]
    async fn test_speaker_rejects_appends_after_stop() {
        let (sample_tx, sample_rx) = std::sync::mpsc::channel();
        let mut sink = SpeakerSink {
            sample_tx,
            active: Arc::new(AtomicBool::new(true)),
        };
        let mut encoder = PcmEncoder;

        sink.append(Bytes::from(encoder.encode(&[0.25]))).await.unwrap();
        assert_eq!(sample_rx.try_recv().unwrap(), vec![0.25]);

        sink.stop();
        assert!(matches!(
            sink.append(Bytes::from(encoder.encode(&[0.5]))).await,
            Err(SinkError::Unavailable(_))
        ));
    }
}
