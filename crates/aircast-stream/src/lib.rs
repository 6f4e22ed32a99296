// Audio streaming pipelines: capture/publish and playback reconstruction.

pub mod capture;
pub mod device;
pub mod playback;

pub use capture::CapturePipeline;
pub use device::{CaptureConfig, ChunkEncoder, DeviceError, MicSource, PcmEncoder, SpeakerSink};
pub use playback::{
    run_playback, spawn_playback, PlaybackEvent, PlaybackPipeline, PlaybackSink, SinkError,
    SinkState,
};
