/// Protocol version string for libp2p identify
pub const PROTOCOL_VERSION: &str = "/aircast/1.0.0";

/// Application name
pub const APP_NAME: &str = "Aircast";

/// Gossipsub topic carrying peer discovery announcements
pub const TOPIC_DISCOVERY: &str = "aircast-peer-discovery";

/// Gossipsub topic carrying audio chunks (distinct from discovery)
pub const TOPIC_AUDIO: &str = "aircast-audio";

/// Minimum number of remote audio-topic subscribers before a captured
/// chunk is published. Below this the chunk is dropped, never buffered.
pub const MIN_AUDIO_SUBSCRIBERS: usize = 2;

/// Target duration of one captured audio chunk in milliseconds
pub const CHUNK_INTERVAL_MS: u64 = 250;

/// Encoding label negotiated between the capture side and the playback
/// sink. The encoder itself is opaque; only the label travels.
pub const AUDIO_ENCODING: &str = "pcm-f32le-48000";

/// Interval between our own discovery announcements, in seconds
pub const DISCOVERY_ANNOUNCE_SECS: u64 = 10;

/// GossipSub heartbeat interval in seconds
pub const GOSSIPSUB_HEARTBEAT_SECS: u64 = 1;

/// Maximum gossipsub message size in bytes (256 KiB)
pub const MAX_MESSAGE_SIZE: usize = 262_144;

/// Default QUIC listen port
pub const DEFAULT_QUIC_PORT: u16 = 4001;

/// Default interval between diagnostics snapshots, in seconds
pub const DIAGNOSTICS_INTERVAL_SECS: u64 = 10;
