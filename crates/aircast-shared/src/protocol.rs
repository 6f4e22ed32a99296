use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::AircastError;

/// The closed set of messages carried on Aircast gossipsub topics.
///
/// Payloads are decoded exactly once, at the channel boundary in the swarm
/// loop; downstream components only ever see the typed variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MeshMessage {
    /// A peer announcing itself on the discovery topic
    DiscoveryAnnouncement(DiscoveryAnnouncement),

    /// One unit of encoded audio on the audio topic
    AudioChunk(AudioChunkMessage),
}

/// Live announcement of a peer and its dialable addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryAnnouncement {
    /// The announcing peer's id, base58-encoded
    pub peer_id: String,
    /// Multiaddrs the peer can be dialed at, as strings
    pub addrs: Vec<String>,
}

/// One chunk of encoded audio (~250 ms).
///
/// Chunks carry no sequence number or timestamp; receiver-side ordering is
/// defined by local arrival order alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioChunkMessage {
    pub data: Vec<u8>,
}

impl AudioChunkMessage {
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }
}

impl MeshMessage {
    /// Serialize to binary (bincode)
    pub fn to_bytes(&self) -> Result<Vec<u8>, AircastError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from binary
    pub fn from_bytes(data: &[u8]) -> Result<Self, AircastError> {
        Ok(bincode::deserialize(data)?)
    }
}
