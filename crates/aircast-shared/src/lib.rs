// Shared constants, types and wire protocol for the Aircast mesh.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::AircastError;
pub use protocol::{AudioChunkMessage, DiscoveryAnnouncement, MeshMessage};
pub use types::{PeerRole, TransportKind};
