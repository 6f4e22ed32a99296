// P2P mesh layer built on libp2p with QUIC + circuit relay transport.

pub mod behaviour;
pub mod diagnostics;
pub mod discovery;
pub mod node;
pub mod peers;
pub mod policy;
pub mod swarm;
pub mod transport;

pub use behaviour::{AircastBehaviour, AircastEvent};
pub use diagnostics::{DiagnosticsSnapshot, PeerDiagnostics};
pub use discovery::{parse_multiaddrs, resolve_relay_addr};
pub use node::{MeshNode, NodeHandle};
pub use peers::{classify_transport, ConnectionInfo, PeerTracker};
pub use policy::{AllowAll, AllowGlobal, DialPolicy};
pub use swarm::{spawn_swarm, SwarmCommand, SwarmConfig, SwarmNotification};
pub use transport::build_swarm;
