//! Composed libp2p `NetworkBehaviour` for the Aircast mesh.
//!
//! Combines GossipSub (topic distribution for discovery announcements and
//! audio chunks), Identify (protocol negotiation), Relay client (assistive
//! circuit relay for NAT traversal), and DCUtR (hole punching through the
//! relay). There is deliberately no DHT: discovery relies on the bootstrap
//! list plus live pub/sub announcements.

use libp2p::{dcutr, gossipsub, identify, relay, swarm::NetworkBehaviour};

/// Composed network behaviour for Aircast nodes.
///
/// All sub-behaviours are driven by the single swarm event loop.
/// Construction is handled by [`super::transport::build_swarm`] via
/// `SwarmBuilder`.
#[derive(NetworkBehaviour)]
#[behaviour(to_swarm = "AircastEvent")]
pub struct AircastBehaviour {
    /// Pub/sub distribution of discovery announcements and audio chunks
    pub gossipsub: gossipsub::Behaviour,
    /// Protocol identification and capability advertisement
    pub identify: identify::Behaviour,
    /// Circuit relay v2 client for NAT traversal
    pub relay_client: relay::client::Behaviour,
    /// Direct Connection Upgrade through Relay
    pub dcutr: dcutr::Behaviour,
}

/// Events emitted by the composed behaviour, one variant per sub-behaviour.
#[derive(Debug)]
pub enum AircastEvent {
    Gossipsub(gossipsub::Event),
    Identify(identify::Event),
    RelayClient(relay::client::Event),
    Dcutr(dcutr::Event),
}

impl From<gossipsub::Event> for AircastEvent {
    fn from(event: gossipsub::Event) -> Self {
        AircastEvent::Gossipsub(event)
    }
}

impl From<identify::Event> for AircastEvent {
    fn from(event: identify::Event) -> Self {
        AircastEvent::Identify(event)
    }
}

impl From<relay::client::Event> for AircastEvent {
    fn from(event: relay::client::Event) -> Self {
        AircastEvent::RelayClient(event)
    }
}

impl From<dcutr::Event> for AircastEvent {
    fn from(event: dcutr::Event) -> Self {
        AircastEvent::Dcutr(event)
    }
}
