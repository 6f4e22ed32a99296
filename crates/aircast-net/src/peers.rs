//! Peer connection tracking and transport classification.
//!
//! Maintains an in-memory map of connected peers, the transport kind of
//! each connection, and role annotations (bootstrap / relay-with-reservation)
//! for the diagnostics view.

use std::collections::{HashMap, HashSet};

use libp2p::{multiaddr::Protocol, Multiaddr, PeerId};
use tracing::debug;

use aircast_shared::types::{PeerRole, TransportKind};

/// Classify a connection by exact matching of its remote multiaddress
/// against the fixed transport set.
///
/// Precedence mirrors the address grammar: `/webrtc` over a relay circuit
/// is WebRTC, not Circuit Relay, and a relayed connection over WebSockets
/// is Circuit Relay, not WebSockets.
pub fn classify_transport(addr: &Multiaddr) -> TransportKind {
    let mut has_circuit = false;
    let mut has_ws = false;
    let mut has_wss = false;
    let mut has_tls = false;

    for proto in addr.iter() {
        match proto {
            Protocol::WebRTC => return TransportKind::WebRtc,
            Protocol::WebRTCDirect => return TransportKind::WebRtcDirect,
            Protocol::WebTransport => return TransportKind::WebTransport,
            Protocol::P2pCircuit => has_circuit = true,
            Protocol::Ws(_) => has_ws = true,
            Protocol::Wss(_) => has_wss = true,
            Protocol::Tls => has_tls = true,
            _ => {}
        }
    }

    if has_circuit {
        TransportKind::CircuitRelay
    } else if has_wss || (has_tls && has_ws) {
        TransportKind::WebSocketsSecure
    } else if has_ws {
        TransportKind::WebSockets
    } else {
        TransportKind::Other
    }
}

/// Information about a connected peer.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// The peer's libp2p ID.
    pub peer_id: PeerId,
    /// The multiaddr through which we are connected.
    pub address: Multiaddr,
    /// Transport classification of the connection.
    pub transport: TransportKind,
    /// Timestamp of when the connection was established (Unix epoch millis).
    pub connected_at: u64,
}

/// Tracks all currently connected peers plus role annotations.
#[derive(Debug, Clone)]
pub struct PeerTracker {
    peers: HashMap<PeerId, ConnectionInfo>,
    /// Peers listed in the static bootstrap configuration.
    bootstrap: HashSet<PeerId>,
    /// Relays we currently hold a reservation on.
    relays: HashSet<PeerId>,
}

impl PeerTracker {
    /// Create a tracker. `bootstrap` is the set of peer ids extracted from
    /// the bootstrap address list, used for role annotation.
    pub fn new(bootstrap: HashSet<PeerId>) -> Self {
        Self {
            peers: HashMap::new(),
            bootstrap,
            relays: HashSet::new(),
        }
    }

    /// Record a newly connected peer. Returns the classified transport.
    pub fn on_connected(&mut self, peer_id: PeerId, address: Multiaddr) -> TransportKind {
        let transport = classify_transport(&address);

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let info = ConnectionInfo {
            peer_id,
            address: address.clone(),
            transport,
            connected_at: now,
        };

        debug!(
            peer = %peer_id,
            addr = %address,
            transport = %transport,
            "Tracking new peer connection"
        );

        self.peers.insert(peer_id, info);
        transport
    }

    /// Remove a peer that has fully disconnected.
    pub fn on_disconnected(&mut self, peer_id: &PeerId) {
        if self.peers.remove(peer_id).is_some() {
            debug!(peer = %peer_id, "Removed peer from tracker");
        }
        self.relays.remove(peer_id);
    }

    /// Record an accepted relay reservation.
    pub fn on_reservation(&mut self, relay_peer: PeerId) {
        debug!(relay = %relay_peer, "Recorded relay reservation");
        self.relays.insert(relay_peer);
    }

    /// Role annotations for a peer: bootstrap, relay-with-reservation, or
    /// neither (empty).
    pub fn roles(&self, peer_id: &PeerId) -> Vec<PeerRole> {
        let mut roles = Vec::new();
        if self.bootstrap.contains(peer_id) {
            roles.push(PeerRole::Bootstrap);
        }
        if self.relays.contains(peer_id) {
            roles.push(PeerRole::Relay);
        }
        roles
    }

    /// Get connection info for a specific peer.
    pub fn get(&self, peer_id: &PeerId) -> Option<&ConnectionInfo> {
        self.peers.get(peer_id)
    }

    /// Return a list of all connected peer IDs.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    /// Return the number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Check whether we are connected to a given peer.
    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    /// Transport histogram over all live connections. Every kind of the
    /// fixed set appears, zero-filled; each connection counts exactly once.
    pub fn transport_histogram(&self) -> Vec<(TransportKind, usize)> {
        TransportKind::ALL
            .iter()
            .map(|kind| {
                let count = self
                    .peers
                    .values()
                    .filter(|info| info.transport == *kind)
                    .count();
                (*kind, count)
            })
            .collect()
    }

    /// Return all connection infos (snapshot).
    pub fn all_connections(&self) -> Vec<ConnectionInfo> {
        self.peers.values().cloned().collect()
    }
}

impl Default for PeerTracker {
    fn default() -> Self {
        Self::new(HashSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_peer_id() -> PeerId {
        PeerId::random()
    }

    fn addr(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_classify_each_kind() {
        let relay = PeerId::random();

        assert_eq!(
            classify_transport(&addr(&format!(
                "/ip4/203.0.113.5/udp/4001/quic-v1/p2p/{relay}/p2p-circuit"
            ))),
            TransportKind::CircuitRelay
        );
        assert_eq!(
            classify_transport(&addr(&format!(
                "/dns4/relay.example/tcp/443/wss/p2p/{relay}/p2p-circuit/webrtc"
            ))),
            TransportKind::WebRtc
        );
        assert_eq!(
            classify_transport(&addr("/ip4/203.0.113.5/udp/4001/webrtc-direct")),
            TransportKind::WebRtcDirect
        );
        assert_eq!(
            classify_transport(&addr("/ip4/203.0.113.5/tcp/80/ws")),
            TransportKind::WebSockets
        );
        assert_eq!(
            classify_transport(&addr("/dns4/node.example/tcp/443/wss")),
            TransportKind::WebSocketsSecure
        );
        assert_eq!(
            classify_transport(&addr("/dns4/node.example/tcp/443/tls/ws")),
            TransportKind::WebSocketsSecure
        );
        assert_eq!(
            classify_transport(&addr("/ip4/203.0.113.5/udp/443/quic-v1/webtransport")),
            TransportKind::WebTransport
        );
        assert_eq!(
            classify_transport(&addr("/ip4/203.0.113.5/udp/4001/quic-v1")),
            TransportKind::Other
        );
    }

    #[test]
    fn test_relayed_websocket_counts_as_circuit() {
        let relay = PeerId::random();
        let target = PeerId::random();
        let ma = addr(&format!(
            "/dns4/relay.example/tcp/443/wss/p2p/{relay}/p2p-circuit/p2p/{target}"
        ));
        assert_eq!(classify_transport(&ma), TransportKind::CircuitRelay);
    }

    #[test]
    fn test_connect_disconnect() {
        let mut tracker = PeerTracker::default();
        let peer = test_peer_id();

        assert!(!tracker.is_connected(&peer));
        tracker.on_connected(peer, addr("/ip4/127.0.0.1/udp/4001/quic-v1"));
        assert!(tracker.is_connected(&peer));
        assert_eq!(tracker.peer_count(), 1);

        tracker.on_disconnected(&peer);
        assert!(!tracker.is_connected(&peer));
        assert_eq!(tracker.peer_count(), 0);
    }

    #[test]
    fn test_histogram_counts_each_connection_once() {
        let mut tracker = PeerTracker::default();
        tracker.on_connected(test_peer_id(), addr("/ip4/10.0.0.1/tcp/80/ws"));
        tracker.on_connected(test_peer_id(), addr("/ip4/10.0.0.2/tcp/80/ws"));
        tracker.on_connected(test_peer_id(), addr("/ip4/10.0.0.3/udp/4001/quic-v1"));

        let histogram = tracker.transport_histogram();
        assert_eq!(histogram.len(), TransportKind::ALL.len());

        let total: usize = histogram.iter().map(|(_, n)| n).sum();
        assert_eq!(total, tracker.peer_count());

        let ws = histogram
            .iter()
            .find(|(k, _)| *k == TransportKind::WebSockets)
            .unwrap();
        assert_eq!(ws.1, 2);
        let other = histogram
            .iter()
            .find(|(k, _)| *k == TransportKind::Other)
            .unwrap();
        assert_eq!(other.1, 1);
    }

    #[test]
    fn test_roles() {
        let bootstrap_peer = test_peer_id();
        let relay_peer = test_peer_id();
        let plain_peer = test_peer_id();

        let mut tracker = PeerTracker::new([bootstrap_peer].into_iter().collect());
        tracker.on_reservation(relay_peer);

        assert_eq!(tracker.roles(&bootstrap_peer), vec![PeerRole::Bootstrap]);
        assert_eq!(tracker.roles(&relay_peer), vec![PeerRole::Relay]);
        assert!(tracker.roles(&plain_peer).is_empty());
    }

    #[test]
    fn test_reservation_cleared_on_disconnect() {
        let relay_peer = test_peer_id();
        let mut tracker = PeerTracker::default();

        tracker.on_connected(relay_peer, addr("/ip4/203.0.113.5/udp/4001/quic-v1"));
        tracker.on_reservation(relay_peer);
        assert_eq!(tracker.roles(&relay_peer), vec![PeerRole::Relay]);

        tracker.on_disconnected(&relay_peer);
        assert!(tracker.roles(&relay_peer).is_empty());
    }
}
