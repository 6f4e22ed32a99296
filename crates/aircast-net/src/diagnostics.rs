//! Read-only mesh state snapshots for a human operator.
//!
//! Not correctness-critical: the snapshot is assembled on demand inside the
//! swarm loop and handed out over the command channel purely for display.

use std::fmt;

use libp2p::{Multiaddr, PeerId};

use aircast_shared::types::{PeerRole, TransportKind};

use crate::peers::PeerTracker;

/// One connected peer as seen by the diagnostics view.
#[derive(Debug, Clone)]
pub struct PeerDiagnostics {
    pub peer_id: PeerId,
    pub address: Multiaddr,
    pub transport: TransportKind,
    /// bootstrap / relay-with-reservation; empty means neither
    pub roles: Vec<PeerRole>,
    /// When the connection was established (Unix epoch millis)
    pub connected_at: u64,
}

/// Periodic snapshot of mesh state.
#[derive(Debug, Clone)]
pub struct DiagnosticsSnapshot {
    pub local_peer_id: PeerId,
    pub peer_count: usize,
    /// All seven transport kinds, zero-filled
    pub transport_histogram: Vec<(TransportKind, usize)>,
    pub listen_addrs: Vec<Multiaddr>,
    pub peers: Vec<PeerDiagnostics>,
}

impl DiagnosticsSnapshot {
    pub fn collect(
        local_peer_id: PeerId,
        tracker: &PeerTracker,
        listen_addrs: Vec<Multiaddr>,
    ) -> Self {
        let peers = tracker
            .all_connections()
            .into_iter()
            .map(|info| PeerDiagnostics {
                roles: tracker.roles(&info.peer_id),
                peer_id: info.peer_id,
                address: info.address,
                transport: info.transport,
                connected_at: info.connected_at,
            })
            .collect();

        Self {
            local_peer_id,
            peer_count: tracker.peer_count(),
            transport_histogram: tracker.transport_histogram(),
            listen_addrs,
            peers,
        }
    }
}

impl fmt::Display for DiagnosticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "node {}", self.local_peer_id)?;
        writeln!(f, "peers: {}", self.peer_count)?;

        writeln!(f, "transports:")?;
        for (kind, count) in &self.transport_histogram {
            writeln!(f, "  {kind}: {count}")?;
        }

        writeln!(f, "addresses ({}):", self.listen_addrs.len())?;
        for addr in &self.listen_addrs {
            writeln!(f, "  {addr}")?;
        }

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        for peer in &self.peers {
            let roles = if peer.roles.is_empty() {
                String::new()
            } else {
                let labels: Vec<String> =
                    peer.roles.iter().map(|r| r.to_string()).collect();
                format!(" ({})", labels.join(", "))
            };
            let age_secs = now.saturating_sub(peer.connected_at) / 1000;
            writeln!(
                f,
                "  {}{} via {} [{}] up {}s",
                peer.peer_id, roles, peer.address, peer.transport, age_secs
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_covers_full_transport_set() {
        let mut tracker = PeerTracker::default();
        let peer = PeerId::random();
        tracker.on_connected(peer, "/ip4/203.0.113.5/tcp/80/ws".parse().unwrap());

        let snapshot = DiagnosticsSnapshot::collect(PeerId::random(), &tracker, vec![]);

        assert_eq!(snapshot.peer_count, 1);
        assert_eq!(snapshot.transport_histogram.len(), TransportKind::ALL.len());
        let total: usize = snapshot.transport_histogram.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_render_lists_every_kind_and_roles() {
        let relay_peer = PeerId::random();
        let mut tracker = PeerTracker::default();
        tracker.on_connected(
            relay_peer,
            "/ip4/203.0.113.5/udp/4001/quic-v1".parse().unwrap(),
        );
        tracker.on_reservation(relay_peer);

        let snapshot = DiagnosticsSnapshot::collect(
            PeerId::random(),
            &tracker,
            vec!["/ip4/0.0.0.0/udp/4001/quic-v1".parse().unwrap()],
        );
        let rendered = snapshot.to_string();

        for kind in TransportKind::ALL {
            assert!(rendered.contains(kind.label()), "missing {kind}");
        }
        assert!(rendered.contains("(relay)"));
    }

    #[test]
    fn test_render_shows_connection_age() {
        let mut tracker = PeerTracker::default();
        tracker.on_connected(
            PeerId::random(),
            "/ip4/203.0.113.5/udp/4001/quic-v1".parse().unwrap(),
        );

        let snapshot = DiagnosticsSnapshot::collect(PeerId::random(), &tracker, vec![]);
        assert!(snapshot.peers[0].connected_at > 0);
        assert!(snapshot.to_string().contains("] up "));
    }
}
