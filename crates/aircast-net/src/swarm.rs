//! Main swarm orchestration with tokio mpsc command/notification pattern.
//!
//! The swarm event loop runs in a dedicated tokio task. External code
//! communicates with it through typed command and notification channels,
//! keeping the networking layer fully asynchronous and decoupled. Wire
//! payloads are decoded here, at the channel boundary; downstream consumers
//! only ever see typed notifications.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use libp2p::{
    gossipsub, identify,
    multiaddr::Protocol,
    relay,
    swarm::{DialError, SwarmEvent},
    Multiaddr, PeerId,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use aircast_shared::constants::{
    DEFAULT_QUIC_PORT, DISCOVERY_ANNOUNCE_SECS, TOPIC_AUDIO, TOPIC_DISCOVERY,
};
use aircast_shared::protocol::{DiscoveryAnnouncement, MeshMessage};

use crate::behaviour::AircastEvent;
use crate::diagnostics::DiagnosticsSnapshot;
use crate::discovery::{ensure_peer_suffix, extract_peer_id, resolve_relay_addr};
use crate::peers::PeerTracker;
use crate::policy::{AllowGlobal, DialPolicy};
use crate::transport::build_swarm;

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the swarm task.
#[derive(Debug)]
pub enum SwarmCommand {
    /// Dial a remote peer at the given multiaddr.
    Dial(Multiaddr),
    /// Publish a message on a GossipSub topic.
    Publish {
        topic: String,
        data: Vec<u8>,
    },
    /// Subscribe to a GossipSub topic.
    Subscribe(String),
    /// Request the set of remote peers subscribed to a topic.
    GetSubscribers {
        topic: String,
        reply: oneshot::Sender<Vec<PeerId>>,
    },
    /// Request a read-only diagnostics snapshot.
    GetDiagnostics(oneshot::Sender<DiagnosticsSnapshot>),
    /// Gracefully shut down the swarm.
    Shutdown,
}

/// Notifications sent *from* the swarm task to the application.
#[derive(Debug, Clone)]
pub enum SwarmNotification {
    /// A new peer connected.
    PeerConnected {
        peer_id: PeerId,
        address: Multiaddr,
    },
    /// A peer fully disconnected.
    PeerDisconnected {
        peer_id: PeerId,
    },
    /// An audio chunk arrived on the audio topic.
    AudioChunk {
        source: Option<PeerId>,
        data: Bytes,
    },
    /// A peer announced itself on the discovery topic.
    Discovery {
        peer_id: PeerId,
        addrs: Vec<Multiaddr>,
    },
    /// A relay reservation was accepted.
    RelayReservation {
        relay_peer: PeerId,
    },
}

/// Configuration for spawning the swarm.
pub struct SwarmConfig {
    /// Port to listen on (defaults to `DEFAULT_QUIC_PORT`).
    pub listen_port: u16,
    /// Static bootstrap multiaddrs dialed on startup.
    pub bootstrap: Vec<Multiaddr>,
    /// URL of the remote reference document resolving to the assistive
    /// relay multiaddr. Resolution failure is non-fatal.
    pub relay_reference: Option<String>,
    /// Policy applied to addresses learned from discovery announcements.
    pub policy: Arc<dyn DialPolicy>,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_QUIC_PORT,
            bootstrap: Vec::new(),
            relay_reference: None,
            policy: Arc::new(AllowGlobal),
        }
    }
}

/// Spawn the libp2p swarm in a background tokio task.
///
/// Returns channels for sending commands and receiving notifications,
/// plus the local `PeerId`. Fails only on transport/security construction
/// errors; an unreachable mesh is not an error.
pub async fn spawn_swarm(
    keypair: libp2p::identity::Keypair,
    config: SwarmConfig,
) -> anyhow::Result<(
    mpsc::Sender<SwarmCommand>,
    mpsc::Receiver<SwarmNotification>,
    PeerId,
)> {
    let mut swarm = build_swarm(keypair)?;
    let local_peer_id = *swarm.local_peer_id();

    let listen_addr_v4: Multiaddr = format!("/ip4/0.0.0.0/udp/{}/quic-v1", config.listen_port)
        .parse()
        .expect("valid multiaddr");
    let listen_addr_v6: Multiaddr = format!("/ip6/::/udp/{}/quic-v1", config.listen_port)
        .parse()
        .expect("valid multiaddr");

    swarm.listen_on(listen_addr_v4)?;
    swarm.listen_on(listen_addr_v6)?;

    info!(peer_id = %local_peer_id, port = config.listen_port, "Swarm listening");

    // Resolve the assistive relay from its remote reference and fold it
    // into the bootstrap list. Failure degrades to static-bootstrap-only.
    let mut bootstrap = config.bootstrap.clone();
    let mut relay_addr = None;
    if let Some(ref url) = config.relay_reference {
        match resolve_relay_addr(url).await {
            Ok(addr) => {
                info!(addr = %addr, "Resolved relay from remote reference");
                relay_addr = Some(addr.clone());
                bootstrap.push(addr);
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Relay reference resolution failed, continuing with static bootstrap list");
            }
        }
    }

    let bootstrap_ids: HashSet<PeerId> = bootstrap.iter().filter_map(extract_peer_id).collect();

    for addr in &bootstrap {
        match swarm.dial(addr.clone()) {
            Ok(()) => debug!(addr = %addr, "Dialing bootstrap peer"),
            Err(e) => log_dial_error(None, &e),
        }
    }

    // Reserve a circuit slot on the relay so NATed peers can reach us.
    if let Some(addr) = relay_addr {
        if extract_peer_id(&addr).is_some() {
            let circuit = addr.with(Protocol::P2pCircuit);
            if let Err(e) = swarm.listen_on(circuit.clone()) {
                warn!(addr = %circuit, error = %e, "Relay circuit listen failed");
            }
        } else {
            warn!(addr = %addr, "Relay address carries no peer id, skipping reservation");
        }
    }

    for topic in [TOPIC_DISCOVERY, TOPIC_AUDIO] {
        let topic = gossipsub::IdentTopic::new(topic);
        swarm
            .behaviour_mut()
            .gossipsub
            .subscribe(&topic)
            .map_err(|e| anyhow::anyhow!("Subscribe to {topic}: {e}"))?;
    }

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<SwarmCommand>(256);
    let (notif_tx, notif_rx) = mpsc::channel::<SwarmNotification>(256);
    let policy = config.policy.clone();

    tokio::spawn(async move {
        let mut peer_tracker = PeerTracker::new(bootstrap_ids);
        let mut announce = tokio::time::interval(Duration::from_secs(DISCOVERY_ANNOUNCE_SECS));

        loop {
            tokio::select! {
                // --- Incoming commands ---
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SwarmCommand::Dial(addr)) => {
                            if let Err(e) = swarm.dial(addr.clone()) {
                                log_dial_error(None, &e);
                            }
                        }
                        Some(SwarmCommand::Publish { topic, data }) => {
                            publish(&mut swarm, &topic, data);
                        }
                        Some(SwarmCommand::Subscribe(topic)) => {
                            let gossipsub_topic = gossipsub::IdentTopic::new(&topic);
                            if let Err(e) = swarm
                                .behaviour_mut()
                                .gossipsub
                                .subscribe(&gossipsub_topic)
                            {
                                error!(topic = %topic, error = %e, "Subscribe failed");
                            }
                        }
                        Some(SwarmCommand::GetSubscribers { topic, reply }) => {
                            let _ = reply.send(topic_subscribers(&swarm, &topic));
                        }
                        Some(SwarmCommand::GetDiagnostics(reply)) => {
                            let listen_addrs: Vec<Multiaddr> = swarm
                                .listeners()
                                .cloned()
                                .chain(swarm.external_addresses().cloned())
                                .collect();
                            let snapshot = DiagnosticsSnapshot::collect(
                                local_peer_id,
                                &peer_tracker,
                                listen_addrs,
                            );
                            let _ = reply.send(snapshot);
                        }
                        Some(SwarmCommand::Shutdown) => {
                            info!("Swarm shutdown requested");
                            break;
                        }
                        None => {
                            info!("Command channel closed, shutting down swarm");
                            break;
                        }
                    }
                }

                // --- Periodic discovery announcement ---
                _ = announce.tick() => {
                    announce_self(&mut swarm, local_peer_id);
                }

                // --- Swarm events ---
                event = swarm.select_next_some() => {
                    match event {
                        SwarmEvent::Behaviour(AircastEvent::Gossipsub(
                            gossipsub::Event::Message { message, .. },
                        )) => {
                            handle_mesh_message(
                                &mut swarm,
                                local_peer_id,
                                &peer_tracker,
                                policy.as_ref(),
                                &notif_tx,
                                message,
                            )
                            .await;
                        }

                        SwarmEvent::Behaviour(AircastEvent::Identify(
                            identify::Event::Received { peer_id, info, .. },
                        )) => {
                            debug!(
                                peer = %peer_id,
                                protocol = ?info.protocol_version,
                                "Identify: received info from peer"
                            );
                        }

                        SwarmEvent::Behaviour(AircastEvent::RelayClient(
                            relay::client::Event::ReservationReqAccepted {
                                relay_peer_id,
                                ..
                            },
                        )) => {
                            info!(relay = %relay_peer_id, "Relay reservation accepted");
                            peer_tracker.on_reservation(relay_peer_id);
                            let _ = notif_tx
                                .send(SwarmNotification::RelayReservation {
                                    relay_peer: relay_peer_id,
                                })
                                .await;
                        }

                        SwarmEvent::Behaviour(AircastEvent::Dcutr(event)) => {
                            debug!(event = ?event, "DCUtR event");
                        }

                        SwarmEvent::ConnectionEstablished {
                            peer_id, endpoint, ..
                        } => {
                            let addr = endpoint.get_remote_address().clone();
                            let transport = peer_tracker.on_connected(peer_id, addr.clone());

                            info!(
                                peer = %peer_id,
                                addr = %addr,
                                transport = %transport,
                                "Peer connected"
                            );
                            let _ = notif_tx
                                .send(SwarmNotification::PeerConnected {
                                    peer_id,
                                    address: addr,
                                })
                                .await;
                        }

                        SwarmEvent::ConnectionClosed {
                            peer_id,
                            num_established,
                            ..
                        } => {
                            if num_established == 0 {
                                peer_tracker.on_disconnected(&peer_id);
                                info!(peer = %peer_id, "Peer disconnected");
                                let _ = notif_tx
                                    .send(SwarmNotification::PeerDisconnected { peer_id })
                                    .await;
                            }
                        }

                        SwarmEvent::NewListenAddr { address, .. } => {
                            info!(addr = %address, "Listening on new address");
                        }

                        SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                            log_dial_error(peer_id, &error);
                        }

                        SwarmEvent::IncomingConnectionError { error, .. } => {
                            warn!(error = %error, "Incoming connection error");
                        }

                        _ => {}
                    }
                }
            }
        }

        info!("Swarm event loop terminated");
    });

    Ok((cmd_tx, notif_rx, local_peer_id))
}

/// Ordinary unreachability (transport-level connect failures, no usable
/// addresses, dial conditions) is expected in a P2P mesh and suppressed to
/// debug. Everything else is unexpected and logged at warn.
fn is_ordinary_unreachability(error: &DialError) -> bool {
    matches!(
        error,
        DialError::Transport(_) | DialError::NoAddresses | DialError::DialPeerConditionFalse(_)
    )
}

fn log_dial_error(peer_id: Option<PeerId>, error: &DialError) {
    if is_ordinary_unreachability(error) {
        debug!(peer = ?peer_id, error = %error, "Peer unreachable");
    } else {
        warn!(peer = ?peer_id, error = %error, "Unexpected dial failure");
    }
}

fn publish(swarm: &mut libp2p::Swarm<crate::behaviour::AircastBehaviour>, topic: &str, data: Vec<u8>) {
    let gossipsub_topic = gossipsub::IdentTopic::new(topic);
    match swarm.behaviour_mut().gossipsub.publish(gossipsub_topic, data) {
        Ok(_) => {}
        // An isolated node has nobody to gossip to; that is not a fault.
        Err(gossipsub::PublishError::InsufficientPeers) => {
            debug!(topic = %topic, "No peers to publish to");
        }
        Err(e) => {
            error!(topic = %topic, error = %e, "Publish failed");
        }
    }
}

/// Remote peers known to subscribe to `topic`.
fn topic_subscribers(
    swarm: &libp2p::Swarm<crate::behaviour::AircastBehaviour>,
    topic: &str,
) -> Vec<PeerId> {
    let hash = gossipsub::IdentTopic::new(topic).hash();
    swarm
        .behaviour()
        .gossipsub
        .all_peers()
        .filter(|(_, topics)| topics.contains(&&hash))
        .map(|(peer_id, _)| *peer_id)
        .collect()
}

/// Publish our own discovery announcement with current listen addresses.
fn announce_self(
    swarm: &mut libp2p::Swarm<crate::behaviour::AircastBehaviour>,
    local_peer_id: PeerId,
) {
    let addrs: Vec<String> = swarm
        .listeners()
        .cloned()
        .chain(swarm.external_addresses().cloned())
        .map(|ma| ma.to_string())
        .collect();

    if addrs.is_empty() {
        return;
    }

    let message = MeshMessage::DiscoveryAnnouncement(DiscoveryAnnouncement {
        peer_id: local_peer_id.to_base58(),
        addrs,
    });

    match message.to_bytes() {
        Ok(data) => publish(swarm, TOPIC_DISCOVERY, data),
        Err(e) => error!(error = %e, "Failed to encode discovery announcement"),
    }
}

/// Decode and dispatch one gossipsub message. This is the only place wire
/// bytes are interpreted.
async fn handle_mesh_message(
    swarm: &mut libp2p::Swarm<crate::behaviour::AircastBehaviour>,
    local_peer_id: PeerId,
    peer_tracker: &PeerTracker,
    policy: &dyn DialPolicy,
    notif_tx: &mpsc::Sender<SwarmNotification>,
    message: gossipsub::Message,
) {
    let topic = message.topic.as_str();

    let decoded = match MeshMessage::from_bytes(&message.data) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(
                topic = %topic,
                len = message.data.len(),
                error = %e,
                "Dropping undecodable message"
            );
            return;
        }
    };

    match (topic, decoded) {
        (TOPIC_AUDIO, MeshMessage::AudioChunk(chunk)) => {
            debug!(
                source = ?message.source,
                len = chunk.data.len(),
                "Audio chunk received"
            );
            let _ = notif_tx
                .send(SwarmNotification::AudioChunk {
                    source: message.source,
                    data: chunk.into_bytes(),
                })
                .await;
        }

        (TOPIC_DISCOVERY, MeshMessage::DiscoveryAnnouncement(announcement)) => {
            let peer_id = match announcement.peer_id.parse::<PeerId>() {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, "Discovery announcement with invalid peer id");
                    return;
                }
            };
            if peer_id == local_peer_id {
                return;
            }

            let addrs: Vec<Multiaddr> = announcement
                .addrs
                .iter()
                .filter_map(|s| s.parse::<Multiaddr>().ok())
                .map(|ma| ensure_peer_suffix(ma, peer_id))
                .filter(|ma| policy.allow_dial(ma))
                .collect();

            debug!(peer = %peer_id, addrs = addrs.len(), "Discovery announcement");

            if !peer_tracker.is_connected(&peer_id) {
                for addr in &addrs {
                    if let Err(e) = swarm.dial(addr.clone()) {
                        log_dial_error(Some(peer_id), &e);
                    }
                }
            }

            let _ = notif_tx
                .send(SwarmNotification::Discovery { peer_id, addrs })
                .await;
        }

        (topic, msg) => {
            debug!(topic = %topic, msg = ?msg, "Ignoring message variant on unexpected topic");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p::swarm::dial_opts::PeerCondition;

    #[test]
    fn test_unreachable_peers_are_ordinary_not_warnings() {
        // Expected in any mesh with churn: these stay at debug.
        assert!(is_ordinary_unreachability(&DialError::NoAddresses));
        assert!(is_ordinary_unreachability(&DialError::Transport(Vec::new())));
        assert!(is_ordinary_unreachability(&DialError::DialPeerConditionFalse(
            PeerCondition::Disconnected,
        )));
    }

    #[test]
    fn test_aborted_dial_is_not_ordinary() {
        assert!(!is_ordinary_unreachability(&DialError::Aborted));
    }
}
