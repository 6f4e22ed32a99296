//! Session-level mesh node handle.
//!
//! [`MeshNode`] owns the keypair and swarm configuration for one session.
//! `start` is idempotent: the swarm task is spawned at most once and later
//! calls return the existing handle. All interaction afterwards goes
//! through the cloneable [`NodeHandle`].

use libp2p::{identity::Keypair, Multiaddr, PeerId};
use tokio::sync::{mpsc, oneshot};

use crate::diagnostics::DiagnosticsSnapshot;
use crate::swarm::{spawn_swarm, SwarmCommand, SwarmConfig, SwarmNotification};

pub struct MeshNode {
    keypair: Keypair,
    config: Option<SwarmConfig>,
    handle: Option<NodeHandle>,
    notifications: Option<mpsc::Receiver<SwarmNotification>>,
}

impl MeshNode {
    /// Create a node with a fresh ed25519 identity.
    pub fn new(config: SwarmConfig) -> Self {
        Self::with_keypair(Keypair::generate_ed25519(), config)
    }

    /// Create a node with an existing identity.
    pub fn with_keypair(keypair: Keypair, config: SwarmConfig) -> Self {
        Self {
            keypair,
            config: Some(config),
            handle: None,
            notifications: None,
        }
    }

    /// Spawn the swarm task. Idempotent after success; fails only on
    /// transport/security construction errors. A failed start consumes the
    /// configuration, so a retry errors instead of spawning with defaults.
    pub async fn start(&mut self) -> anyhow::Result<NodeHandle> {
        if let Some(ref handle) = self.handle {
            return Ok(handle.clone());
        }

        let config = self
            .config
            .take()
            .ok_or_else(|| anyhow::anyhow!("Node startup already failed"))?;
        let (cmd_tx, notif_rx, local_peer_id) =
            spawn_swarm(self.keypair.clone(), config).await?;

        let handle = NodeHandle {
            local_peer_id,
            cmd_tx,
        };
        self.handle = Some(handle.clone());
        self.notifications = Some(notif_rx);
        Ok(handle)
    }

    /// Take the notification stream. Yields `Some` exactly once, after
    /// `start`; the receiver is released by dropping it.
    pub fn take_notifications(&mut self) -> Option<mpsc::Receiver<SwarmNotification>> {
        self.notifications.take()
    }
}

/// Cloneable handle for talking to a running swarm task.
#[derive(Clone)]
pub struct NodeHandle {
    pub local_peer_id: PeerId,
    cmd_tx: mpsc::Sender<SwarmCommand>,
}

impl NodeHandle {
    pub async fn dial(&self, addr: Multiaddr) -> anyhow::Result<()> {
        self.send(SwarmCommand::Dial(addr)).await
    }

    pub async fn subscribe(&self, topic: &str) -> anyhow::Result<()> {
        self.send(SwarmCommand::Subscribe(topic.to_string())).await
    }

    pub async fn publish(&self, topic: &str, data: Vec<u8>) -> anyhow::Result<()> {
        self.send(SwarmCommand::Publish {
            topic: topic.to_string(),
            data,
        })
        .await
    }

    /// Remote peers known to subscribe to `topic`.
    pub async fn subscribers(&self, topic: &str) -> anyhow::Result<Vec<PeerId>> {
        let (reply, rx) = oneshot::channel();
        self.send(SwarmCommand::GetSubscribers {
            topic: topic.to_string(),
            reply,
        })
        .await?;
        Ok(rx.await?)
    }

    /// Read-only diagnostics snapshot.
    pub async fn diagnostics(&self) -> anyhow::Result<DiagnosticsSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(SwarmCommand::GetDiagnostics(reply)).await?;
        Ok(rx.await?)
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.send(SwarmCommand::Shutdown).await
    }

    /// Raw command sender, for components that talk to the swarm directly.
    pub fn command_sender(&self) -> mpsc::Sender<SwarmCommand> {
        self.cmd_tx.clone()
    }

    async fn send(&self, cmd: SwarmCommand) -> anyhow::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| anyhow::anyhow!("Swarm command channel closed"))
    }
}
