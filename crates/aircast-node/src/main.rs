//! Aircast operator node.
//!
//! Wires the mesh layer to local audio devices: captured chunks are
//! published to the mesh, received chunks are fed to the playback
//! pipeline. A node without audio devices still participates as a
//! relay hop and discovery peer.

mod config;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aircast_net::{
    parse_multiaddrs, AllowAll, AllowGlobal, DialPolicy, MeshNode, SwarmConfig, SwarmNotification,
};
use aircast_shared::constants::AUDIO_ENCODING;
use aircast_stream::{
    playback::{spawn_playback, PlaybackEvent},
    CaptureConfig, CapturePipeline, MicSource, PcmEncoder, SpeakerSink,
};

use config::NodeConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("aircast_node=debug,aircast_net=debug,aircast_stream=debug,info")
        }))
        .init();

    let config = NodeConfig::from_env();
    info!(?config, "Starting aircast node");

    let policy: Arc<dyn DialPolicy> = if config.allow_local {
        Arc::new(AllowAll)
    } else {
        Arc::new(AllowGlobal)
    };

    let mut node = MeshNode::new(SwarmConfig {
        listen_port: config.listen_port,
        bootstrap: parse_multiaddrs(&config.bootstrap),
        relay_reference: config.relay_reference.clone(),
        policy,
    });
    let handle = node.start().await?;
    let mut notifications = node
        .take_notifications()
        .ok_or_else(|| anyhow::anyhow!("Notification stream already taken"))?;

    info!(peer_id = %handle.local_peer_id, "Mesh node running");

    // Playback pipeline. Chunks arriving before the speaker is ready queue
    // up and drain once the sink attaches.
    let (playback_tx, playback_rx) = mpsc::channel::<PlaybackEvent>(64);
    let playback_task = spawn_playback(AUDIO_ENCODING, playback_rx);

    let audio_config = CaptureConfig::default();
    match SpeakerSink::new(&audio_config) {
        Ok(sink) => {
            let _ = playback_tx
                .send(PlaybackEvent::SinkReady(Box::new(sink)))
                .await;
        }
        Err(e) => warn!(error = %e, "No playback device, received audio will queue"),
    }

    // Capture device acquisition failure is final; the node keeps running
    // as a listener.
    let mut mic = MicSource::new(audio_config);
    match mic.start(PcmEncoder) {
        Ok(chunks) => {
            CapturePipeline::new(handle.command_sender(), chunks).spawn();
        }
        Err(e) => warn!(error = %e, "No capture device, running listen-only"),
    }

    // Forward mesh audio into the playback pipeline.
    let forward_tx = playback_tx.clone();
    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            if let SwarmNotification::AudioChunk { data, .. } = notification {
                if forward_tx.send(PlaybackEvent::Chunk(data)).await.is_err() {
                    break;
                }
            }
        }
    });

    if config.diagnostics_secs > 0 {
        let diag_handle = handle.clone();
        let secs = config.diagnostics_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(secs));
            // First tick fires immediately; skip it so the mesh has a
            // moment to form before the first snapshot.
            interval.tick().await;
            loop {
                interval.tick().await;
                match diag_handle.diagnostics().await {
                    Ok(snapshot) => info!("Mesh diagnostics\n{snapshot}"),
                    Err(_) => break,
                }
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    mic.stop();
    handle.shutdown().await?;
    let _ = playback_tx.send(PlaybackEvent::Shutdown).await;
    let _ = playback_task.await;

    Ok(())
}
