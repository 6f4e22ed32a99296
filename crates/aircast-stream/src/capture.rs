//! Capture & publish pipeline.
//!
//! Turns locally captured, already-encoded audio chunks into published
//! gossipsub messages. Publishing is gated on the audio topic's remote
//! subscriber count: below the threshold a chunk is dropped on the floor,
//! never buffered for later delivery. The gate lives here, on the caller
//! side of the channel, not inside the pub/sub layer.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use aircast_net::swarm::SwarmCommand;
use aircast_shared::constants::{MIN_AUDIO_SUBSCRIBERS, TOPIC_AUDIO};
use aircast_shared::protocol::{AudioChunkMessage, MeshMessage};

/// Publishes captured chunks while enough listeners are subscribed.
pub struct CapturePipeline {
    cmd_tx: mpsc::Sender<SwarmCommand>,
    chunks: mpsc::Receiver<Bytes>,
}

impl CapturePipeline {
    /// `chunks` is the output of an already-acquired capture source; if
    /// source acquisition failed there is nothing to construct here.
    pub fn new(cmd_tx: mpsc::Sender<SwarmCommand>, chunks: mpsc::Receiver<Bytes>) -> Self {
        Self { cmd_tx, chunks }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!(topic = TOPIC_AUDIO, "Capture pipeline started");

        while let Some(chunk) = self.chunks.recv().await {
            if chunk.is_empty() {
                continue;
            }

            let subscribers = match self.subscriber_count().await {
                Some(n) => n,
                // Swarm gone; no point capturing into the void.
                None => break,
            };

            if subscribers < MIN_AUDIO_SUBSCRIBERS {
                debug!(
                    subscribers,
                    len = chunk.len(),
                    "Below subscriber threshold, chunk dropped"
                );
                continue;
            }

            let message = MeshMessage::AudioChunk(AudioChunkMessage {
                data: chunk.to_vec(),
            });
            let data = match message.to_bytes() {
                Ok(data) => data,
                Err(e) => {
                    warn!(error = %e, "Failed to encode audio chunk, dropped");
                    continue;
                }
            };

            // Transport-level publish failures are logged in the swarm
            // loop and are transient; capture continues regardless.
            if self
                .cmd_tx
                .send(SwarmCommand::Publish {
                    topic: TOPIC_AUDIO.to_string(),
                    data,
                })
                .await
                .is_err()
            {
                break;
            }
        }

        info!("Capture pipeline terminated");
    }

    async fn subscriber_count(&self) -> Option<usize> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(SwarmCommand::GetSubscribers {
                topic: TOPIC_AUDIO.to_string(),
                reply,
            })
            .await
            .ok()?;
        rx.await.ok().map(|subs| subs.len())
    }
}
