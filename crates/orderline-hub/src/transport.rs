//! # Broadcast Transport
//!
//! The cross-instance channel under the [`EventHub`](crate::EventHub).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BroadcastTransport                                                     │
//! │                                                                         │
//! │    publish(channel, bytes)      any instance, fire and forget           │
//! │    subscribe(channel) ──► stream of bytes, ends when the link drops     │
//! │                                                                         │
//! │  RedisTransport    Redis PUBLISH / SUBSCRIBE, one pub/sub connection    │
//! │                    per subscription, shared ConnectionManager for       │
//! │                    publishing                                           │
//! │  MemoryTransport   tokio broadcast channel, single process and tests    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Neither transport replays: a subscriber sees only what is published after
//! it subscribed.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::error::{HubError, HubResult};

/// Pub/sub backend shared by all service instances.
#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    /// Publishes `payload` to every current subscriber of `channel`.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> HubResult<()>;

    /// Subscribes to `channel`. The stream ends when the subscription is lost.
    async fn subscribe(&self, channel: &str) -> HubResult<BoxStream<'static, Vec<u8>>>;
}

// =============================================================================
// Redis
// =============================================================================

/// Redis pub/sub transport.
pub struct RedisTransport {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisTransport {
    /// Connects the publishing side. Subscriptions open their own connections.
    pub async fn connect(url: &str) -> HubResult<Self> {
        let client =
            redis::Client::open(url).map_err(|e| HubError::InvalidConfig(e.to_string()))?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| HubError::ConnectionFailed(e.to_string()))?;

        info!("Connected to Redis");
        Ok(RedisTransport { client, publisher })
    }
}

#[async_trait]
impl BroadcastTransport for RedisTransport {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> HubResult<()> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn.publish(channel, payload).await?;
        debug!(channel = %channel, receivers, "Published to Redis");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> HubResult<BoxStream<'static, Vec<u8>>> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| HubError::SubscribeFailed(e.to_string()))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| HubError::SubscribeFailed(e.to_string()))?;

        info!(channel = %channel, "Subscribed to Redis channel");

        let messages = pubsub.into_on_message().filter_map(|msg| {
            let payload = match msg.get_payload::<Vec<u8>>() {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable pub/sub message");
                    None
                }
            };
            futures_util::future::ready(payload)
        });

        Ok(messages.boxed())
    }
}

// =============================================================================
// In-process
// =============================================================================

/// Capacity of each in-process channel. Slow relays skip ahead when lagging.
const MEMORY_CHANNEL_CAPACITY: usize = 1024;

/// In-process transport for a single instance and for tests.
#[derive(Default)]
pub struct MemoryTransport {
    channels: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender(&self, channel: &str) -> broadcast::Sender<Vec<u8>> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(MEMORY_CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Number of live subscriptions on `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .await
            .get(channel)
            .map_or(0, |tx| tx.receiver_count())
    }
}

#[async_trait]
impl BroadcastTransport for MemoryTransport {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> HubResult<()> {
        // No subscribers is not an error.
        let _ = self.sender(channel).await.send(payload);
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> HubResult<BoxStream<'static, Vec<u8>>> {
        let rx = self.sender(channel).await.subscribe();

        let messages = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => return Some((payload, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "In-process subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(messages.boxed())
    }
}
