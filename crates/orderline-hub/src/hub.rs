//! # Event Hub
//!
//! Registry of connected terminals plus the relay that feeds them from the
//! shared broadcast channel.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Event Hub (one per instance)                   │
//! │                                                                         │
//! │  OrderProcessor                                                         │
//! │       │ publish(NEW_ORDER, order)      after commit, never blocks on    │
//! │       ▼                                terminal delivery                │
//! │  BroadcastTransport ─────────────────────────► other instances          │
//! │       │                                                                 │
//! │       ▼ subscribe(channel)                                              │
//! │  ┌───────────────┐                                                      │
//! │  │  Relay task   │  resubscribes with exponential backoff when the      │
//! │  └──────┬────────┘  stream ends                                         │
//! │         │ fan_out(bytes)                                                │
//! │         ▼                                                               │
//! │  ┌─────────────────────────────────────────────┐                        │
//! │  │ terminals: RwLock<HashMap<id, Terminal>>    │                        │
//! │  │                                             │                        │
//! │  │  kitchen-1  [mpsc 64] ──► WebSocket task    │                        │
//! │  │  cashier-1  [mpsc 64] ──► WebSocket task    │                        │
//! │  │  kitchen-2  [ FULL  ] ──► dropped           │                        │
//! │  └─────────────────────────────────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Delivery Rules
//! - Drop-on-full: a terminal whose queue is full (or whose socket is gone)
//!   is removed during fan-out. Its receiver then ends, which closes the
//!   socket task.
//! - No replay: a terminal registered after a fan-out never sees it.
//! - Fan-out holds the registry write lock for the whole pass, so the
//!   recipients of one event are exactly the terminals registered when the
//!   pass starts.

use std::collections::HashMap;
use std::sync::Arc;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::HubConfig;
use crate::error::{HubError, HubResult};
use crate::protocol::{Envelope, RawEnvelope};
use crate::transport::BroadcastTransport;
use orderline_core::{EventType, TerminalKind};

// =============================================================================
// Terminal Registry
// =============================================================================

/// Identifier handed out by [`EventHub::register`].
pub type TerminalId = String;

/// A connected terminal as the hub sees it.
struct Terminal {
    kind: TerminalKind,
    /// Only events for this store are delivered. `None` receives everything.
    store_id: Option<String>,
    tx: mpsc::Sender<String>,
}

impl Terminal {
    fn wants(&self, event_store: Option<&str>) -> bool {
        match (&self.store_id, event_store) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => true,
        }
    }
}

/// What a new terminal gets back: its ID and the queue to drain.
pub struct Registration {
    pub id: TerminalId,
    pub rx: mpsc::Receiver<String>,
}

// =============================================================================
// Event Hub
// =============================================================================

/// In-process terminal registry bound to one broadcast channel.
///
/// Built once at startup and shared as `Arc<EventHub>`.
pub struct EventHub {
    transport: Arc<dyn BroadcastTransport>,
    channel: String,
    terminal_buffer: usize,
    terminals: RwLock<HashMap<TerminalId, Terminal>>,
}

impl EventHub {
    pub fn new(transport: Arc<dyn BroadcastTransport>, config: &HubConfig) -> Self {
        EventHub {
            transport,
            channel: config.channel.clone(),
            terminal_buffer: config.terminal_buffer.max(1),
            terminals: RwLock::new(HashMap::new()),
        }
    }

    /// Serializes `{type, payload}` and sends it to the shared channel.
    ///
    /// Delivery to terminals happens later, on every instance's relay.
    pub async fn publish<T: Serialize>(&self, event_type: EventType, payload: &T) -> HubResult<()> {
        let bytes = Envelope::new(event_type, payload)?.to_bytes()?;
        self.transport.publish(&self.channel, bytes).await?;
        debug!(event = %event_type, "Event published");
        Ok(())
    }

    /// Adds a terminal and returns its outbound queue.
    pub async fn register(&self, kind: TerminalKind, store_id: Option<String>) -> Registration {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.terminal_buffer);

        self.terminals.write().await.insert(
            id.clone(),
            Terminal {
                kind,
                store_id: store_id.clone(),
                tx,
            },
        );

        info!(terminal_id = %id, kind = ?kind, store_id = ?store_id, "Terminal registered");
        Registration { id, rx }
    }

    /// Removes a terminal. Returns false if it was already gone.
    pub async fn unregister(&self, id: &str) -> bool {
        let removed = self.terminals.write().await.remove(id).is_some();
        if removed {
            info!(terminal_id = %id, "Terminal unregistered");
        }
        removed
    }

    /// Delivers one channel message to every matching local terminal.
    ///
    /// Returns the number of terminals the message was queued for. Event
    /// types this build does not know are forwarded unchanged.
    pub async fn fan_out(&self, bytes: &[u8]) -> HubResult<usize> {
        let envelope = RawEnvelope::from_bytes(bytes)?;
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| HubError::InvalidEnvelope(e.to_string()))?;
        let event_store = envelope.store_id();

        let mut terminals = self.terminals.write().await;
        let mut delivered = 0;

        terminals.retain(|id, terminal| {
            if !terminal.wants(event_store) {
                return true;
            }
            match terminal.tx.try_send(text.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(terminal_id = %id, kind = ?terminal.kind, "Terminal queue full, dropping");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(terminal_id = %id, "Terminal gone, removing");
                    false
                }
            }
        });

        debug!(event = %envelope.event_type, delivered, "Fan-out complete");
        Ok(delivered)
    }

    pub async fn terminal_count(&self) -> usize {
        self.terminals.read().await.len()
    }

    /// Subscribes to the shared channel and starts relaying into [`fan_out`].
    ///
    /// The first subscription is attempted before this returns, so events
    /// published after a successful start are not missed. Later losses are
    /// retried in the background with exponential backoff.
    ///
    /// [`fan_out`]: EventHub::fan_out
    pub async fn start_relay(self: &Arc<Self>, config: &HubConfig) -> RelayHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        let first = match self.transport.subscribe(&self.channel).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(error = %e, "Initial subscribe failed, retrying in background");
                None
            }
        };

        let relay = Relay {
            hub: Arc::clone(self),
            backoff: ExponentialBackoff {
                initial_interval: config.reconnect_initial(),
                max_interval: config.reconnect_max(),
                multiplier: 2.0,
                max_elapsed_time: None,
                ..Default::default()
            },
            shutdown_rx,
        };

        let task = tokio::spawn(relay.run(first));
        RelayHandle { shutdown_tx, task }
    }
}

// =============================================================================
// Relay
// =============================================================================

/// Handle for stopping the relay task.
pub struct RelayHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    /// Stops the relay and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            error!(error = %e, "Relay task failed");
        }
    }
}

struct Relay {
    hub: Arc<EventHub>,
    backoff: ExponentialBackoff,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Relay {
    async fn run(mut self, mut stream: Option<futures_util::stream::BoxStream<'static, Vec<u8>>>) {
        info!(channel = %self.hub.channel, "Event relay starting");

        loop {
            if let Some(mut messages) = stream.take() {
                self.backoff.reset();

                loop {
                    tokio::select! {
                        next = messages.next() => match next {
                            Some(bytes) => {
                                if let Err(e) = self.hub.fan_out(&bytes).await {
                                    warn!(error = %e, "Dropping undeliverable message");
                                }
                            }
                            None => {
                                warn!("Broadcast subscription ended");
                                break;
                            }
                        },
                        _ = self.shutdown_rx.recv() => {
                            info!("Event relay stopped");
                            return;
                        }
                    }
                }
            }

            let Some(delay) = self.backoff.next_backoff() else {
                error!("Relay backoff exhausted");
                return;
            };
            warn!(?delay, "Resubscribing after backoff");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown_rx.recv() => {
                    info!("Event relay stopped during backoff");
                    return;
                }
            }

            match self.hub.transport.subscribe(&self.hub.channel).await {
                Ok(messages) => stream = Some(messages),
                Err(e) => warn!(error = %e, "Resubscribe failed"),
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
