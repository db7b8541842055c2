/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Reconnecting socket for the general-purpose messaging channel.
//!
//! The chat/presence socket survives network blips by reconnecting with
//! exponential backoff, up to a bounded number of attempts. The call
//! signaling socket deliberately does not use this: a dropped signaling
//! socket ends the meeting and the user rejoins.

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::native_websocket::{CloseInfo, NativeWebSocketClient, SocketEvent};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const OUTBOUND_CHANNEL_CAPACITY: usize = 128;

/// Exponential backoff with a cap and a bounded attempt count.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based), or `None` once the
    /// attempt budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = self.multiplier.max(1.0).powi(attempt as i32 - 1);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Some(Duration::from_millis(capped as u64))
    }
}

/// Events reported by [`ReconnectingWebSocket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagingEvent {
    Connected,
    Message(String),
    Reconnecting { attempt: u32, delay: Duration },
    /// The attempt budget ran out; the socket will not reconnect again.
    GaveUp { attempts: u32 },
    /// Closed cleanly, either by the server or by [`ReconnectingWebSocket::shutdown`].
    Closed,
}

/// A text WebSocket that reconnects on abnormal closure.
///
/// Outbound messages sent while disconnected are queued and flushed after
/// the next successful connect.
pub struct ReconnectingWebSocket {
    outbound: mpsc::Sender<String>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconnectingWebSocket {
    /// Spawn the supervisor task. Requires an active tokio runtime.
    pub fn spawn(url: String, policy: ReconnectPolicy) -> (Self, mpsc::Receiver<MessagingEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(supervise(url, policy, outbound_rx, shutdown_rx, event_tx));

        (
            Self {
                outbound: outbound_tx,
                shutdown: shutdown_tx,
                task,
            },
            event_rx,
        )
    }

    /// Queue a text frame for sending.
    pub async fn send_text(&self, text: String) -> Result<()> {
        self.outbound
            .send(text)
            .await
            .map_err(|_| anyhow!("messaging socket has shut down"))
    }

    /// Close the socket and stop reconnecting.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ReconnectingWebSocket {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn supervise(
    url: String,
    policy: ReconnectPolicy,
    mut outbound_rx: mpsc::Receiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
    events: mpsc::Sender<MessagingEvent>,
) {
    let mut attempt = 0u32;
    loop {
        if *shutdown_rx.borrow() {
            let _ = events.send(MessagingEvent::Closed).await;
            return;
        }

        match NativeWebSocketClient::try_connect(&url).await {
            Ok((client, mut inbound)) => {
                attempt = 0;
                let _ = events.send(MessagingEvent::Connected).await;

                let close = loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => {
                            let _ = client.close().await;
                            let _ = events.send(MessagingEvent::Closed).await;
                            return;
                        }
                        Some(text) = outbound_rx.recv() => {
                            if let Err(e) = client.send_text(text).await {
                                warn!("Messaging socket send failed: {e}");
                            }
                        }
                        event = inbound.recv() => match event {
                            Some(SocketEvent::Text(text)) => {
                                let _ = events.send(MessagingEvent::Message(text)).await;
                            }
                            Some(SocketEvent::Closed(info)) => break info,
                            None => break CloseInfo::new(None, "reader ended"),
                        }
                    }
                };

                if close.is_clean() {
                    info!("Messaging socket closed cleanly: {close:?}");
                    let _ = events.send(MessagingEvent::Closed).await;
                    return;
                }
                warn!("Messaging socket dropped: {close:?}");
            }
            Err(e) => {
                warn!("Messaging socket connect failed: {e}");
            }
        }

        attempt += 1;
        let Some(delay) = policy.delay_for(attempt) else {
            let attempts = attempt - 1;
            warn!("Messaging socket giving up after {attempts} reconnect attempts");
            let _ = events.send(MessagingEvent::GaveUp { attempts }).await;
            return;
        };
        debug!("Messaging socket reconnect attempt {attempt} in {delay:?}");
        let _ = events
            .send(MessagingEvent::Reconnecting { attempt, delay })
            .await;

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.changed() => {
                let _ = events.send(MessagingEvent::Closed).await;
                return;
            }
        }
    }
}
