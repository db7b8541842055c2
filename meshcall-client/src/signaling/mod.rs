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

//! The room signaling socket.
//!
//! The coordinator talks to the socket through [`SignalingSocket`] and
//! opens it through [`SignalingConnector`], so the same session logic runs
//! over `tokio-tungstenite` in production and over an in-memory socket in
//! tests. Inbound frames arrive as [`SocketEvent`]s on an mpsc channel that
//! always ends with exactly one `Closed`.

mod websocket;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use meshcall_types::OutboundMessage;
use tokio::sync::mpsc;

pub use meshcall_transport::{CloseInfo, SocketEvent};
pub use websocket::WebSocketConnector;

use crate::error::SignalingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for SignalingState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignalingState::Connecting => write!(f, "connecting"),
            SignalingState::Open => write!(f, "open"),
            SignalingState::Closed => write!(f, "closed"),
        }
    }
}

/// Write half of an open signaling socket.
#[async_trait]
pub trait SignalingSocket: Send + Sync {
    async fn send_text(&self, text: String) -> Result<(), SignalingError>;

    /// Close with a normal close code. Idempotent.
    async fn close(&self);
}

#[async_trait]
pub trait SignalingConnector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn SignalingSocket>, mpsc::Receiver<SocketEvent>), SignalingError>;
}

/// The session's handle on the socket: encodes outbound messages and
/// tracks the channel state.
pub struct SignalingChannel {
    socket: Arc<dyn SignalingSocket>,
    state: SignalingState,
}

impl SignalingChannel {
    /// Wrap a socket that has just finished connecting.
    pub fn new(socket: Arc<dyn SignalingSocket>) -> Self {
        Self {
            socket,
            state: SignalingState::Connecting,
        }
    }

    pub fn state(&self) -> SignalingState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SignalingState) {
        self.state = state;
    }

    pub async fn send(&self, message: &OutboundMessage) -> Result<(), SignalingError> {
        if self.state != SignalingState::Open {
            return Err(SignalingError::NotOpen);
        }
        let text = message
            .to_json()
            .map_err(|e| SignalingError::Encode(e.to_string()))?;
        debug!(
            "-> {} to {}",
            message_kind(message),
            message.recipient().unwrap_or("server")
        );
        self.socket.send_text(text).await
    }

    /// Close the socket and mark the channel closed.
    pub async fn close(&mut self) {
        if self.state == SignalingState::Closed {
            return;
        }
        self.state = SignalingState::Closed;
        self.socket.close().await;
    }

    /// Send `leave` if the socket is still open, then close it.
    pub async fn leave(&mut self) {
        if self.state == SignalingState::Open {
            if let Err(e) = self.send(&OutboundMessage::Leave {}).await {
                warn!("Failed to send leave: {e}");
            }
        }
        self.close().await;
    }
}

fn message_kind(message: &OutboundMessage) -> &'static str {
    match message {
        OutboundMessage::Offer { .. } => "offer",
        OutboundMessage::Answer { .. } => "answer",
        OutboundMessage::Candidate { .. } => "candidate",
        OutboundMessage::Leave {} => "leave",
    }
}
