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

//! Native WebSocket client using `tokio-tungstenite`.
//!
//! The signaling protocol is JSON in text frames, so unlike a media socket
//! this client forwards text frames and drops binary ones. The inbound
//! channel always ends with exactly one [`SocketEvent::Closed`] carrying the
//! close code, which callers use to tell a clean hang-up from a dropped
//! connection.
//!
//! # Example
//!
//! ```no_run
//! use meshcall_transport::native_websocket::{NativeWebSocketClient, SocketEvent};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (client, mut inbound_rx) =
//!     NativeWebSocketClient::connect("wss://signal.example.com/rooms/standup").await?;
//!
//! client.send_text(r#"{"type":"leave"}"#.to_string()).await?;
//!
//! while let Some(event) = inbound_rx.recv().await {
//!     match event {
//!         SocketEvent::Text(text) => println!("<- {text}"),
//!         SocketEvent::Closed(info) => println!("closed: {info:?}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::{anyhow, Result};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// Error type for WebSocket connection attempts.
///
/// Preserves the HTTP status code when the server rejects the upgrade, which
/// is how the signaling server reports an expired room token (401) or a
/// closed room (410).
#[derive(Debug, thiserror::Error)]
pub enum WebSocketConnectError {
    /// The URL is not a `ws://` or `wss://` URL.
    #[error("invalid WebSocket URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// The server rejected the upgrade with an HTTP error status.
    #[error("HTTP {status}: WebSocket upgrade rejected")]
    HttpError {
        /// The HTTP status code returned by the server.
        status: u16,
    },
    /// A transport-level or protocol-level error occurred.
    #[error("WebSocket connection failed: {0}")]
    Other(String),
}

impl WebSocketConnectError {
    /// Returns the HTTP status code if this was an HTTP rejection, else `None`.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status } => Some(*status),
            _ => None,
        }
    }
}

/// How the socket ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code from the close frame, `None` if the stream ended without one.
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Normal (1000) and going-away (1001) closes are clean; anything else,
    /// including a missing close frame, is abnormal.
    pub fn is_clean(&self) -> bool {
        meshcall_types::is_clean_close(self.code)
    }
}

/// Inbound events delivered by the reader task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Text(String),
    /// Terminal event; nothing follows it.
    Closed(CloseInfo),
}

/// A native WebSocket client wrapping `tokio-tungstenite`.
#[derive(Clone)]
pub struct NativeWebSocketClient {
    writer: Arc<Mutex<SplitSink<WsStream, Message>>>,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for NativeWebSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeWebSocketClient")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl NativeWebSocketClient {
    /// Connect to a WebSocket server.
    ///
    /// Returns the client and a receiver for inbound events. For a version
    /// that preserves HTTP status codes on failed upgrades, see
    /// [`try_connect`](Self::try_connect).
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<SocketEvent>)> {
        Self::try_connect(url).await.map_err(|e| anyhow!("{e}"))
    }

    /// Connect to a WebSocket server, returning a typed error on failure.
    pub async fn try_connect(
        url: &str,
    ) -> std::result::Result<(Self, mpsc::Receiver<SocketEvent>), WebSocketConnectError> {
        validate_url(url)?;
        info!("NativeWebSocket connecting to {url}");

        let (ws_stream, response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| match e {
                    tokio_tungstenite::tungstenite::Error::Http(resp) => {
                        WebSocketConnectError::HttpError {
                            status: resp.status().as_u16(),
                        }
                    }
                    other => WebSocketConnectError::Other(format!(
                        "WebSocket connection to '{url}' failed: {other}"
                    )),
                })?;

        info!("WebSocket connected to {url} (HTTP {})", response.status());

        Ok(Self::setup_streams(ws_stream))
    }

    /// Internal: split the stream and spawn the reader task.
    fn setup_streams(ws_stream: WsStream) -> (Self, mpsc::Receiver<SocketEvent>) {
        let (writer, mut reader) = ws_stream.split();

        let closed = Arc::new(AtomicBool::new(false));
        let client = Self {
            writer: Arc::new(Mutex::new(writer)),
            closed: closed.clone(),
        };

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let closed_reader = closed.clone();

        tokio::spawn(async move {
            let mut close_info = None;
            while let Some(msg_result) = reader.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = inbound_tx.send(SocketEvent::Text(text)).await {
                            debug!("Inbound channel closed: {e}");
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let info = match frame {
                            Some(frame) => {
                                CloseInfo::new(Some(u16::from(frame.code)), frame.reason.to_string())
                            }
                            None => CloseInfo::new(None, "close frame without status"),
                        };
                        info!("WebSocket received close frame: {info:?}");
                        close_info = Some(info);
                        break;
                    }
                    Ok(Message::Binary(data)) => {
                        debug!("WebSocket binary frame ignored ({} bytes)", data.len());
                    }
                    Ok(Message::Ping(payload)) => {
                        debug!("WebSocket ping received ({} bytes)", payload.len());
                    }
                    Ok(Message::Pong(_)) => {
                        debug!("WebSocket pong received");
                    }
                    Ok(Message::Frame(_)) => {
                        debug!("WebSocket raw frame ignored");
                    }
                    Err(e) => {
                        if !closed_reader.load(Ordering::Relaxed) {
                            error!("WebSocket read error: {e}");
                        }
                        close_info = Some(CloseInfo::new(None, e.to_string()));
                        break;
                    }
                }
            }
            let was_closed_locally = closed_reader.swap(true, Ordering::AcqRel);
            let info = close_info.unwrap_or_else(|| {
                if was_closed_locally {
                    CloseInfo::new(Some(meshcall_types::CLOSE_NORMAL), "closed by client")
                } else {
                    CloseInfo::new(None, "stream ended")
                }
            });
            let _ = inbound_tx.send(SocketEvent::Closed(info)).await;
            debug!("WebSocket inbound reader loop ended");
        });

        (client, inbound_rx)
    }

    /// Send a text frame.
    pub async fn send_text(&self, text: String) -> Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(anyhow!("WebSocket is closed"));
        }
        let mut writer = self.writer.lock().await;
        writer
            .send(Message::Text(text))
            .await
            .map_err(|e| anyhow!("WebSocket send error: {e}"))
    }

    /// Whether the WebSocket connection is still open.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Relaxed)
    }

    /// Close the WebSocket connection gracefully.
    pub async fn close(&self) -> Result<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.send(Message::Close(None)).await {
                warn!("Error sending WebSocket close frame: {e}");
            }
        }
        Ok(())
    }

    /// Mark the connection as closed without sending a close frame.
    pub fn force_close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

fn validate_url(url: &str) -> std::result::Result<(), WebSocketConnectError> {
    let parsed = url::Url::parse(url).map_err(|e| WebSocketConnectError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(WebSocketConnectError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}
