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

//! Signaling over `tokio-tungstenite`.

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use meshcall_transport::{NativeWebSocketClient, SocketEvent};
use tokio::sync::mpsc;

use super::{SignalingConnector, SignalingSocket};
use crate::error::SignalingError;

/// Opens signaling sockets with [`NativeWebSocketClient`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl SignalingConnector for WebSocketConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn SignalingSocket>, mpsc::Receiver<SocketEvent>), SignalingError> {
        let (client, inbound) = NativeWebSocketClient::try_connect(url)
            .await
            .map_err(|e| SignalingError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
                status: e.http_status(),
            })?;
        info!("Signaling socket open: {url}");
        Ok((Arc::new(WebSocketSignaling { client }), inbound))
    }
}

struct WebSocketSignaling {
    client: NativeWebSocketClient,
}

#[async_trait]
impl SignalingSocket for WebSocketSignaling {
    async fn send_text(&self, text: String) -> Result<(), SignalingError> {
        if !self.client.is_connected() {
            return Err(SignalingError::NotOpen);
        }
        self.client
            .send_text(text)
            .await
            .map_err(|e| SignalingError::Send(e.to_string()))
    }

    async fn close(&self) {
        if let Err(e) = self.client.close().await {
            warn!("Error closing signaling socket: {e}");
        }
    }
}
