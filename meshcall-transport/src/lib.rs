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

//! Native transport layer for meshcall.
//!
//! - [`native_websocket`]: a `tokio-tungstenite` text socket used for call
//!   signaling. It never reconnects on its own.
//! - [`reconnect`]: the general-purpose messaging socket, which reconnects
//!   with exponential backoff up to a bounded attempt count.

pub mod native_websocket;
pub mod reconnect;

pub use native_websocket::{CloseInfo, NativeWebSocketClient, SocketEvent, WebSocketConnectError};
pub use reconnect::{MessagingEvent, ReconnectPolicy, ReconnectingWebSocket};
