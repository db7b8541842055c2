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

//! Peer mesh coordinator for multi-party video calls.
//!
//! Every participant holds one WebRTC peer connection to every other
//! participant. This crate keeps that mesh in shape: it captures local
//! media, joins the room over a signaling WebSocket, decides which side of
//! each pair sends the offer, exchanges SDP and ICE candidates, swaps the
//! camera for the screen on every link when sharing, and derives the tile
//! grid a UI renders.
//!
//! # Outline of usage
//!
//! ## Joining a meeting:
//! ```no_run
//! # use std::sync::Arc;
//! # use meshcall_client::*;
//! # async fn example(deps: CoordinatorDeps) -> Result<(), CoordinatorError> {
//! let config = MeetingConfig::default();
//! let mut coordinator = MeshCoordinator::new(config, deps);
//! let mut events = coordinator.subscribe();
//! coordinator.start().await?;
//!
//! coordinator.toggle_audio().await?; // mute
//! coordinator.toggle_screen_share().await?; // share the screen on every link
//!
//! coordinator.stop().await?; // sends leave, closes every link
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform seams:
//!
//! - [`MediaDevices`]: camera, microphone and display capture
//! - [`PeerConnectionFactory`] / [`PeerConnection`]: the WebRTC engine
//!   (see the `webrtc-backend` feature)
//! - [`SignalingConnector`] / [`SignalingSocket`]: the room socket
//!   ([`WebSocketConnector`] in production)
//! - [`IceServerProvider`]: STUN/TURN servers for the session

mod config;
mod constants;
mod coordinator;
mod error;
mod event_bus;
mod events;
mod ice;
pub mod media;
pub mod negotiation;
pub mod peer;
mod session;
pub mod signaling;
pub mod surface;

#[cfg(feature = "webrtc-backend")]
pub mod webrtc_backend;

pub use config::MeetingConfig;
pub use coordinator::{CoordinatorDeps, MeshCoordinator};
pub use error::{CoordinatorError, MediaError, MeetingError, PeerError, SignalingError};
pub use event_bus::EventBus;
pub use events::{MeetingEvent, ScreenShareEvent};
pub use ice::{api_client, IceServerProvider, StaticIceServers};
pub use media::{
    DeviceInfo, DeviceKind, DisplayMediaConstraints, LocalMedia, LocalMediaState,
    MediaConstraints, MediaDevices, MediaStream, MediaTrack, NoMediaDevices, TrackKind,
    TrackSource,
};
pub use peer::{
    NegotiationState, PeerConnection, PeerConnectionConfig, PeerConnectionFactory,
    PeerConnectionState, PeerEvent, PeerEventKind, PeerEventSink, SenderId,
};
pub use session::{MeetingSnapshot, MeetingState, MeshSession};
pub use signaling::{
    CloseInfo, SignalingConnector, SignalingSocket, SignalingState, SocketEvent,
    WebSocketConnector,
};
pub use surface::{Tile, TileContent};
