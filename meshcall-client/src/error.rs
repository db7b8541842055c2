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

//! Error types for each layer of the mesh client.
//!
//! Only [`MeetingError`] ever reaches the user as a terminal condition.
//! Media and per-peer errors are absorbed where they happen (view-only
//! mode, dropped peer) and only show up in logs and informational events.

use thiserror::Error;

/// Local capture failures. Never fatal: the meeting continues view-only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no audio or video input devices")]
    NoDevices,

    #[error("capture returned no video track")]
    NoVideoTrack,

    #[error("media backend error: {0}")]
    Backend(String),
}

/// Errors from the signaling socket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    #[error("failed to connect to {url}: {reason}")]
    Connect {
        url: String,
        reason: String,
        /// HTTP status when the server rejected the upgrade.
        status: Option<u16>,
    },

    #[error("signaling socket is not open")]
    NotOpen,

    #[error("failed to encode signaling message: {0}")]
    Encode(String),

    #[error("signaling send failed: {0}")]
    Send(String),
}

/// Per-peer negotiation and connection failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    #[error("no link for peer {0}")]
    NoLink(String),

    #[error("peer connection backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Signaling(#[from] SignalingError),
}

/// Terminal meeting conditions surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeetingError {
    /// The server closed the room; carries the server-supplied reason.
    #[error("the meeting was closed: {0}")]
    RoomClosed(String),

    /// The signaling socket closed abnormally.
    #[error("connection to the meeting was lost (code {code:?}): {reason}")]
    ConnectionLost { code: Option<u16>, reason: String },

    /// The server reported an error and then hung up.
    #[error("signaling error: {0}")]
    Signaling(String),
}

/// Lifecycle misuse and startup failures of [`MeshCoordinator`](crate::MeshCoordinator).
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("coordinator is already started")]
    AlreadyStarted,

    #[error("coordinator is not running")]
    NotRunning,

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
