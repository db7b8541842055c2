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

//! Framework-agnostic events published by the mesh coordinator.
//!
//! Any UI (or the CLI) subscribes through
//! [`MeshCoordinator::subscribe`](crate::MeshCoordinator::subscribe) and
//! renders from these.

use meshcall_types::Participant;

use crate::error::MeetingError;
use crate::media::LocalMediaState;
use crate::peer::PeerConnectionState;
use crate::signaling::SignalingState;
use crate::surface::Tile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenShareEvent {
    Started,
    Stopped,
    /// The capture source ended the share (e.g. the OS "stop sharing" control).
    EndedBySource,
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum MeetingEvent {
    // === Signaling ===
    SignalingStateChanged(SignalingState),

    /// The server assigned our id and sent the current roster.
    Joined {
        participant_id: String,
        participants: Vec<Participant>,
    },

    /// Non-fatal `error` frame from the server.
    ServerError { code: String, message: String },

    /// The ICE server fetch failed and the public STUN list is in use; relay
    /// (TURN) connectivity is unavailable for this session.
    IceServersFallback { reason: String },

    // === Roster ===
    ParticipantJoined(Participant),
    ParticipantLeft(String),

    // === Peers ===
    PeerConnectionStateChanged {
        peer_id: String,
        state: PeerConnectionState,
    },

    /// A peer's link failed or could not be negotiated and was removed.
    PeerDropped { peer_id: String, reason: String },

    RemoteStreamUpdated { peer_id: String, stream_id: String },
    RemoteStreamRemoved(String),

    // === Local media ===
    LocalMediaChanged(LocalMediaState),
    ScreenShareStateChange(ScreenShareEvent),

    // === Surface ===
    TilesChanged(Vec<Tile>),

    // === Lifecycle ===
    /// The meeting ended with a user-visible error. Terminal.
    MeetingEnded(MeetingError),

    /// The meeting ended without an error. Terminal.
    Left,
}

impl MeetingEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MeetingEvent::MeetingEnded(_) | MeetingEvent::Left)
    }
}
