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

//! JSON messages carried over the room signaling socket.
//!
//! Every frame is a JSON object with a `type` tag in snake_case. Inbound
//! frames with an unrecognised `type` decode to [`InboundMessage::Unknown`]
//! so newer servers can add message types without breaking older clients.

use serde::{Deserialize, Serialize};

use crate::ice::IceCandidate;
use crate::participant::Participant;

/// Messages pushed by the signaling server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Sent once after the socket opens: our own id and the current roster.
    Joined {
        participant_id: String,
        #[serde(default)]
        participants: Vec<Participant>,
    },
    PeerJoined {
        participant: Participant,
    },
    PeerLeft {
        participant_id: String,
    },
    Offer {
        from: String,
        sdp: String,
    },
    Answer {
        from: String,
        sdp: String,
    },
    Candidate {
        from: String,
        candidate: IceCandidate,
    },
    RoomClosed {
        #[serde(default)]
        reason: String,
    },
    Error {
        #[serde(default)]
        code: String,
        #[serde(default)]
        message: String,
    },
    /// Any message type this client does not understand.
    #[serde(skip)]
    Unknown(String),
}

const KNOWN_INBOUND: &[&str] = &[
    "joined",
    "peer_joined",
    "peer_left",
    "offer",
    "answer",
    "candidate",
    "room_closed",
    "error",
];

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

impl InboundMessage {
    /// Decode a text frame.
    ///
    /// Unknown `type` values are not an error; they produce
    /// [`InboundMessage::Unknown`]. Malformed JSON, a missing `type`, or a
    /// known type with missing fields is an error.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(text)?;
        if !KNOWN_INBOUND.contains(&envelope.kind.as_str()) {
            return Ok(InboundMessage::Unknown(envelope.kind));
        }
        serde_json::from_str(text)
    }

    /// The `type` tag of this message.
    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::Joined { .. } => "joined",
            InboundMessage::PeerJoined { .. } => "peer_joined",
            InboundMessage::PeerLeft { .. } => "peer_left",
            InboundMessage::Offer { .. } => "offer",
            InboundMessage::Answer { .. } => "answer",
            InboundMessage::Candidate { .. } => "candidate",
            InboundMessage::RoomClosed { .. } => "room_closed",
            InboundMessage::Error { .. } => "error",
            InboundMessage::Unknown(kind) => kind,
        }
    }
}

/// Messages this client sends to the signaling server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Offer { to: String, sdp: String },
    Answer { to: String, sdp: String },
    Candidate { to: String, candidate: IceCandidate },
    Leave {},
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The peer this message is addressed to, if any.
    pub fn recipient(&self) -> Option<&str> {
        match self {
            OutboundMessage::Offer { to, .. }
            | OutboundMessage::Answer { to, .. }
            | OutboundMessage::Candidate { to, .. } => Some(to),
            OutboundMessage::Leave {} => None,
        }
    }
}
