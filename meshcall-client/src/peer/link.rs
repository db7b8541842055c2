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

use std::sync::Arc;

use meshcall_types::{IceCandidate, Participant};

use crate::media::{MediaStream, MediaTrack};
use crate::peer::connection::{NegotiationState, PeerConnection, PeerConnectionState, SenderId};

/// Everything the registry knows about one remote participant's connection.
pub struct PeerLink {
    pub(crate) peer_id: String,
    pub(crate) link_id: u64,
    pub(crate) connection: Arc<dyn PeerConnection>,
    pub(crate) negotiation: NegotiationState,
    pub(crate) connection_state: PeerConnectionState,
    pub(crate) audio_sender: SenderId,
    pub(crate) video_sender: SenderId,
    pub(crate) audio_track: Option<MediaTrack>,
    pub(crate) video_track: Option<MediaTrack>,
    /// Remote candidates received before the remote description.
    pub(crate) pending_candidates: Vec<IceCandidate>,
    pub(crate) remote_description_set: bool,
}

impl PeerLink {
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn link_id(&self) -> u64 {
        self.link_id
    }

    pub fn negotiation(&self) -> NegotiationState {
        self.negotiation
    }

    pub fn connection_state(&self) -> PeerConnectionState {
        self.connection_state
    }

    /// Track currently attached to the outgoing video sender.
    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.video_track.as_ref()
    }

    pub fn audio_track(&self) -> Option<&MediaTrack> {
        self.audio_track.as_ref()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn info(&self) -> PeerLinkInfo {
        PeerLinkInfo {
            peer_id: self.peer_id.clone(),
            link_id: self.link_id,
            negotiation: self.negotiation,
            connection_state: self.connection_state,
            audio_track: self.audio_track.clone(),
            video_track: self.video_track.clone(),
        }
    }
}

/// Cloneable view of a [`PeerLink`] for snapshots.
#[derive(Debug, Clone)]
pub struct PeerLinkInfo {
    pub peer_id: String,
    pub link_id: u64,
    pub negotiation: NegotiationState,
    pub connection_state: PeerConnectionState,
    pub audio_track: Option<MediaTrack>,
    pub video_track: Option<MediaTrack>,
}

/// Media received from one peer.
#[derive(Debug, Clone)]
pub struct RemoteStreamEntry {
    pub peer_id: String,
    pub stream: MediaStream,
    pub participant: Participant,
}
