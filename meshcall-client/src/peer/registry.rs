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

//! One map from remote participant id to its [`PeerLink`].
//!
//! The registry owns every link and every remote stream entry; removing a
//! link always removes its stream entry too. Callbacks from a link that
//! has since been replaced are recognised by their stale `link_id`.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};
use meshcall_types::{IceCandidate, OutboundMessage, Participant, SessionDescription};
use tokio::sync::mpsc;

use crate::error::PeerError;
use crate::media::{MediaStream, MediaTrack, TrackKind};
use crate::negotiation;
use crate::peer::connection::{
    NegotiationState, PeerConnection, PeerConnectionConfig, PeerConnectionFactory,
    PeerConnectionState, PeerEvent, PeerEventSink, SenderId,
};
use crate::peer::link::{PeerLink, RemoteStreamEntry};
use crate::signaling::SignalingChannel;

/// Candidates held per link while its remote description is unset.
pub const MAX_PENDING_CANDIDATES: usize = 64;

/// Local tracks to attach to a new link.
#[derive(Debug, Clone, Default)]
pub struct OutgoingTracks {
    pub audio: Option<MediaTrack>,
    pub video: Option<MediaTrack>,
}

pub struct PeerRegistry {
    factory: Arc<dyn PeerConnectionFactory>,
    config: PeerConnectionConfig,
    events: mpsc::UnboundedSender<PeerEvent>,
    links: BTreeMap<String, PeerLink>,
    remote_streams: BTreeMap<String, RemoteStreamEntry>,
    next_link_id: u64,
}

impl PeerRegistry {
    pub fn new(
        factory: Arc<dyn PeerConnectionFactory>,
        config: PeerConnectionConfig,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Self {
        Self {
            factory,
            config,
            events,
            links: BTreeMap::new(),
            remote_streams: BTreeMap::new(),
            next_link_id: 0,
        }
    }

    pub fn config(&self) -> &PeerConnectionConfig {
        &self.config
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.links.contains_key(peer_id)
    }

    pub fn link(&self, peer_id: &str) -> Option<&PeerLink> {
        self.links.get(peer_id)
    }

    /// Links ordered by peer id.
    pub fn links(&self) -> impl Iterator<Item = &PeerLink> {
        self.links.values()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn remote_stream(&self, peer_id: &str) -> Option<&RemoteStreamEntry> {
        self.remote_streams.get(peer_id)
    }

    pub fn remote_streams(&self) -> impl Iterator<Item = &RemoteStreamEntry> {
        self.remote_streams.values()
    }

    /// Whether `link_id` is the live generation for `peer_id`.
    pub fn is_current(&self, peer_id: &str, link_id: u64) -> bool {
        self.links
            .get(peer_id)
            .is_some_and(|link| link.link_id == link_id)
    }

    /// Create the link for `peer_id` unless one exists. Returns its generation.
    ///
    /// Audio and video sender slots are always added, empty in view-only
    /// mode, so remote media is still received and a later screen share can
    /// be swapped into the video slot.
    pub async fn create_link(
        &mut self,
        peer_id: &str,
        tracks: &OutgoingTracks,
    ) -> Result<u64, PeerError> {
        if let Some(link) = self.links.get(peer_id) {
            return Ok(link.link_id);
        }

        self.next_link_id += 1;
        let link_id = self.next_link_id;
        let sink = PeerEventSink::new(peer_id, link_id, self.events.clone());
        let connection = self.factory.create(peer_id, &self.config, sink).await?;

        let (audio_sender, video_sender) = match add_senders(connection.as_ref(), tracks).await {
            Ok(senders) => senders,
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    debug!("Closing half-built link to {peer_id}: {close_err}");
                }
                return Err(e);
            }
        };

        info!(
            "Created link {link_id} to {peer_id} (audio={}, video={})",
            tracks.audio.is_some(),
            tracks.video.as_ref().map(|t| t.id()).unwrap_or("none")
        );
        self.links.insert(
            peer_id.to_string(),
            PeerLink {
                peer_id: peer_id.to_string(),
                link_id,
                connection,
                negotiation: NegotiationState::New,
                connection_state: PeerConnectionState::New,
                audio_sender,
                video_sender,
                audio_track: tracks.audio.clone(),
                video_track: tracks.video.clone(),
                pending_candidates: Vec::new(),
                remote_description_set: false,
            },
        );
        Ok(link_id)
    }

    /// Create the link if needed and send an offer. Returns false when the
    /// link was already negotiating.
    pub async fn offer(
        &mut self,
        peer_id: &str,
        tracks: &OutgoingTracks,
        signaling: &SignalingChannel,
    ) -> Result<bool, PeerError> {
        self.create_link(peer_id, tracks).await?;
        let link = self.link_mut(peer_id)?;
        if link.negotiation != NegotiationState::New {
            debug!(
                "Not offering to {peer_id}: negotiation already {:?}",
                link.negotiation
            );
            return Ok(false);
        }

        let offer = link.connection.create_offer().await?;
        link.connection.set_local_description(offer.clone()).await?;
        link.negotiation = NegotiationState::HaveLocalOffer;
        signaling
            .send(&OutboundMessage::Offer {
                to: peer_id.to_string(),
                sdp: offer.sdp,
            })
            .await?;
        Ok(true)
    }

    /// Answer an offer, creating the link if needed. Returns false when the
    /// offer was dropped by the glare guard.
    pub async fn handle_offer(
        &mut self,
        local_id: &str,
        peer_id: &str,
        sdp: String,
        tracks: &OutgoingTracks,
        signaling: &SignalingChannel,
    ) -> Result<bool, PeerError> {
        self.create_link(peer_id, tracks).await?;
        let link = self.link_mut(peer_id)?;
        if link.negotiation == NegotiationState::HaveLocalOffer
            && negotiation::should_offer(local_id, peer_id)
        {
            warn!("Ignoring offer from {peer_id}: we hold the local offer for this pair");
            return Ok(false);
        }

        link.connection
            .set_remote_description(SessionDescription::offer(sdp))
            .await?;
        link.negotiation = NegotiationState::HaveRemoteOffer;
        link.remote_description_set = true;
        flush_candidates(link).await;

        let answer = link.connection.create_answer().await?;
        link.connection.set_local_description(answer.clone()).await?;
        link.negotiation = NegotiationState::Stable;
        signaling
            .send(&OutboundMessage::Answer {
                to: peer_id.to_string(),
                sdp: answer.sdp,
            })
            .await?;
        Ok(true)
    }

    /// Apply an answer. Answers for unknown peers, or for links that are not
    /// waiting for one, are stale and ignored.
    pub async fn handle_answer(&mut self, peer_id: &str, sdp: String) -> Result<bool, PeerError> {
        let Some(link) = self.links.get_mut(peer_id) else {
            info!("Ignoring answer from {peer_id}: no link");
            return Ok(false);
        };
        if link.negotiation != NegotiationState::HaveLocalOffer {
            warn!(
                "Ignoring answer from {peer_id}: negotiation is {:?}",
                link.negotiation
            );
            return Ok(false);
        }

        link.connection
            .set_remote_description(SessionDescription::answer(sdp))
            .await?;
        link.negotiation = NegotiationState::Stable;
        link.remote_description_set = true;
        flush_candidates(link).await;
        Ok(true)
    }

    /// Add a remote candidate. Dropped when there is no link; queued until
    /// the remote description is set, up to [`MAX_PENDING_CANDIDATES`].
    /// Returns whether it was accepted.
    pub async fn handle_candidate(&mut self, peer_id: &str, candidate: IceCandidate) -> bool {
        let Some(link) = self.links.get_mut(peer_id) else {
            debug!("Dropping candidate from {peer_id}: no link");
            return false;
        };
        if !link.remote_description_set {
            if link.pending_candidates.len() >= MAX_PENDING_CANDIDATES {
                warn!("Dropping candidate from {peer_id}: pending queue full");
                return false;
            }
            link.pending_candidates.push(candidate);
            return true;
        }
        if let Err(e) = link.connection.add_ice_candidate(candidate).await {
            warn!("Failed to add candidate from {peer_id}: {e}");
        }
        true
    }

    /// Record an engine state change. Returns false for stale links.
    pub fn set_connection_state(
        &mut self,
        peer_id: &str,
        link_id: u64,
        state: PeerConnectionState,
    ) -> bool {
        match self.links.get_mut(peer_id) {
            Some(link) if link.link_id == link_id => {
                debug!("Link {link_id} to {peer_id}: {} -> {state}", link.connection_state);
                link.connection_state = state;
                true
            }
            _ => false,
        }
    }

    /// Add a received track to the peer's stream entry, creating the entry
    /// on the first track. Returns whether anything changed.
    pub fn add_remote_track(
        &mut self,
        peer_id: &str,
        link_id: u64,
        participant: Participant,
        stream_id: &str,
        track: MediaTrack,
    ) -> bool {
        if !self.is_current(peer_id, link_id) {
            debug!("Dropping track from stale link {link_id} to {peer_id}");
            return false;
        }
        let entry = self
            .remote_streams
            .entry(peer_id.to_string())
            .or_insert_with(|| RemoteStreamEntry {
                peer_id: peer_id.to_string(),
                stream: MediaStream::new(stream_id),
                participant,
            });
        entry.stream.add_track(track)
    }

    /// Close and forget the link and its remote stream entry.
    pub async fn close_link(&mut self, peer_id: &str) -> bool {
        if let Some(entry) = self.remote_streams.remove(peer_id) {
            entry.stream.stop_all();
        }
        let Some(link) = self.links.remove(peer_id) else {
            return false;
        };
        info!("Closing link {} to {peer_id}", link.link_id);
        if let Err(e) = link.connection.close().await {
            warn!("Error closing link to {peer_id}: {e}");
        }
        true
    }

    pub async fn close_all(&mut self) {
        let peers: Vec<String> = self.links.keys().cloned().collect();
        for peer_id in peers {
            self.close_link(&peer_id).await;
        }
        for (_, entry) in std::mem::take(&mut self.remote_streams) {
            entry.stream.stop_all();
        }
    }

    /// Put `track` on the video sender of every live link. Returns the
    /// peers whose sender could not be updated.
    pub async fn replace_video_track(&mut self, track: Option<MediaTrack>) -> Vec<String> {
        let mut failed = Vec::new();
        for link in self.links.values_mut() {
            match link
                .connection
                .replace_track(link.video_sender, track.clone())
                .await
            {
                Ok(()) => link.video_track = track.clone(),
                Err(e) => {
                    warn!("Failed to replace video track for {}: {e}", link.peer_id);
                    failed.push(link.peer_id.clone());
                }
            }
        }
        failed
    }

    fn link_mut(&mut self, peer_id: &str) -> Result<&mut PeerLink, PeerError> {
        self.links
            .get_mut(peer_id)
            .ok_or_else(|| PeerError::NoLink(peer_id.to_string()))
    }
}

async fn add_senders(
    connection: &dyn PeerConnection,
    tracks: &OutgoingTracks,
) -> Result<(SenderId, SenderId), PeerError> {
    let audio = connection
        .add_transceiver(TrackKind::Audio, tracks.audio.clone())
        .await?;
    let video = connection
        .add_transceiver(TrackKind::Video, tracks.video.clone())
        .await?;
    Ok((audio, video))
}

async fn flush_candidates(link: &mut PeerLink) {
    if link.pending_candidates.is_empty() {
        return;
    }
    debug!(
        "Flushing {} queued candidates for {}",
        link.pending_candidates.len(),
        link.peer_id
    );
    for candidate in std::mem::take(&mut link.pending_candidates) {
        if let Err(e) = link.connection.add_ice_candidate(candidate).await {
            warn!("Failed to add queued candidate for {}: {e}", link.peer_id);
        }
    }
}
