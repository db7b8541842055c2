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

//! Shared media track handles.
//!
//! A [`MediaTrack`] is a reference to one capture (or one remote source).
//! Clones share the same underlying track: the `enabled` flag and the
//! `ended` signal are visible through every clone, which is how muting one
//! track mutes it on every peer link at once.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Where a track's media comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
    /// Received from a peer.
    Remote,
}

type Backend = Arc<dyn Any + Send + Sync>;

struct TrackInner {
    id: String,
    kind: TrackKind,
    source: TrackSource,
    enabled: AtomicBool,
    ended: watch::Sender<bool>,
    backend: Option<Backend>,
}

#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("source", &self.inner.source)
            .field("enabled", &self.is_enabled())
            .field("ended", &self.is_ended())
            .finish()
    }
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind, source: TrackSource) -> Self {
        Self::build(id.into(), kind, source, None)
    }

    /// Create a track that carries an engine-specific handle, e.g. the local
    /// RTP track a WebRTC backend writes samples into.
    pub fn with_backend(
        id: impl Into<String>,
        kind: TrackKind,
        source: TrackSource,
        backend: Backend,
    ) -> Self {
        Self::build(id.into(), kind, source, Some(backend))
    }

    fn build(id: String, kind: TrackKind, source: TrackSource, backend: Option<Backend>) -> Self {
        let (ended, _) = watch::channel(false);
        Self {
            inner: Arc::new(TrackInner {
                id,
                kind,
                source,
                enabled: AtomicBool::new(true),
                ended,
                backend,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn source(&self) -> TrackSource {
        self.inner.source
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Disabled tracks stay attached to their senders and keep their
    /// negotiated slot; the backend sends silence or black frames.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_ended(&self) -> bool {
        *self.inner.ended.borrow()
    }

    /// End the track. Idempotent; wakes every [`ended_signal`](Self::ended_signal) receiver.
    pub fn stop(&self) {
        self.inner.ended.send_if_modified(|ended| {
            if *ended {
                false
            } else {
                *ended = true;
                true
            }
        });
    }

    /// Receiver that flips to `true` when the track ends, whether stopped
    /// locally or by the capture source (e.g. the OS "stop sharing" button).
    pub fn ended_signal(&self) -> watch::Receiver<bool> {
        self.inner.ended.subscribe()
    }

    /// The engine handle, if it has the expected type.
    pub fn backend<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner
            .backend
            .clone()
            .and_then(|b| b.downcast::<T>().ok())
    }

    /// True if both handles refer to the same underlying track.
    pub fn ptr_eq(a: &MediaTrack, b: &MediaTrack) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

/// An ordered set of tracks travelling together (one capture, or everything
/// received from one peer).
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: Vec::new(),
        }
    }

    pub fn with_tracks(id: impl Into<String>, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// Add a track unless a track with the same id is already present.
    /// Returns whether the stream changed.
    pub fn add_track(&mut self, track: MediaTrack) -> bool {
        if self.tracks.iter().any(|t| t.id() == track.id()) {
            return false;
        }
        self.tracks.push(track);
        true
    }

    pub fn first_of(&self, kind: TrackKind) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Whether a renderer should show video for this stream.
    pub fn has_enabled_video(&self) -> bool {
        self.tracks
            .iter()
            .any(|t| t.kind() == TrackKind::Video && t.is_enabled() && !t.is_ended())
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_enabled_flag() {
        let track = MediaTrack::new("mic", TrackKind::Audio, TrackSource::Microphone);
        let on_link_a = track.clone();
        let on_link_b = track.clone();

        track.set_enabled(false);
        assert!(!on_link_a.is_enabled());
        assert!(!on_link_b.is_enabled());
        assert!(MediaTrack::ptr_eq(&on_link_a, &on_link_b));
    }

    #[test]
    fn test_same_id_is_not_same_track() {
        let a = MediaTrack::new("t", TrackKind::Video, TrackSource::Camera);
        let b = MediaTrack::new("t", TrackKind::Video, TrackSource::Camera);
        assert!(!MediaTrack::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_stop_wakes_ended_signal() {
        let track = MediaTrack::new("screen", TrackKind::Video, TrackSource::Screen);
        let mut signal = track.ended_signal();
        assert!(!track.is_ended());

        let stopper = track.clone();
        tokio::spawn(async move { stopper.stop() });

        signal.wait_for(|ended| *ended).await.unwrap();
        assert!(track.is_ended());
        track.stop();
        assert!(track.is_ended());
    }

    #[test]
    fn test_has_enabled_video() {
        let cam = MediaTrack::new("cam", TrackKind::Video, TrackSource::Camera);
        let mic = MediaTrack::new("mic", TrackKind::Audio, TrackSource::Microphone);
        let mut stream = MediaStream::new("local");
        assert!(!stream.has_enabled_video());

        assert!(stream.add_track(mic));
        assert!(!stream.has_enabled_video());

        assert!(stream.add_track(cam.clone()));
        assert!(!stream.add_track(cam.clone()));
        assert!(stream.has_enabled_video());

        cam.set_enabled(false);
        assert!(!stream.has_enabled_video());
        cam.set_enabled(true);
        cam.stop();
        assert!(!stream.has_enabled_video());
    }

    #[test]
    fn test_backend_downcast() {
        let track = MediaTrack::with_backend(
            "cam",
            TrackKind::Video,
            TrackSource::Camera,
            Arc::new(42u32),
        );
        assert_eq!(track.backend::<u32>().as_deref(), Some(&42));
        assert!(track.backend::<String>().is_none());
        assert!(MediaTrack::new("x", TrackKind::Audio, TrackSource::Remote)
            .backend::<u32>()
            .is_none());
    }
}
