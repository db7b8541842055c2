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

//! Local capture state for one meeting.
//!
//! Acquisition never fails: when devices are missing or permission is
//! denied the session continues in view-only mode with no local tracks.
//! Mute and camera-off only flip the `enabled` flag of the existing
//! tracks, so they never cause renegotiation.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::constants::LOCAL_STREAM_ID;
use crate::error::MediaError;
use crate::media::devices::{DisplayMediaConstraints, MediaConstraints, MediaDevices};
use crate::media::track::{MediaStream, MediaTrack, TrackKind};

/// Snapshot of the local media controls.
#[derive(Debug, Clone)]
pub struct LocalMediaState {
    pub stream: MediaStream,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub screen_share_active: bool,
    /// Capture failed or no devices exist; no local tracks are sent.
    pub view_only: bool,
}

pub struct LocalMedia {
    devices: Arc<dyn MediaDevices>,
    stream: MediaStream,
    audio: Option<MediaTrack>,
    camera: Option<MediaTrack>,
    screen: Option<MediaStream>,
    view_only: bool,
}

impl LocalMedia {
    /// Enumerate devices and capture whatever exists.
    pub async fn acquire(devices: Arc<dyn MediaDevices>) -> Self {
        match Self::capture(devices.as_ref()).await {
            Ok(stream) => {
                let audio = stream.first_of(TrackKind::Audio).cloned();
                let camera = stream.first_of(TrackKind::Video).cloned();
                info!(
                    "Local media acquired: audio={} video={}",
                    audio.is_some(),
                    camera.is_some()
                );
                Self {
                    devices,
                    stream,
                    audio,
                    camera,
                    screen: None,
                    view_only: false,
                }
            }
            Err(e) => {
                warn!("Local media unavailable, joining view-only: {e}");
                Self::view_only(devices)
            }
        }
    }

    /// A session that sends no media.
    pub fn view_only(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            stream: MediaStream::new(LOCAL_STREAM_ID),
            audio: None,
            camera: None,
            screen: None,
            view_only: true,
        }
    }

    async fn capture(devices: &dyn MediaDevices) -> Result<MediaStream, MediaError> {
        let found = devices.enumerate_devices().await?;
        let constraints = MediaConstraints::from_devices(&found);
        debug!("Enumerated {} devices, requesting {constraints:?}", found.len());
        if constraints.is_empty() {
            return Err(MediaError::NoDevices);
        }
        devices.get_user_media(constraints).await
    }

    pub fn is_view_only(&self) -> bool {
        self.view_only
    }

    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    pub fn audio_track(&self) -> Option<&MediaTrack> {
        self.audio.as_ref()
    }

    pub fn camera_track(&self) -> Option<&MediaTrack> {
        self.camera.as_ref()
    }

    pub fn screen_track(&self) -> Option<&MediaTrack> {
        self.screen
            .as_ref()
            .and_then(|s| s.first_of(TrackKind::Video))
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio.as_ref().is_some_and(|t| t.is_enabled())
    }

    pub fn video_enabled(&self) -> bool {
        self.camera.as_ref().is_some_and(|t| t.is_enabled())
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.screen.is_some()
    }

    /// The track every video sender should carry right now: the screen
    /// while sharing, otherwise the camera.
    pub fn outgoing_video(&self) -> Option<MediaTrack> {
        self.screen_track().or(self.camera.as_ref()).cloned()
    }

    /// Stream shown on the local tile.
    pub fn preview_stream(&self) -> &MediaStream {
        self.screen.as_ref().unwrap_or(&self.stream)
    }

    /// Flip the microphone's `enabled` flag. Returns the new state; stays
    /// `false` without a microphone.
    pub fn toggle_audio(&mut self) -> bool {
        match &self.audio {
            Some(track) => {
                track.set_enabled(!track.is_enabled());
                track.is_enabled()
            }
            None => false,
        }
    }

    /// Flip the camera's `enabled` flag. Returns the new state; stays
    /// `false` without a camera.
    pub fn toggle_video(&mut self) -> bool {
        match &self.camera {
            Some(track) => {
                track.set_enabled(!track.is_enabled());
                track.is_enabled()
            }
            None => false,
        }
    }

    /// Start display capture. Returns the screen track to put on every
    /// video sender.
    pub async fn start_screen_share(&mut self) -> Result<MediaTrack, MediaError> {
        if let Some(track) = self.screen_track() {
            return Ok(track.clone());
        }
        let stream = self
            .devices
            .get_display_media(DisplayMediaConstraints::default())
            .await?;
        let Some(track) = stream.first_of(TrackKind::Video).cloned() else {
            stream.stop_all();
            return Err(MediaError::NoVideoTrack);
        };
        info!("Screen share started: track {}", track.id());
        self.screen = Some(stream);
        Ok(track)
    }

    /// Stop display capture. Returns the camera track to revert the video
    /// senders to (`None` without a camera).
    pub fn stop_screen_share(&mut self) -> Option<MediaTrack> {
        if let Some(stream) = self.screen.take() {
            stream.stop_all();
            info!("Screen share stopped");
        }
        self.camera.clone()
    }

    /// True while sharing if the capture source ended the screen track.
    pub fn screen_share_ended(&self) -> bool {
        self.screen_track().is_some_and(|t| t.is_ended())
    }

    /// Watch for the screen track ending while sharing.
    pub fn screen_ended_signal(&self) -> Option<watch::Receiver<bool>> {
        self.screen_track().map(|t| t.ended_signal())
    }

    /// Stop every local track.
    pub fn stop_all(&mut self) {
        if let Some(stream) = self.screen.take() {
            stream.stop_all();
        }
        self.stream.stop_all();
    }

    pub fn state(&self) -> LocalMediaState {
        LocalMediaState {
            stream: self.stream.clone(),
            audio_enabled: self.audio_enabled(),
            video_enabled: self.video_enabled(),
            screen_share_active: self.is_screen_sharing(),
            view_only: self.view_only,
        }
    }
}
