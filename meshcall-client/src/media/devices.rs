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

//! Capture device access.
//!
//! [`MediaDevices`] is the seam between the coordinator and whatever can
//! capture media on this platform. [`NoMediaDevices`] reports no inputs,
//! which puts the session straight into view-only mode.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MediaError;
use crate::media::track::MediaStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    AudioInput,
    VideoInput,
    AudioOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    pub label: String,
}

impl DeviceInfo {
    pub fn new(device_id: impl Into<String>, kind: DeviceKind, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind,
            label: label.into(),
        }
    }
}

/// Which kinds of input to capture. Each is requested only if a matching
/// device was enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    /// Build constraints from an enumeration: audio iff a microphone exists,
    /// video iff a camera exists.
    pub fn from_devices(devices: &[DeviceInfo]) -> Self {
        Self {
            audio: devices.iter().any(|d| d.kind == DeviceKind::AudioInput),
            video: devices.iter().any(|d| d.kind == DeviceKind::VideoInput),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.audio && !self.video
    }
}

/// Options for display capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMediaConstraints {
    pub cursor_visible: bool,
    pub audio: bool,
}

impl Default for DisplayMediaConstraints {
    fn default() -> Self {
        Self {
            cursor_visible: true,
            audio: true,
        }
    }
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, MediaError>;

    /// Capture camera and/or microphone.
    async fn get_user_media(&self, constraints: MediaConstraints)
        -> Result<MediaStream, MediaError>;

    /// Capture a screen or window. The returned stream's video track ends
    /// when the user stops sharing from outside the application.
    async fn get_display_media(
        &self,
        constraints: DisplayMediaConstraints,
    ) -> Result<MediaStream, MediaError>;
}

/// A platform with no capture devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMediaDevices;

#[async_trait]
impl MediaDevices for NoMediaDevices {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, MediaError> {
        Ok(Vec::new())
    }

    async fn get_user_media(
        &self,
        _constraints: MediaConstraints,
    ) -> Result<MediaStream, MediaError> {
        Err(MediaError::NoDevices)
    }

    async fn get_display_media(
        &self,
        _constraints: DisplayMediaConstraints,
    ) -> Result<MediaStream, MediaError> {
        Err(MediaError::Backend("display capture is not available".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraints_follow_enumeration() {
        let devices = vec![
            DeviceInfo::new("mic0", DeviceKind::AudioInput, "Built-in Microphone"),
            DeviceInfo::new("spk0", DeviceKind::AudioOutput, "Speakers"),
        ];
        let c = MediaConstraints::from_devices(&devices);
        assert!(c.audio);
        assert!(!c.video);

        let c = MediaConstraints::from_devices(&[DeviceInfo::new(
            "cam0",
            DeviceKind::VideoInput,
            "FaceTime HD",
        )]);
        assert!(!c.audio);
        assert!(c.video);

        assert!(MediaConstraints::from_devices(&[]).is_empty());
    }

    #[test]
    fn test_display_constraints_default() {
        let c = DisplayMediaConstraints::default();
        assert!(c.cursor_visible);
        assert!(c.audio);
    }
}
