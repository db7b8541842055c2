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

//! ICE server descriptors and trickled ICE candidates.

use serde::{Deserialize, Deserializer, Serialize};

/// Public STUN servers used when the ICE server endpoint is unreachable.
pub const DEFAULT_STUN_URLS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

/// A STUN or TURN server entry, `{urls, username?, credential?}`.
///
/// The backend sends `urls` either as a single string or as a list; both
/// forms are accepted and normalized to a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    #[serde(deserialize_with = "one_or_many")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    /// True if any of the urls points at a TURN relay.
    pub fn is_relay(&self) -> bool {
        self.urls
            .iter()
            .any(|u| u.starts_with("turn:") || u.starts_with("turns:"))
    }

    /// The STUN-only list used as a degraded fallback.
    pub fn public_stun() -> Vec<IceServer> {
        DEFAULT_STUN_URLS.iter().map(|u| IceServer::stun(*u)).collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(url) => vec![url],
        OneOrMany::Many(urls) => urls,
    })
}

/// A trickled ICE candidate in the browser's `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_accepts_string_or_list() {
        let single: IceServer = serde_json::from_str(r#"{"urls":"stun:a:3478"}"#).unwrap();
        assert_eq!(single.urls, vec!["stun:a:3478".to_string()]);
        assert!(single.username.is_none());

        let many: IceServer = serde_json::from_str(
            r#"{"urls":["turn:b:3478","turns:b:5349"],"username":"u","credential":"c"}"#,
        )
        .unwrap();
        assert_eq!(many.urls.len(), 2);
        assert_eq!(many.username.as_deref(), Some("u"));
        assert!(many.is_relay());
    }

    #[test]
    fn test_public_stun_has_no_relay() {
        let servers = IceServer::public_stun();
        assert!(!servers.is_empty());
        assert!(servers.iter().all(|s| !s.is_relay()));
    }

    #[test]
    fn test_candidate_uses_browser_field_names() {
        let json = r#"{"candidate":"candidate:1 1 udp 2122260223 10.0.0.2 5000 typ host","sdpMid":"0","sdpMLineIndex":0}"#;
        let c: IceCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(c.sdp_mid.as_deref(), Some("0"));
        assert_eq!(c.sdp_m_line_index, Some(0));

        let out = serde_json::to_value(&c).unwrap();
        assert_eq!(out["sdpMLineIndex"], 0);
        assert!(out.get("usernameFragment").is_none());
    }
}
