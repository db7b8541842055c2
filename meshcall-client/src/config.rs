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

//! Meeting configuration.
//!
//! Loaded from a YAML file named by `MESHCALL_CONFIG_PATH`, or else from
//! individual environment variables with defaults. The CLI overlays its
//! flags on top.

use std::fs;

use anyhow::{anyhow, Context};
use meshcall_types::IceServer;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_DISPLAY_NAME, DEFAULT_ROOM, DEFAULT_SIGNALING_URL,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingConfig {
    /// Base WebSocket URL; the room id is appended as a path segment.
    pub signaling_url: String,
    pub room: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Meeting REST API used for the ICE server list.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    /// Used when the ICE server fetch fails.
    #[serde(default = "IceServer::public_stun")]
    pub fallback_ice_servers: Vec<IceServer>,
}

fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            signaling_url: DEFAULT_SIGNALING_URL.to_string(),
            room: DEFAULT_ROOM.to_string(),
            display_name: default_display_name(),
            api_base_url: default_api_base_url(),
            api_token: None,
            fallback_ice_servers: IceServer::public_stun(),
        }
    }
}

impl MeetingConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading config file {path}"))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: MeetingConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env_or_default() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through `lookup` (normally the process
    /// environment).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        // Try to load from config file first
        if let Some(path) = lookup("MESHCALL_CONFIG_PATH") {
            return Self::from_file(&path);
        }

        let defaults = Self::default();
        let fallback_ice_servers = match lookup("FALLBACK_STUN_URLS") {
            Some(urls) => urls
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(IceServer::stun)
                .collect(),
            None => defaults.fallback_ice_servers,
        };

        let config = Self {
            signaling_url: lookup("SIGNALING_URL").unwrap_or(defaults.signaling_url),
            room: lookup("ROOM").unwrap_or(defaults.room),
            display_name: lookup("DISPLAY_NAME").unwrap_or(defaults.display_name),
            api_base_url: lookup("API_BASE_URL").unwrap_or(defaults.api_base_url),
            api_token: lookup("API_TOKEN").filter(|t| !t.is_empty()),
            fallback_ice_servers,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.room.trim().is_empty() {
            return Err(anyhow!("room must not be empty"));
        }
        self.room_url().map(|_| ())
    }

    /// The signaling URL for this room, e.g.
    /// `ws://localhost:8080/rooms/standup?name=Ada`.
    pub fn room_url(&self) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.signaling_url)
            .map_err(|e| anyhow!("Invalid signaling URL '{}': {e}", self.signaling_url))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => return Err(anyhow!("Signaling URL must be ws:// or wss://, got {other}")),
        }
        url.path_segments_mut()
            .map_err(|_| anyhow!("Signaling URL cannot be a base: {}", self.signaling_url))?
            .pop_if_empty()
            .push(&self.room);
        url.query_pairs_mut()
            .append_pair("name", &self.display_name);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_empty_environment() {
        let config = MeetingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, MeetingConfig::default());
        assert!(!config.fallback_ice_servers.is_empty());
    }

    #[test]
    fn test_environment_overrides() {
        let config = MeetingConfig::from_lookup(lookup(&[
            ("SIGNALING_URL", "wss://signal.example.com/rooms/"),
            ("ROOM", "standup"),
            ("DISPLAY_NAME", "Ada Lovelace"),
            ("API_TOKEN", ""),
            ("FALLBACK_STUN_URLS", "stun:a:3478, stun:b:3478,"),
        ]))
        .unwrap();
        assert_eq!(config.room, "standup");
        assert_eq!(config.api_token, None);
        assert_eq!(config.fallback_ice_servers.len(), 2);
        assert_eq!(
            config.room_url().unwrap().as_str(),
            "wss://signal.example.com/rooms/standup?name=Ada+Lovelace"
        );
    }

    #[test]
    fn test_yaml_with_defaults() {
        let config = MeetingConfig::from_yaml(
            "signaling_url: ws://localhost:9000\nroom: design-review\napi_token: abc\n",
        )
        .unwrap();
        assert_eq!(config.display_name, DEFAULT_DISPLAY_NAME);
        assert_eq!(config.api_token.as_deref(), Some("abc"));
        assert_eq!(config.fallback_ice_servers, IceServer::public_stun());
        assert_eq!(
            config.room_url().unwrap().as_str(),
            "ws://localhost:9000/design-review?name=Guest"
        );
    }

    #[test]
    fn test_yaml_ice_urls_string_or_list() {
        let config = MeetingConfig::from_yaml(
            r#"
signaling_url: ws://localhost:9000
room: r
fallback_ice_servers:
  - urls: stun:stun.example.com:3478
  - urls: [turn:turn.example.com:3478]
    username: u
    credential: p
"#,
        )
        .unwrap();
        assert_eq!(config.fallback_ice_servers.len(), 2);
        assert!(config.fallback_ice_servers[1].is_relay());
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        assert!(MeetingConfig::from_yaml("signaling_url: http://x\nroom: r\n").is_err());
        assert!(MeetingConfig::from_yaml("signaling_url: ws://x\nroom: ''\n").is_err());
        assert!(MeetingConfig::from_yaml("room: r\n").is_err());
    }
}
