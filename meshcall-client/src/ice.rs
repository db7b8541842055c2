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

//! Where the session's ICE servers come from.

use async_trait::async_trait;
use meshcall_meeting_client::{AuthMode, MeetingApiClient};
use meshcall_types::IceServer;

use crate::config::MeetingConfig;

/// Fetched once per join attempt.
#[async_trait]
pub trait IceServerProvider: Send + Sync {
    async fn ice_servers(&self) -> anyhow::Result<Vec<IceServer>>;
}

#[async_trait]
impl IceServerProvider for MeetingApiClient {
    async fn ice_servers(&self) -> anyhow::Result<Vec<IceServer>> {
        Ok(MeetingApiClient::ice_servers(self).await?)
    }
}

/// A fixed list, for deployments without a meeting API.
#[derive(Debug, Clone, Default)]
pub struct StaticIceServers(pub Vec<IceServer>);

#[async_trait]
impl IceServerProvider for StaticIceServers {
    async fn ice_servers(&self) -> anyhow::Result<Vec<IceServer>> {
        Ok(self.0.clone())
    }
}

/// Meeting API client for the configured backend.
pub fn api_client(config: &MeetingConfig) -> MeetingApiClient {
    let auth = match &config.api_token {
        Some(token) => AuthMode::Bearer(token.clone()),
        None => AuthMode::Cookie,
    };
    MeetingApiClient::new(&config.api_base_url, auth)
}
