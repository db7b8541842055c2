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
 */

//! ICE server list: `GET /api/v1/ice-servers`.

use log::{debug, info};
use meshcall_types::IceServer;

use crate::error::ApiError;
use crate::{parse_json_response, MeetingApiClient};

pub const ICE_SERVERS_PATH: &str = "/api/v1/ice-servers";

impl MeetingApiClient {
    /// Fetch the STUN/TURN servers allocated for this session.
    ///
    /// The body is a bare JSON array of `{urls, username?, credential?}`.
    pub async fn ice_servers(&self) -> Result<Vec<IceServer>, ApiError> {
        debug!("Fetching ICE servers from {}{}", self.base_url(), ICE_SERVERS_PATH);
        let response = self.get(ICE_SERVERS_PATH).send().await?;
        let servers: Vec<IceServer> = parse_json_response(response).await?;
        info!(
            "Received {} ICE servers ({} relay)",
            servers.len(),
            servers.iter().filter(|s| s.is_relay()).count()
        );
        Ok(servers)
    }
}
