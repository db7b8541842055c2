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
 */

//! REST client for the meshcall meeting backend.
//!
//! The mesh coordinator needs exactly one thing from the backend before it
//! can open peer connections: the ICE server list for the session. This
//! crate wraps that call (and the session check the UI runs before joining)
//! on top of [`reqwest`].
//!
//! # Example
//!
//! ```no_run
//! use meshcall_meeting_client::{MeetingApiClient, AuthMode};
//!
//! # async fn example() -> Result<(), meshcall_meeting_client::ApiError> {
//! let client = MeetingApiClient::new(
//!     "http://localhost:8081",
//!     AuthMode::Bearer("eyJ...".to_string()),
//! );
//!
//! let servers = client.ice_servers().await?;
//! println!("{} ICE servers", servers.len());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod ice;

pub use error::ApiError;

use reqwest::Client;

/// How the client authenticates with the meeting API.
#[derive(Debug, Clone)]
pub enum AuthMode {
    /// Rely on cookies set by a previous login.
    Cookie,
    /// Attach `Authorization: Bearer <token>` to every request.
    Bearer(String),
}

/// A typed REST client for the meeting API.
#[derive(Debug, Clone)]
pub struct MeetingApiClient {
    base_url: String,
    auth: AuthMode,
    http: Client,
}

impl MeetingApiClient {
    /// Create a new client pointing at the given base URL, e.g.
    /// `"http://localhost:8081"`.
    pub fn new(base_url: &str, auth: AuthMode) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            http: Client::new(),
        }
    }

    /// Update the bearer token (e.g. after a token refresh).
    pub fn set_bearer_token(&mut self, token: String) {
        self.auth = AuthMode::Bearer(token);
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a GET request with auth applied.
    pub(crate) fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.apply_auth(self.http.get(self.url(path)))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            AuthMode::Cookie => builder,
            AuthMode::Bearer(token) => {
                builder.header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"))
            }
        }
    }
}

/// Parse a JSON body on success, mapping HTTP errors to [`ApiError`].
pub(crate) async fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status().as_u16();
    match status {
        200..=299 => Ok(response.json().await?),
        _ => Err(error_for_status(status, response).await),
    }
}

/// Parse a response where we only care about the status code, not the body.
pub(crate) async fn parse_status_only(response: reqwest::Response) -> Result<(), ApiError> {
    let status = response.status().as_u16();
    match status {
        200..=299 => Ok(()),
        _ => Err(error_for_status(status, response).await),
    }
}

async fn error_for_status(status: u16, response: reqwest::Response) -> ApiError {
    match status {
        401 => ApiError::NotAuthenticated,
        403 => ApiError::Forbidden(response.text().await.unwrap_or_default()),
        404 => ApiError::NotFound(response.text().await.unwrap_or_default()),
        _ => ApiError::ServerError {
            status,
            body: response.text().await.unwrap_or_default(),
        },
    }
}
