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

//! Wire types shared between the meshcall client and the signaling backend.
//!
//! Everything here is plain serde data: no sockets, no runtime. The JSON
//! shapes match what the signaling server sends over the room WebSocket and
//! what the meeting REST API returns for ICE servers.

pub mod ice;
pub mod participant;
pub mod sdp;
pub mod signaling;

pub use ice::{IceCandidate, IceServer};
pub use participant::Participant;
pub use sdp::{SdpType, SessionDescription};
pub use signaling::{InboundMessage, OutboundMessage};

/// Close code sent by a peer that closed the socket normally.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code sent when an endpoint is going away (navigation, shutdown).
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Returns true for close codes that end a call without an error.
///
/// Everything that is not a normal or going-away close is treated as
/// abnormal, including a missing code (the stream ended without a close
/// frame).
pub fn is_clean_close(code: Option<u16>) -> bool {
    matches!(code, Some(CLOSE_NORMAL) | Some(CLOSE_GOING_AWAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_close_codes() {
        assert!(is_clean_close(Some(1000)));
        assert!(is_clean_close(Some(1001)));
        assert!(!is_clean_close(Some(1006)));
        assert!(!is_clean_close(Some(4000)));
        assert!(!is_clean_close(None));
    }
}
