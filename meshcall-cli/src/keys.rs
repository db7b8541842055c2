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

//! Single-key controls read from stdin while in a meeting.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    ToggleAudio,
    ToggleVideo,
    ToggleScreenShare,
    Status,
    Leave,
    Help,
}

pub const HELP: &str = "m = mute/unmute, v = camera on/off, s = screen share, i = status, q = leave";

impl KeyCommand {
    /// Parse one line of input. Blank lines and unknown keys yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "m" | "mute" => Some(KeyCommand::ToggleAudio),
            "v" | "video" => Some(KeyCommand::ToggleVideo),
            "s" | "share" => Some(KeyCommand::ToggleScreenShare),
            "i" | "status" => Some(KeyCommand::Status),
            "q" | "quit" | "leave" => Some(KeyCommand::Leave),
            "h" | "?" | "help" => Some(KeyCommand::Help),
            _ => None,
        }
    }
}
