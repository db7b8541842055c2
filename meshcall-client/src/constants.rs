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

pub const EVENT_BUS_CAPACITY: usize = 256;
pub const COMMAND_CHANNEL_CAPACITY: usize = 32;

pub const DEFAULT_SIGNALING_URL: &str = "ws://localhost:8080/rooms";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8081";
pub const DEFAULT_ROOM: &str = "lobby";
pub const DEFAULT_DISPLAY_NAME: &str = "Guest";

pub const LOCAL_STREAM_ID: &str = "local";
