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

//! Who sends the first offer.
//!
//! For any pair of participants the side with the lexicographically smaller
//! id offers and the other side answers. Both sides evaluate the same rule
//! independently, so exactly one offer is sent per pair without any extra
//! coordination messages. Ids are treated as opaque strings.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Offerer,
    Answerer,
}

/// The local side's role towards `remote_id`.
pub fn role_for(local_id: &str, remote_id: &str) -> Role {
    if local_id < remote_id {
        Role::Offerer
    } else {
        Role::Answerer
    }
}

pub fn should_offer(local_id: &str, remote_id: &str) -> bool {
    role_for(local_id, remote_id) == Role::Offerer
}
