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

//! Broadcast channel for [`MeetingEvent`]s.
//!
//! Each coordinator owns one bus. Emitting never blocks: when a slow
//! subscriber lets the channel fill up, the oldest event is dropped.
//!
//! # Example
//!
//! ```
//! use meshcall_client::{EventBus, MeetingEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//! bus.emit(MeetingEvent::Left);
//! assert!(matches!(rx.recv().await, Ok(MeetingEvent::Left)));
//! # }
//! ```

use async_broadcast::{broadcast, InactiveReceiver, Receiver, Sender};

use crate::constants::EVENT_BUS_CAPACITY;
use crate::events::MeetingEvent;

#[derive(Clone)]
pub struct EventBus {
    sender: Sender<MeetingEvent>,
    // Keeps the channel open while nobody is subscribed.
    _keepalive: InactiveReceiver<MeetingEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (mut sender, receiver) = broadcast(capacity);
        sender.set_overflow(true);
        Self {
            sender,
            _keepalive: receiver.deactivate(),
        }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> Receiver<MeetingEvent> {
        self.sender.new_receiver()
    }

    pub fn emit(&self, event: MeetingEvent) {
        let _ = self.sender.try_broadcast(event);
    }

    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }
}
