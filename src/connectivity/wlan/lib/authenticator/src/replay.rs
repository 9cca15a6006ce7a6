// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

/// Number of transmitted replay counters a response may echo. A station may answer any of the
/// retransmissions of a message, so every counter sent since the last accepted response stays
/// valid.
pub const REPLAY_RING_LEN: usize = 4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Slot {
    counter: u64,
    valid: bool,
}

/// Replay counters of the EAPOL-Key frames sent to a single station.
#[derive(Debug, Default)]
pub struct ReplayCounterRing {
    next_counter: u64,
    slots: [Slot; REPLAY_RING_LEN],
    /// Highest counter seen in a station originated Request frame.
    last_request: Option<u64>,
}

impl ReplayCounterRing {
    /// Allocates the counter for the next transmitted frame and remembers it as valid.
    pub fn next(&mut self) -> u64 {
        self.next_counter += 1;
        for i in (1..REPLAY_RING_LEN).rev() {
            self.slots[i] = self.slots[i - 1];
        }
        self.slots[0] = Slot { counter: self.next_counter, valid: true };
        self.next_counter
    }

    /// Counter of the most recently transmitted frame.
    pub fn current(&self) -> u64 {
        self.next_counter
    }

    pub fn is_valid(&self, counter: u64) -> bool {
        self.slots.iter().any(|slot| slot.valid && slot.counter == counter)
    }

    /// Whether the counter belongs to one of the most recently transmitted frames, valid or not.
    pub fn was_sent(&self, counter: u64) -> bool {
        counter != 0 && self.slots.iter().any(|slot| slot.counter == counter)
    }

    /// Invalidates every outstanding counter once a response was accepted, so that replays of
    /// that response are rejected.
    pub fn mark_invalid(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.valid = false;
        }
    }

    /// Request frames carry the station's own counter which must increase strictly.
    pub fn accept_request(&mut self, counter: u64) -> bool {
        match self.last_request {
            Some(last) if counter <= last => false,
            _ => {
                self.last_request = Some(counter);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increase() {
        let mut ring = ReplayCounterRing::default();
        assert_eq!(ring.next(), 1);
        assert_eq!(ring.next(), 2);
        assert_eq!(ring.current(), 2);
    }

    #[test]
    fn retransmitted_counters_stay_valid() {
        let mut ring = ReplayCounterRing::default();
        for _ in 0..REPLAY_RING_LEN {
            ring.next();
        }
        assert!((1..=REPLAY_RING_LEN as u64).all(|c| ring.is_valid(c)));

        // The oldest counter drops out of the window.
        ring.next();
        assert!(!ring.is_valid(1));
        assert!(ring.is_valid(5));
        assert!(!ring.is_valid(6));
    }

    #[test]
    fn accepted_counter_cannot_be_reused() {
        let mut ring = ReplayCounterRing::default();
        let counter = ring.next();
        assert!(ring.is_valid(counter));
        ring.mark_invalid();
        assert!(!ring.is_valid(counter));
        assert!(ring.was_sent(counter));

        let counter = ring.next();
        assert!(ring.is_valid(counter));
        assert!(!ring.is_valid(counter - 1));
    }

    #[test]
    fn request_counters_strictly_increase() {
        let mut ring = ReplayCounterRing::default();
        assert!(ring.accept_request(7));
        assert!(!ring.accept_request(7));
        assert!(!ring.accept_request(3));
        assert!(ring.accept_request(8));
    }
}
