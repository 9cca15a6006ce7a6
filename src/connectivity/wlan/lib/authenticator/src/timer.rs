// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::mac::MacAddr;
use std::collections::HashMap;
use std::time::Duration;

#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone)]
pub struct EventId(pub u64);

/// A scheduler to schedule and cancel timeouts. The owner of the authenticator calls
/// `Authenticator::on_timeout` with the returned ID once the duration elapsed.
pub trait Scheduler {
    /// Requests to schedule an event. Returns a unique ID used to cancel the scheduled event.
    fn schedule(&mut self, after: Duration) -> EventId;
    /// Cancels a previously scheduled event.
    fn cancel(&mut self, id: EventId);
}

/// Timeouts driving the authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// EAPOL-Key retransmission for a station's pairwise or group key handshake.
    EapolRetransmit { addr: MacAddr, generation: u64 },
    GroupRekey,
    GmkRekey,
    PtkRekey { addr: MacAddr, generation: u64 },
    FtPullTimeout { addr: MacAddr, nonce: [u8; 16] },
    CountermeasuresEnd,
    /// Window in which a second MIC failure activates countermeasures.
    MicFailureWindow,
}

/// A timer to schedule and cancel timeouts and retrieve triggered events.
pub struct Timer<E> {
    events: HashMap<EventId, E>,
    scheduler: Box<dyn Scheduler>,
}

impl<E> Timer<E> {
    pub fn new(scheduler: Box<dyn Scheduler>) -> Self {
        Self { events: HashMap::default(), scheduler }
    }

    pub fn triggered(&mut self, event_id: &EventId) -> Option<E> {
        self.events.remove(event_id)
    }

    pub fn schedule_after(&mut self, after: Duration, event: E) -> EventId {
        let event_id = self.scheduler.schedule(after);
        self.events.insert(event_id, event);
        event_id
    }

    pub fn cancel_event(&mut self, event_id: EventId) {
        if self.events.remove(&event_id).is_some() {
            self.scheduler.cancel(event_id);
        }
    }

    pub fn cancel_all(&mut self) {
        for event_id in self.events.keys() {
            self.scheduler.cancel(*event_id);
        }
        self.events.clear();
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }
}

impl Timer<TimerEvent> {
    /// Cancels every event matching the predicate.
    pub fn cancel_where<F: Fn(&TimerEvent) -> bool>(&mut self, pred: F) {
        let ids: Vec<EventId> =
            self.events.iter().filter(|(_, e)| pred(e)).map(|(id, _)| *id).collect();
        for id in ids {
            self.cancel_event(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::FakeScheduler;

    #[test]
    fn schedule_cancel_event() {
        #[derive(PartialEq, Eq, Debug, Hash)]
        struct FooEvent(u8);

        let fake_scheduler = FakeScheduler::new();

        // Verify event triggers no more than once.
        let mut timer = Timer::<FooEvent>::new(Box::new(fake_scheduler.clone()));
        let deadline = Duration::from_nanos(5);
        let event_id = timer.schedule_after(deadline, FooEvent(8));
        assert_eq!(timer.triggered(&event_id), Some(FooEvent(8)));
        assert_eq!(timer.triggered(&event_id), None);

        // Verify event does not trigger if it was canceled.
        let event_id = timer.schedule_after(deadline, FooEvent(9));
        timer.cancel_event(event_id);
        assert_eq!(timer.triggered(&event_id), None);
        assert!(fake_scheduler.canceled().contains(&event_id));

        // Verify multiple events can be scheduled and canceled.
        let event_id_1 = timer.schedule_after(deadline, FooEvent(8));
        let event_id_2 = timer.schedule_after(deadline, FooEvent(9));
        let event_id_3 = timer.schedule_after(deadline, FooEvent(10));
        timer.cancel_event(event_id_2);
        assert_eq!(timer.triggered(&event_id_2), None);
        assert_eq!(timer.triggered(&event_id_3), Some(FooEvent(10)));
        assert_eq!(timer.triggered(&event_id_1), Some(FooEvent(8)));
    }

    #[test]
    fn cancel_all() {
        let fake_scheduler = FakeScheduler::new();
        let mut timer = Timer::<_>::new(Box::new(fake_scheduler));
        let deadline = Duration::from_nanos(5);

        let event_id_1 = timer.schedule_after(deadline, 8);
        let event_id_2 = timer.schedule_after(deadline, 9);
        let event_id_3 = timer.schedule_after(deadline, 10);
        timer.cancel_all();
        assert_eq!(timer.triggered(&event_id_1), None);
        assert_eq!(timer.triggered(&event_id_2), None);
        assert_eq!(timer.triggered(&event_id_3), None);
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn cancel_matching_events() {
        let mut timer = Timer::new(Box::new(FakeScheduler::new()));
        let keep = timer.schedule_after(Duration::from_secs(1), TimerEvent::GroupRekey);
        let drop = timer.schedule_after(
            Duration::from_secs(1),
            TimerEvent::EapolRetransmit { addr: [1; 6], generation: 1 },
        );
        timer.cancel_where(|e| matches!(e, TimerEvent::EapolRetransmit { .. }));
        assert_eq!(timer.triggered(&drop), None);
        assert_eq!(timer.triggered(&keep), Some(TimerEvent::GroupRekey));
    }
}
