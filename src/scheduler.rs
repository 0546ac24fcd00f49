use alloc::collections::BTreeMap;

use crate::{clock::Timestamp, tables::pit::PitToken};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Deadline-ordered timers, each one firing for a single pending entry.
///
/// Nothing fires by itself: whoever drives the forwarder asks for the due
/// timers after reading the clock, so expiry runs on the same thread and in
/// the same run-to-completion fashion as packet processing.
pub trait Scheduler {
    fn schedule(&mut self, at: Timestamp, entry: PitToken) -> TimerId;

    // Returns false if the timer already fired or was cancelled
    fn cancel(&mut self, timer: TimerId) -> bool;

    // Removes and returns the earliest timer due at `now`, if any
    fn pop_due(&mut self, now: Timestamp) -> Option<(TimerId, PitToken)>;

    fn next_deadline(&self) -> Option<Timestamp>;
}

#[derive(Default)]
pub struct TimerQueue {
    // Keyed by (deadline, id) so equal deadlines fire in scheduling order
    queue: BTreeMap<(Timestamp, TimerId), PitToken>,
    deadlines: BTreeMap<TimerId, Timestamp>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Scheduler for TimerQueue {
    fn schedule(&mut self, at: Timestamp, entry: PitToken) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.queue.insert((at, id), entry);
        self.deadlines.insert(id, at);
        id
    }

    fn cancel(&mut self, timer: TimerId) -> bool {
        match self.deadlines.remove(&timer) {
            Some(at) => self.queue.remove(&(at, timer)).is_some(),
            None => false,
        }
    }

    fn pop_due(&mut self, now: Timestamp) -> Option<(TimerId, PitToken)> {
        let (&(at, id), _) = self.queue.first_key_value()?;
        if at > now {
            return None;
        }
        let entry = self.queue.remove(&(at, id))?;
        self.deadlines.remove(&id);
        Some((id, entry))
    }

    fn next_deadline(&self) -> Option<Timestamp> {
        self.queue.first_key_value().map(|(&(at, _), _)| at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::pit::PitToken;

    fn at(ms: u64) -> Timestamp {
        Timestamp { ms_since_1970: ms }
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let mut timers = TimerQueue::new();
        let a = PitToken::for_tests(1);
        let b = PitToken::for_tests(2);
        let c = PitToken::for_tests(3);

        timers.schedule(at(30), a);
        timers.schedule(at(10), b);
        timers.schedule(at(10), c);
        assert_eq!(timers.next_deadline(), Some(at(10)));

        assert_eq!(timers.pop_due(at(5)), None);
        assert_eq!(timers.pop_due(at(10)).map(|x| x.1), Some(b));
        assert_eq!(timers.pop_due(at(10)).map(|x| x.1), Some(c));
        assert_eq!(timers.pop_due(at(20)), None);
        assert_eq!(timers.pop_due(at(100)).map(|x| x.1), Some(a));
        assert!(timers.is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut timers = TimerQueue::new();
        let id = timers.schedule(at(10), PitToken::for_tests(1));
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert_eq!(timers.pop_due(at(10)), None);
        assert_eq!(timers.next_deadline(), None);
    }
}
