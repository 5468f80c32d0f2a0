use std::collections::{BTreeMap, HashMap};

/// Milliseconds on the toy's own clock. Zero is the moment the controller was built.
pub(crate) type Millis = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TimerId(u64);

#[derive(Clone, Debug)]
struct Timer<T> {
    id: TimerId,
    task: T,
    period: Option<Millis>,
}

/// Single-threaded timer queue in the spirit of a browser event loop.
///
/// Timers fire one at a time, ordered by due time and then by the order they
/// were scheduled in. Nothing runs on its own: the owner pulls due tasks with
/// [`TimerQueue::pop_due`] and dispatches them, and anything the dispatch
/// schedules is visible to the very next `pop_due` call.
pub(crate) struct TimerQueue<T> {
    now: Millis,
    seq: u64,
    next_id: u64,
    pending: BTreeMap<(Millis, u64), Timer<T>>,
    index: HashMap<TimerId, (Millis, u64)>,
}

impl<T: Clone> TimerQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            now: 0,
            seq: 0,
            next_id: 1,
            pending: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn now(&self) -> Millis {
        self.now
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn set_timeout(&mut self, delay: Millis, task: T) -> TimerId {
        self.schedule(delay, task, None)
    }

    /// Repeats every `period` ms starting one period from now. A zero period is bumped to 1ms.
    pub(crate) fn set_interval(&mut self, period: Millis, task: T) -> TimerId {
        let period = period.max(1);
        self.schedule(period, task, Some(period))
    }

    fn schedule(&mut self, delay: Millis, task: T, period: Option<Millis>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let due = self.now.saturating_add(delay);
        self.insert(due, Timer { id, task, period });
        id
    }

    fn insert(&mut self, due: Millis, timer: Timer<T>) {
        let key = (due, self.seq);
        self.seq += 1;
        self.index.insert(timer.id, key);
        self.pending.insert(key, timer);
    }

    /// Cancels a timer. Returns false when it already fired (one-shot) or was never scheduled.
    pub(crate) fn clear(&mut self, id: TimerId) -> bool {
        match self.index.remove(&id) {
            Some(key) => self.pending.remove(&key).is_some(),
            None => false,
        }
    }

    pub(crate) fn is_pending(&self, id: TimerId) -> bool {
        self.index.contains_key(&id)
    }

    /// Removes and returns the earliest task due at or before `until`, moving
    /// the clock to its due time. Intervals are put back one period later.
    pub(crate) fn pop_due(&mut self, until: Millis) -> Option<T> {
        let (&key, _) = self.pending.first_key_value()?;
        if key.0 > until {
            return None;
        }
        let timer = self.pending.remove(&key)?;
        self.index.remove(&timer.id);
        self.now = self.now.max(key.0);

        let task = timer.task.clone();
        if let Some(period) = timer.period {
            self.insert(key.0.saturating_add(period), timer);
        }
        Some(task)
    }

    /// Moves the clock forward once nothing else is due.
    pub(crate) fn settle(&mut self, until: Millis) {
        self.now = self.now.max(until);
    }
}

impl<T: Clone> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(q: &mut TimerQueue<&'static str>, until: Millis) -> Vec<(Millis, &'static str)> {
        let mut out = Vec::new();
        while let Some(task) = q.pop_due(until) {
            out.push((q.now(), task));
        }
        q.settle(until);
        out
    }

    #[test]
    fn fires_in_due_then_schedule_order() {
        let mut q = TimerQueue::new();
        q.set_timeout(50, "late");
        q.set_timeout(10, "first");
        q.set_timeout(10, "second");
        assert_eq!(
            drain(&mut q, 100),
            vec![(10, "first"), (10, "second"), (50, "late")]
        );
        assert_eq!(q.now(), 100);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn due_boundary_is_inclusive() {
        let mut q = TimerQueue::new();
        q.set_timeout(300, "tick");
        assert!(drain(&mut q, 299).is_empty());
        assert_eq!(drain(&mut q, 300), vec![(300, "tick")]);
    }

    #[test]
    fn intervals_repeat_until_cleared() {
        let mut q = TimerQueue::new();
        let id = q.set_interval(300, "tick");
        let fired = drain(&mut q, 1000);
        assert_eq!(fired, vec![(300, "tick"), (600, "tick"), (900, "tick")]);
        assert!(q.is_pending(id));

        assert!(q.clear(id));
        assert!(!q.is_pending(id));
        assert!(drain(&mut q, 5000).is_empty());
    }

    #[test]
    fn clearing_a_fired_timeout_reports_false() {
        let mut q = TimerQueue::new();
        let id = q.set_timeout(5, "once");
        drain(&mut q, 10);
        assert!(!q.clear(id));
    }

    #[test]
    fn timers_scheduled_later_use_current_clock() {
        let mut q = TimerQueue::new();
        drain(&mut q, 1000);
        q.set_timeout(400, "sweep");
        assert!(drain(&mut q, 1399).is_empty());
        assert_eq!(drain(&mut q, 1400), vec![(1400, "sweep")]);
    }

    #[test]
    fn zero_period_interval_does_not_spin() {
        let mut q = TimerQueue::new();
        q.set_interval(0, "busy");
        assert_eq!(drain(&mut q, 3).len(), 3);
    }
}
