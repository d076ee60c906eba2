//! Explicit timers.
//!
//! The recorder never sleeps and never spawns tasks. Every delayed action
//! is a timer registered in a [`Scheduler`] under a caller-defined key; the
//! host advances time and the owner dispatches the keys that came due.
//!
//! ```text
//! set_timeout(delay, key) -> id       "run within N ms"
//! Throttle::call(payload)             "run at most once per window"
//! pop_due(now) -> (id, key)           suspension point
//! ```

use crate::record::TimeStamp;
use std::collections::{BTreeMap, HashMap};

/// Identifier of a registered timer.
pub type TimerId = u64;

/// Deadline-ordered timer queue.
#[derive(Clone, Debug)]
pub struct Scheduler<K> {
    now: TimeStamp,
    next_id: TimerId,
    queue: BTreeMap<(TimeStamp, TimerId), K>,
    deadlines: HashMap<TimerId, TimeStamp>,
}

impl<K> Scheduler<K> {
    pub fn new(now: TimeStamp) -> Self {
        Self {
            now,
            next_id: 1,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Current scheduler time. Inside a timer dispatch this is the timer's
    /// deadline, not the host time.
    pub fn now(&self) -> TimeStamp {
        self.now
    }

    /// Register `key` to fire `delay` ms from now.
    pub fn set_timeout(&mut self, delay: u64, key: K) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        let deadline = self.now.saturating_add(delay);
        self.queue.insert((deadline, id), key);
        self.deadlines.insert(id, deadline);
        id
    }

    /// Cancel a timer. Clearing an unknown or already fired timer is a no-op.
    pub fn clear(&mut self, id: TimerId) -> Option<K> {
        let deadline = self.deadlines.remove(&id)?;
        self.queue.remove(&(deadline, id))
    }

    /// Cancel every timer whose key matches `predicate`.
    pub fn clear_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let doomed: Vec<(TimeStamp, TimerId)> = self
            .queue
            .iter()
            .filter(|(_, key)| predicate(key))
            .map(|(slot, _)| *slot)
            .collect();
        for slot in &doomed {
            self.queue.remove(slot);
            self.deadlines.remove(&slot.1);
        }
        doomed.len()
    }

    pub fn clear_all(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<TimeStamp> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pop the earliest timer due at `now`, moving the clock to its deadline.
    ///
    /// When nothing is due the clock moves to `now` and `None` is returned.
    /// Timers registered while dispatching are scheduled relative to the
    /// deadline of the timer being dispatched.
    pub fn pop_due(&mut self, now: TimeStamp) -> Option<(TimerId, K)> {
        let due = match self.queue.keys().next() {
            Some(&(deadline, id)) if deadline <= now => (deadline, id),
            _ => {
                self.advance(now);
                return None;
            }
        };
        let key = self.queue.remove(&due)?;
        self.deadlines.remove(&due.1);
        self.now = self.now.max(due.0);
        Some((due.1, key))
    }

    /// Move the clock forward without firing anything. Time never goes back.
    pub fn advance(&mut self, now: TimeStamp) {
        self.now = self.now.max(now);
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

// ============================================================================
// Throttle
// ============================================================================

/// Edges on which a [`Throttle`] runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThrottleOptions {
    pub leading: bool,
    pub trailing: bool,
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        Self {
            leading: true,
            trailing: true,
        }
    }
}

impl ThrottleOptions {
    pub fn leading_only() -> Self {
        Self {
            leading: true,
            trailing: false,
        }
    }

    pub fn trailing_only() -> Self {
        Self {
            leading: false,
            trailing: true,
        }
    }
}

/// Runs an action at most once per `wait` window.
///
/// The first call of a window runs immediately when `leading` is set,
/// otherwise its payload is kept. Later calls in the window replace the kept
/// payload, which runs when the window closes if `trailing` is set. The
/// trailing run does not open a new window.
#[derive(Clone, Debug)]
pub struct Throttle<P> {
    wait: u64,
    options: ThrottleOptions,
    in_wait_period: bool,
    pending: Option<P>,
    timer: Option<TimerId>,
}

impl<P> Throttle<P> {
    pub fn new(wait: u64, options: ThrottleOptions) -> Self {
        Self {
            wait,
            options,
            in_wait_period: false,
            pending: None,
            timer: None,
        }
    }

    /// Offer a payload. Returns it back when it must run now.
    ///
    /// `key` is registered in `scheduler` when a window opens; the owner
    /// routes it back to [`Throttle::on_timer`].
    pub fn call<K>(&mut self, payload: P, scheduler: &mut Scheduler<K>, key: K) -> Option<P> {
        if self.in_wait_period {
            self.pending = Some(payload);
            return None;
        }
        let run_now = if self.options.leading {
            Some(payload)
        } else {
            self.pending = Some(payload);
            None
        };
        self.in_wait_period = true;
        self.timer = Some(scheduler.set_timeout(self.wait, key));
        run_now
    }

    /// Close the window. Returns the trailing payload to run, if any.
    pub fn on_timer(&mut self) -> Option<P> {
        self.in_wait_period = false;
        self.timer = None;
        let pending = self.pending.take();
        if self.options.trailing {
            pending
        } else {
            None
        }
    }

    /// Drop the kept payload and close the window.
    pub fn cancel<K>(&mut self, scheduler: &mut Scheduler<K>) {
        if let Some(timer) = self.timer.take() {
            scheduler.clear(timer);
        }
        self.in_wait_period = false;
        self.pending = None;
    }

    pub fn is_waiting(&self) -> bool {
        self.in_wait_period
    }
}
