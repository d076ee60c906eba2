//! Mutation buffer with coalescing and hard-cap timers.
//!
//! Raw notifications accumulate until one of two timers fires:
//!
//! ```text
//! add ──► pending += raw
//!         coalesce timer re-armed (16 ms)       fires when adds go quiet
//!         hard-cap timer armed on empty→busy    (100 ms) bounds staleness
//! ```
//!
//! Whichever fires first takes the batch; taking cancels both.

use rewind_core::dom::RawMutation;
use rewind_core::scheduler::{Scheduler, TimerId};
use serde::{Deserialize, Serialize};

/// Batching delays in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Quiet period after the last add.
    pub coalesce_delay_ms: u64,
    /// Longest time a notification may wait.
    pub max_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            coalesce_delay_ms: 16,
            max_delay_ms: 100,
        }
    }
}

/// Which of the buffer's timers fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BatchTimer {
    Coalesce,
    HardCap,
}

/// Accumulator of raw mutations for one observed root.
#[derive(Debug)]
pub struct MutationBuffer {
    config: BatchConfig,
    pending: Vec<RawMutation>,
    coalesce_timer: Option<TimerId>,
    hard_cap_timer: Option<TimerId>,
    stopped: bool,
}

impl MutationBuffer {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            coalesce_timer: None,
            hard_cap_timer: None,
            stopped: false,
        }
    }

    /// Append raw mutations and (re)arm the timers.
    ///
    /// `key` maps a [`BatchTimer`] to the owner's scheduler key.
    pub fn add_mutations<K>(
        &mut self,
        mutations: Vec<RawMutation>,
        scheduler: &mut Scheduler<K>,
        key: impl Fn(BatchTimer) -> K,
    ) {
        if self.stopped || mutations.is_empty() {
            return;
        }
        let was_empty = self.pending.is_empty();
        self.pending.extend(mutations);

        if let Some(timer) = self.coalesce_timer.take() {
            scheduler.clear(timer);
        }
        self.coalesce_timer = Some(scheduler.set_timeout(
            self.config.coalesce_delay_ms,
            key(BatchTimer::Coalesce),
        ));
        if was_empty {
            if let Some(timer) = self.hard_cap_timer.take() {
                scheduler.clear(timer);
            }
            self.hard_cap_timer =
                Some(scheduler.set_timeout(self.config.max_delay_ms, key(BatchTimer::HardCap)));
        }
    }

    /// Cancel both timers and hand out everything pending.
    pub fn take_batch<K>(&mut self, scheduler: &mut Scheduler<K>) -> Vec<RawMutation> {
        self.cancel_timers(scheduler);
        std::mem::take(&mut self.pending)
    }

    /// Cancel timers and discard pending mutations. Later adds are ignored.
    pub fn stop<K>(&mut self, scheduler: &mut Scheduler<K>) {
        self.cancel_timers(scheduler);
        self.pending.clear();
        self.stopped = true;
    }

    fn cancel_timers<K>(&mut self, scheduler: &mut Scheduler<K>) {
        for timer in [self.coalesce_timer.take(), self.hard_cap_timer.take()]
            .into_iter()
            .flatten()
        {
            scheduler.clear(timer);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Default for MutationBuffer {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}
