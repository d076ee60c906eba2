//! Per-view replay statistics.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Number of views kept before the least recently updated is evicted.
pub const MAX_STATS_HISTORY: usize = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewReplayStats {
    pub segments_count: u32,
    pub records_count: u64,
    pub segments_total_raw_size: usize,
}

#[derive(Debug)]
pub struct ReplayStats {
    views: LruCache<String, ViewReplayStats>,
}

impl ReplayStats {
    pub fn new() -> Self {
        Self::with_capacity(MAX_STATS_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            views: LruCache::new(capacity),
        }
    }

    pub fn get(&self, view_id: &str) -> Option<ViewReplayStats> {
        self.views.peek(view_id).copied()
    }

    pub fn segments_count(&self, view_id: &str) -> u32 {
        self.get(view_id).map_or(0, |s| s.segments_count)
    }

    pub fn add_segment(&mut self, view_id: &str) {
        self.entry(view_id).segments_count += 1;
    }

    pub fn add_record(&mut self, view_id: &str) {
        self.entry(view_id).records_count += 1;
    }

    pub fn add_wrote_data(&mut self, view_id: &str, raw_bytes_count: usize) {
        self.entry(view_id).segments_total_raw_size += raw_bytes_count;
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    fn entry(&mut self, view_id: &str) -> &mut ViewReplayStats {
        self.views
            .get_or_insert_mut(view_id.to_string(), ViewReplayStats::default)
    }
}

impl Default for ReplayStats {
    fn default() -> Self {
        Self::new()
    }
}
