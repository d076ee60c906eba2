//! Recorder configuration.

use rewind_core::privacy::NodePrivacyLevel;
use rewind_delta::BatchConfig;
use rewind_segment::SegmentConfig;
use serde::{Deserialize, Serialize};

/// What the host environment can observe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentCapabilities {
    /// Tree change notifications are delivered. Without them the recorder
    /// is disabled.
    pub mutation_observer: bool,
    /// The host reports visual viewport changes.
    pub visual_viewport: bool,
}

impl Default for EnvironmentCapabilities {
    fn default() -> Self {
        Self {
            mutation_observer: true,
            visual_viewport: true,
        }
    }
}

/// Configuration for a [`Recorder`](crate::Recorder).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Level applied to nodes without an explicit marker.
    pub default_privacy_level: NodePrivacyLevel,
    /// Mutation batching delays (in milliseconds).
    pub batch: BatchConfig,
    /// Pointer move throttle window (in milliseconds).
    pub mouse_move_throttle_ms: u64,
    /// Scroll throttle window (in milliseconds).
    pub scroll_throttle_ms: u64,
    /// Viewport and visual viewport resize throttle window (in milliseconds).
    pub viewport_resize_throttle_ms: u64,
    /// Segment limits.
    pub segment: SegmentConfig,
    pub capabilities: EnvironmentCapabilities,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            default_privacy_level: NodePrivacyLevel::Mask,
            batch: BatchConfig::default(),
            mouse_move_throttle_ms: 50,
            scroll_throttle_ms: 100,
            viewport_resize_throttle_ms: 200,
            segment: SegmentConfig::default(),
            capabilities: EnvironmentCapabilities::default(),
        }
    }
}

/// Builder for recorder configuration.
pub struct RecorderConfigBuilder {
    config: RecorderConfig,
}

impl RecorderConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RecorderConfig::default(),
        }
    }

    pub fn default_privacy_level(mut self, level: NodePrivacyLevel) -> Self {
        self.config.default_privacy_level = level;
        self
    }

    pub fn coalesce_delay(mut self, ms: u64) -> Self {
        self.config.batch.coalesce_delay_ms = ms;
        self
    }

    pub fn max_mutation_delay(mut self, ms: u64) -> Self {
        self.config.batch.max_delay_ms = ms;
        self
    }

    pub fn mouse_move_throttle(mut self, ms: u64) -> Self {
        self.config.mouse_move_throttle_ms = ms;
        self
    }

    pub fn scroll_throttle(mut self, ms: u64) -> Self {
        self.config.scroll_throttle_ms = ms;
        self
    }

    pub fn viewport_resize_throttle(mut self, ms: u64) -> Self {
        self.config.viewport_resize_throttle_ms = ms;
        self
    }

    pub fn segment_duration_limit(mut self, ms: u64) -> Self {
        self.config.segment.duration_limit_ms = ms;
        self
    }

    pub fn segment_bytes_limit(mut self, bytes: usize) -> Self {
        self.config.segment.bytes_limit = bytes;
        self
    }

    pub fn capabilities(mut self, capabilities: EnvironmentCapabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    pub fn build(self) -> RecorderConfig {
        self.config
    }
}

impl Default for RecorderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
