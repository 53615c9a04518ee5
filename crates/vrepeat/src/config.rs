use std::time::Duration;

/// Default number of items from either end that counts as "near" it.
pub const DEFAULT_EDGE_THRESHOLD: usize = 5;

/// Tunables for a [`VirtualRepeat`](crate::VirtualRepeat).
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualRepeatConfig {
    /// Items from the top or bottom of the list within which load-more fires.
    pub edge_threshold: usize,

    /// Delay between sizing attempts while the first item measures zero height.
    pub sizing_retry_interval: Duration,

    /// Number of sizing retries before giving up with a warning.
    pub sizing_retry_limit: u32,

    /// How often the list's distance to the page top is re-read in page mode.
    pub page_offset_poll_interval: Duration,

    /// Upper bound on views materialized for one window.
    pub max_views: usize,
}

impl Default for VirtualRepeatConfig {
    fn default() -> Self {
        Self {
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            sizing_retry_interval: Duration::from_millis(500),
            sizing_retry_limit: 60,
            page_offset_poll_interval: Duration::from_millis(500),
            max_views: 10_000,
        }
    }
}
