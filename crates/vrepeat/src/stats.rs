/// Lifecycle counters for a [`VirtualRepeat`](crate::VirtualRepeat).
///
/// Useful for asserting recycling behaviour in tests and for spotting
/// unexpected churn while profiling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepeatStats {
    /// Views currently rendered.
    pub views_in_use: usize,

    /// Views created since the controller was constructed.
    pub views_created: usize,

    /// Views dropped since the controller was constructed.
    pub views_destroyed: usize,

    /// Views repositioned by scroll recycling.
    pub views_moved: usize,

    /// Rebinds of existing views to a different item.
    pub rebinds: usize,

    /// Full remeasure passes (jumps, unclassified transitions).
    pub remeasures: usize,

    /// Transitions that matched no known case.
    pub unclassified_transitions: usize,

    /// Load-more handler invocations.
    pub load_more_calls: usize,
}
