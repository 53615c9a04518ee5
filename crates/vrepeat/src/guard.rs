//! Guard states for scroll coalescing, mutation handling and load-more.
//!
//! Scroll processing and mutation handling share one [`ActivityState`], so a
//! scroll can never run while a mutation is being patched. Load-more has its
//! own [`LoadMoreState`] because a request outlives both.

/// What the controller is doing between event-loop turns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActivityState {
    #[default]
    Idle,
    /// A scroll microtask is queued; further notifications coalesce into it.
    ScrollPending,
    /// A mutation was patched and the guard resets on the next microtask.
    /// `scroll_deferred` records a scroll that arrived in the meantime.
    MutationInProgress { scroll_deferred: bool },
}

/// Outcome of a scroll notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollRequest {
    /// Queue a scroll microtask.
    Schedule,
    /// One is already queued.
    Coalesced,
    /// Wait for the mutation guard to reset.
    Deferred,
}

impl ActivityState {
    pub fn request_scroll(&mut self) -> ScrollRequest {
        match self {
            ActivityState::Idle => {
                *self = ActivityState::ScrollPending;
                ScrollRequest::Schedule
            }
            ActivityState::ScrollPending => ScrollRequest::Coalesced,
            ActivityState::MutationInProgress { scroll_deferred } => {
                *scroll_deferred = true;
                ScrollRequest::Deferred
            }
        }
    }

    /// Called by the queued scroll microtask. Returns whether it may proceed.
    pub fn begin_scroll(&mut self) -> bool {
        match self {
            ActivityState::ScrollPending => {
                *self = ActivityState::Idle;
                true
            }
            ActivityState::Idle => false,
            ActivityState::MutationInProgress { scroll_deferred } => {
                *scroll_deferred = true;
                false
            }
        }
    }

    /// Enters mutation handling. Returns `false` when already inside one.
    pub fn begin_mutation(&mut self) -> bool {
        match self {
            ActivityState::MutationInProgress { .. } => false,
            ActivityState::ScrollPending => {
                *self = ActivityState::MutationInProgress {
                    scroll_deferred: true,
                };
                true
            }
            ActivityState::Idle => {
                *self = ActivityState::MutationInProgress {
                    scroll_deferred: false,
                };
                true
            }
        }
    }

    /// Leaves mutation handling. Returns whether a scroll is owed.
    pub fn end_mutation(&mut self) -> bool {
        match *self {
            ActivityState::MutationInProgress { scroll_deferred } => {
                *self = ActivityState::Idle;
                scroll_deferred
            }
            _ => false,
        }
    }

    pub fn is_mutating(&self) -> bool {
        matches!(self, ActivityState::MutationInProgress { .. })
    }
}

/// Progress of the load-more request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadMoreState {
    #[default]
    Idle,
    /// Waiting for the next frame to call the handler.
    Scheduled,
    /// The handler returned a deferred completion that has not finished.
    InFlight,
}

impl LoadMoreState {
    /// Returns `false` when a request is already scheduled or in flight.
    pub fn try_schedule(&mut self) -> bool {
        if *self == LoadMoreState::Idle {
            *self = LoadMoreState::Scheduled;
            true
        } else {
            false
        }
    }

    pub fn start(&mut self) -> bool {
        if *self == LoadMoreState::Scheduled {
            *self = LoadMoreState::InFlight;
            true
        } else {
            false
        }
    }

    pub fn complete(&mut self) {
        *self = LoadMoreState::Idle;
    }

    pub fn is_busy(&self) -> bool {
        *self != LoadMoreState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_notifications_coalesce() {
        let mut state = ActivityState::default();
        assert_eq!(state.request_scroll(), ScrollRequest::Schedule);
        assert_eq!(state.request_scroll(), ScrollRequest::Coalesced);
        assert!(state.begin_scroll());
        assert_eq!(state, ActivityState::Idle);
        assert!(!state.begin_scroll());
    }

    #[test]
    fn scroll_during_mutation_is_owed_afterwards() {
        let mut state = ActivityState::default();
        assert!(state.begin_mutation());
        assert!(!state.begin_mutation());
        assert_eq!(state.request_scroll(), ScrollRequest::Deferred);
        assert!(state.end_mutation());
        assert_eq!(state, ActivityState::Idle);
        assert!(!state.end_mutation());
    }

    #[test]
    fn pending_scroll_survives_a_mutation() {
        let mut state = ActivityState::default();
        state.request_scroll();
        assert!(state.begin_mutation());
        assert!(!state.begin_scroll());
        assert!(state.end_mutation());
    }

    #[test]
    fn load_more_runs_once_until_complete() {
        let mut state = LoadMoreState::default();
        assert!(state.try_schedule());
        assert!(!state.try_schedule());
        assert!(state.start());
        assert!(state.is_busy());
        assert!(!state.try_schedule());
        state.complete();
        assert!(state.try_schedule());
    }
}
