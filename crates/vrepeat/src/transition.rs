//! Classification of a move from one rendered range to the next.

use crate::window::VisibleRange;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpDirection {
    Up,
    Down,
}

/// How the visible range changed between two scroll notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollTransition {
    /// The end did not move; nothing to recycle.
    PinnedBottom,
    /// The end did not move but the start moved up.
    PinnedTop,
    /// Overlapping move down; `moved` views go from head to tail.
    ScrollDown { moved: usize },
    /// Overlapping move up; `moved` views go from tail to head.
    ScrollUp { moved: usize },
    /// No overlap; the window is rebuilt in place.
    Jump { direction: JumpDirection },
    /// None of the above. Handled like a jump.
    Unclassified,
}

impl ScrollTransition {
    pub fn moved_views(&self) -> usize {
        match *self {
            ScrollTransition::ScrollDown { moved } | ScrollTransition::ScrollUp { moved } => moved,
            _ => 0,
        }
    }

    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            ScrollTransition::Jump { .. } | ScrollTransition::Unclassified
        )
    }
}

/// Classifies `old → new`. Cases are tested in order and the first match wins.
pub fn classify_transition(old: VisibleRange, new: VisibleRange) -> ScrollTransition {
    if new.start >= old.start && old.end == new.end {
        ScrollTransition::PinnedBottom
    } else if new.end == old.end && old.end >= new.end {
        ScrollTransition::PinnedTop
    } else if new.start > old.start && old.end >= new.start && new.end >= old.end {
        ScrollTransition::ScrollDown {
            moved: new.start - old.start,
        }
    } else if old.start > new.start && old.start <= new.end && old.end >= new.end {
        ScrollTransition::ScrollUp {
            moved: old.end - new.end,
        }
    } else if old.end < new.start {
        ScrollTransition::Jump {
            direction: JumpDirection::Down,
        }
    } else if old.start > new.end {
        ScrollTransition::Jump {
            direction: JumpDirection::Up,
        }
    } else {
        ScrollTransition::Unclassified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: usize, end: usize) -> VisibleRange {
        VisibleRange::new(start, end)
    }

    #[test]
    fn unchanged_range_is_pinned_bottom() {
        assert_eq!(
            classify_transition(range(0, 20), range(0, 20)),
            ScrollTransition::PinnedBottom
        );
    }

    #[test]
    fn same_end_with_earlier_start_is_pinned_top() {
        assert_eq!(
            classify_transition(range(5, 20), range(3, 20)),
            ScrollTransition::PinnedTop
        );
    }

    #[test]
    fn overlapping_down_moves_the_start_delta() {
        assert_eq!(
            classify_transition(range(0, 20), range(5, 25)),
            ScrollTransition::ScrollDown { moved: 5 }
        );
    }

    #[test]
    fn overlapping_up_moves_the_end_delta() {
        assert_eq!(
            classify_transition(range(10, 30), range(4, 24)),
            ScrollTransition::ScrollUp { moved: 6 }
        );
    }

    #[test]
    fn disjoint_ranges_jump() {
        assert_eq!(
            classify_transition(range(0, 20), range(500, 520)),
            ScrollTransition::Jump {
                direction: JumpDirection::Down
            }
        );
        assert_eq!(
            classify_transition(range(500, 520), range(0, 20)),
            ScrollTransition::Jump {
                direction: JumpDirection::Up
            }
        );
    }

    #[test]
    fn growing_window_is_unclassified() {
        let transition = classify_transition(range(0, 4), range(0, 11));
        assert_eq!(transition, ScrollTransition::Unclassified);
        assert!(transition.requires_rebuild());
        assert_eq!(
            classify_transition(range(5, 10), range(3, 12)),
            ScrollTransition::Unclassified
        );
    }

    #[test]
    fn adjacent_ranges_jump_rather_than_scroll() {
        assert_eq!(
            classify_transition(range(0, 20), range(21, 41)),
            ScrollTransition::Jump {
                direction: JumpDirection::Down
            }
        );
    }
}
