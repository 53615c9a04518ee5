use super::Sizing;
use crate::state::RepeatCore;
use crate::view::ViewContainer;

/// Drops every view and zeroes the window.
pub(super) fn reset<T, C>(core: &mut RepeatCore<T, C>) -> Sizing
where
    T: Clone + 'static,
    C: ViewContainer<T>,
{
    core.remove_all_views();
    core.window.clear_range();
    core.sync_buffers(0);
    Sizing {
        reset: true,
        succeeded: true,
        ..Sizing::default()
    }
}
