//! Strategy for ordered, countable lists.

use super::viewport::ViewportFit;
use super::{PatchOutcome, Sizing};
use crate::source::{ItemSource, Splice};
use crate::state::RepeatCore;
use crate::view::ViewContainer;
use crate::window::{compute_visible_range, ScrollerSnapshot, VisibleRange};

pub(super) fn size_for_source<T, C>(core: &mut RepeatCore<T, C>, items: &ItemSource<T>) -> Sizing
where
    T: Clone + 'static,
    C: ViewContainer<T>,
{
    let count = items.len();
    if count == 0 {
        return super::null::reset(core);
    }

    if core.container.view_count() == 0 {
        let probe_index = core.window.first_index.min(count - 1);
        if let Some(view) = core.create_view(items, probe_index) {
            core.container.add_view(view);
        }
        core.window.first_index = probe_index;
        core.window.length = core.container.view_count();
        core.sync_buffers(count);
    }

    let Some(item_height) = core.measure_first_item() else {
        log::debug!("virtual repeat: first item has no height yet");
        return Sizing::default();
    };

    let viewport_height = core.layout.scroller_snapshot().viewport_height;
    let min_views = min_views_for(core, viewport_height, item_height);
    core.window.item_height = item_height;
    core.min_views = min_views;
    Sizing {
        reset: false,
        succeeded: true,
        observe_scroller: true,
        item_height,
        min_views,
    }
}

fn min_views_for<T, C>(core: &RepeatCore<T, C>, viewport_height: f32, item_height: f32) -> usize {
    let wanted = ViewportFit::new(viewport_height, item_height).min_views(item_height);
    if wanted > core.config.max_views {
        log::warn!(
            "virtual repeat: viewport needs {wanted} views, capping at {}",
            core.config.max_views
        );
        core.config.max_views
    } else {
        wanted
    }
}

/// Materializes the window at `start`, reusing existing views.
///
/// Views are created until the viewport is covered and excess views are
/// dropped from the tail. Views already showing the right index are left
/// alone unless `force_rebind` is set.
pub(super) fn instantiate_window<T, C>(
    core: &mut RepeatCore<T, C>,
    items: &ItemSource<T>,
    start: usize,
    force_rebind: bool,
) where
    T: Clone + 'static,
    C: ViewContainer<T>,
{
    let count = items.len();
    if count == 0 {
        super::null::reset(core);
        return;
    }
    let desired = core.min_views.max(1).min(count);
    let start = start.min(count - desired);

    while core.container.view_count() > desired {
        let last = core.container.view_count() - 1;
        core.remove_view(last);
    }
    let existing = core.container.view_count();
    for position in 0..existing {
        core.bind_view(items, position, start + position, force_rebind);
    }
    for position in existing..desired {
        if let Some(view) = core.create_view(items, start + position) {
            core.container.add_view(view);
        }
    }

    core.window.first_index = start;
    core.window.length = core.container.view_count();
    core.sync_buffers(count);
}

pub(super) fn remeasure<T, C>(
    core: &mut RepeatCore<T, C>,
    items: &ItemSource<T>,
    snapshot: &ScrollerSnapshot,
) -> Option<VisibleRange>
where
    T: Clone + 'static,
    C: ViewContainer<T>,
{
    if let Some(item_height) = core.measure_first_item() {
        if (item_height - core.window.item_height).abs() > f32::EPSILON {
            log::debug!(
                "virtual repeat: item height changed {} -> {item_height}",
                core.window.item_height
            );
            core.min_views = min_views_for(core, snapshot.viewport_height, item_height);
            core.window.item_height = item_height;
        }
    }
    core.stats.remeasures += 1;
    let range = compute_visible_range(
        items.len(),
        core.min_views,
        core.window.item_height,
        core.relative_scroll_top(snapshot),
    )?;
    instantiate_window(core, items, range.start, true);
    core.window.range()
}

/// Applies ordered splices to the rendered window.
///
/// Splices entirely above the window only shift `first_index`. Splices below
/// it change nothing but the bottom buffer. Overlapping splices drop the
/// affected views and insert views for the new items, after which the window
/// is filled or trimmed to its desired length and rebound.
pub(super) fn patch_for_mutation<T, C>(
    core: &mut RepeatCore<T, C>,
    items: &ItemSource<T>,
    splices: &[Splice],
) -> PatchOutcome
where
    T: Clone + 'static,
    C: ViewContainer<T>,
{
    if core.window.item_height <= 0.0 || core.container.view_count() == 0 {
        return PatchOutcome::NeedsRecompute;
    }
    let count = items.len();
    let capacity = core.min_views.max(core.container.view_count());
    let mut first = core.window.first_index;
    let mut anchor_shift: isize = 0;
    // Lowest window position whose item may have changed.
    let mut dirty_from: Option<usize> = None;

    for splice in splices {
        let rendered = core.container.view_count();
        let end = first + rendered;
        let removed_end = splice.index + splice.removed;

        if removed_end <= first {
            first = first - splice.removed + splice.added;
            anchor_shift += splice.net();
            continue;
        }
        if splice.index >= end {
            continue;
        }

        let overlap_start = splice.index.max(first);
        let overlap_end = removed_end.min(end);
        let local = overlap_start - first;
        for _ in overlap_start..overlap_end {
            core.remove_view(local);
        }
        if splice.index < first {
            anchor_shift -= (first - splice.index) as isize;
            first = splice.index;
        }
        let insert_at = splice.index - first;
        let room = capacity.saturating_sub(insert_at);
        for offset in 0..splice.added.min(room) {
            let Some(view) = core.create_view(items, (splice.index + offset).min(count.saturating_sub(1))) else {
                break;
            };
            core.container.insert_view(insert_at + offset, view);
        }
        let touched = local.min(insert_at);
        dirty_from = Some(dirty_from.map_or(touched, |dirty| dirty.min(touched)));
    }

    if count == 0 {
        core.remove_all_views();
        core.window.clear_range();
        core.sync_buffers(0);
        return PatchOutcome::Patched { anchor_shift: 0 };
    }

    let desired = core.min_views.max(1).min(count);
    let clamped = first.min(count - desired);
    anchor_shift -= (first - clamped) as isize;
    let first = clamped;

    while core.container.view_count() > desired {
        let last = core.container.view_count() - 1;
        core.remove_view(last);
    }
    let existing = core.container.view_count();
    for position in 0..existing {
        let force = dirty_from.is_some_and(|dirty| position >= dirty);
        core.bind_view(items, position, first + position, force);
    }
    for position in existing..desired {
        if let Some(view) = core.create_view(items, first + position) {
            core.container.add_view(view);
        }
    }

    core.window.first_index = first;
    core.window.length = core.container.view_count();
    core.sync_buffers(count);
    PatchOutcome::Patched { anchor_shift }
}
