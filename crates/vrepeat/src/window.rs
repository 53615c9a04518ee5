//! Window math: which indices are rendered and how tall the spacers are.
//!
//! Every item is assumed to be `item_height` tall. The rendered window covers
//! `[first_index, first_index + length)` and the two buffers stand in for the
//! items above and below it, so the total scroll height always equals
//! `item_count * item_height`.

/// Scroller metrics captured when a scroll or resize notification is processed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollerSnapshot {
    pub scroll_top: f32,
    pub scroll_height: f32,
    pub viewport_height: f32,
}

impl ScrollerSnapshot {
    pub fn new(scroll_top: f32, scroll_height: f32, viewport_height: f32) -> Self {
        Self {
            scroll_top,
            scroll_height,
            viewport_height,
        }
    }
}

/// Inclusive index range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VisibleRange {
    pub start: usize,
    pub end: usize,
}

impl VisibleRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start {start} after end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }
}

/// The rendered slice of the list and its spacer heights.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewWindow {
    pub first_index: usize,
    pub length: usize,
    pub item_height: f32,
    pub top_buffer_height: f32,
    pub bottom_buffer_height: f32,
}

impl ViewWindow {
    /// Rendered index range, `None` while nothing is rendered.
    pub fn range(&self) -> Option<VisibleRange> {
        if self.length == 0 {
            None
        } else {
            Some(VisibleRange::new(
                self.first_index,
                self.first_index + self.length - 1,
            ))
        }
    }

    /// Recomputes both buffer heights from the window and `item_count`.
    pub fn recompute_buffers(&mut self, item_count: usize) {
        let below = item_count.saturating_sub(self.first_index + self.length);
        self.top_buffer_height = self.first_index as f32 * self.item_height;
        self.bottom_buffer_height = below as f32 * self.item_height;
    }

    /// Drops the rendered range but keeps the measured item height.
    pub fn clear_range(&mut self) {
        self.first_index = 0;
        self.length = 0;
        self.top_buffer_height = 0.0;
        self.bottom_buffer_height = 0.0;
    }

    /// Height the buffers and rendered views add up to.
    pub fn total_height(&self) -> f32 {
        self.top_buffer_height + self.length as f32 * self.item_height + self.bottom_buffer_height
    }

    /// Checks the buffer-sum and index invariants against `item_count`.
    pub fn is_consistent_with(&self, item_count: usize) -> bool {
        let expected = item_count as f32 * self.item_height;
        let tolerance = 1e-3 * expected.abs().max(1.0);
        self.first_index + self.length <= item_count
            && (self.total_height() - expected).abs() <= tolerance
    }
}

/// Index range to render for a given scroll offset.
///
/// `relative_scroll_top` is measured from the top of the list, not of the
/// scroller. The start is clamped so the window never runs past the end of
/// the list.
pub fn compute_visible_range(
    item_count: usize,
    min_views: usize,
    item_height: f32,
    relative_scroll_top: f32,
) -> Option<VisibleRange> {
    if item_count == 0 {
        return None;
    }
    let min_views = min_views.max(1);
    let raw_start = if item_height > 0.0 && relative_scroll_top > 0.0 {
        (relative_scroll_top / item_height).floor() as usize
    } else {
        0
    };
    let start = raw_start.min(item_count.saturating_sub(min_views));
    let end = (start + min_views - 1).min(item_count - 1);
    Some(VisibleRange::new(start, end))
}
