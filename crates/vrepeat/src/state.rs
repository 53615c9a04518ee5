use std::marker::PhantomData;

use crate::config::VirtualRepeatConfig;
use crate::layout::{BufferPair, LayoutAdapter, ScrollerKind};
use crate::source::ItemSource;
use crate::stats::RepeatStats;
use crate::view::{ItemBinding, RenderedView, ViewContainer};
use crate::window::{ScrollerSnapshot, ViewWindow};

/// Window state and collaborators shared by the controller and the
/// collection strategies. Strategies borrow it for one call at a time.
pub(crate) struct RepeatCore<T, C> {
    pub(crate) container: C,
    pub(crate) layout: Box<dyn LayoutAdapter>,
    pub(crate) config: VirtualRepeatConfig,
    pub(crate) window: ViewWindow,
    /// Views needed to fill the viewport plus one.
    pub(crate) min_views: usize,
    pub(crate) scroller_kind: ScrollerKind,
    pub(crate) distance_to_top: f32,
    pub(crate) buffers: Option<BufferPair>,
    pub(crate) item_name: String,
    pub(crate) stats: RepeatStats,
    _items: PhantomData<fn() -> T>,
}

impl<T, C> RepeatCore<T, C>
where
    T: Clone + 'static,
    C: ViewContainer<T>,
{
    pub(crate) fn new(container: C, layout: Box<dyn LayoutAdapter>, config: VirtualRepeatConfig) -> Self {
        Self {
            container,
            layout,
            config,
            window: ViewWindow::default(),
            min_views: 0,
            scroller_kind: ScrollerKind::default(),
            distance_to_top: 0.0,
            buffers: None,
            item_name: String::new(),
            stats: RepeatStats::default(),
            _items: PhantomData,
        }
    }

    /// Scroll offset measured from the top of the list.
    pub(crate) fn relative_scroll_top(&self, snapshot: &ScrollerSnapshot) -> f32 {
        (snapshot.scroll_top - self.distance_to_top).max(0.0)
    }

    pub(crate) fn measure_first_item(&self) -> Option<f32> {
        let buffers = self.buffers.as_ref()?;
        self.layout
            .first_rendered_height(buffers)
            .filter(|height| height.is_finite() && *height > 0.0)
    }

    /// Recomputes buffer heights and pushes them to the layout.
    pub(crate) fn sync_buffers(&mut self, item_count: usize) {
        self.window.recompute_buffers(item_count);
        if let Some(buffers) = self.buffers.as_ref() {
            self.layout.set_buffer_heights(
                buffers,
                self.window.top_buffer_height,
                self.window.bottom_buffer_height,
            );
        }
    }

    pub(crate) fn create_view(&mut self, items: &ItemSource<T>, index: usize) -> Option<C::View> {
        let item = items.get(index)?;
        let binding = ItemBinding {
            item_name: &self.item_name,
            index,
            item: &item,
            count: items.len(),
        };
        let view = self.container.create_view(&binding);
        self.stats.views_created += 1;
        Some(view)
    }

    /// Binds the view at `position` to `index`. Skips views already showing
    /// that index unless `force` is set.
    pub(crate) fn bind_view(
        &mut self,
        items: &ItemSource<T>,
        position: usize,
        index: usize,
        force: bool,
    ) {
        let Some(item) = items.get(index) else {
            return;
        };
        let count = items.len();
        let Some(view) = self.container.view_mut(position) else {
            return;
        };
        if !force && view.index() == index {
            return;
        }
        view.bind(&ItemBinding {
            item_name: &self.item_name,
            index,
            item: &item,
            count,
        });
        self.stats.rebinds += 1;
    }

    pub(crate) fn remove_view(&mut self, position: usize) {
        if self.container.remove_view(position).is_some() {
            self.stats.views_destroyed += 1;
        }
    }

    pub(crate) fn remove_all_views(&mut self) {
        self.stats.views_destroyed += self.container.view_count();
        self.container.remove_all_views();
    }

    pub(crate) fn stats(&self) -> RepeatStats {
        RepeatStats {
            views_in_use: self.container.view_count(),
            ..self.stats
        }
    }
}
