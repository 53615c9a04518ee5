//! In-memory host: scroller, spacer buffers, views and resize observation.

use std::cell::RefCell;
use std::rc::Rc;

use vrepeat::{
    BufferHandle, BufferPair, ContentSize, ItemBinding, LayoutAdapter, RenderedView,
    ResizeCallback, ResizeObserver, ResizeTarget, ScrollerKind, ScrollerSnapshot, ViewContainer,
};

/// Mutable state shared by every piece of a [`TestHost`].
#[derive(Debug)]
pub struct HostState {
    pub kind: ScrollerKind,
    pub scroll_top: f32,
    pub viewport_height: f32,
    /// Distance from the scroller's content top to the list.
    pub list_offset_top: f32,
    /// Height every rendered view measures.
    pub item_height: f32,
    pub buffers: Option<BufferPair>,
    pub top_buffer_height: f32,
    pub bottom_buffer_height: f32,
    pub rendered_views: usize,
    pub views_created: usize,
    pub views_destroyed: usize,
    pub views_moved: usize,
    pub buffers_created: usize,
    pub buffers_removed: usize,
    next_buffer: u64,
    next_view: u64,
}

impl HostState {
    fn new(viewport_height: f32, item_height: f32) -> Self {
        Self {
            kind: ScrollerKind::Fixed,
            scroll_top: 0.0,
            viewport_height,
            list_offset_top: 0.0,
            item_height,
            buffers: None,
            top_buffer_height: 0.0,
            bottom_buffer_height: 0.0,
            rendered_views: 0,
            views_created: 0,
            views_destroyed: 0,
            views_moved: 0,
            buffers_created: 0,
            buffers_removed: 0,
            next_buffer: 1,
            next_view: 1,
        }
    }

    pub fn content_height(&self) -> f32 {
        self.list_offset_top
            + self.top_buffer_height
            + self.rendered_views as f32 * self.item_height
            + self.bottom_buffer_height
    }

    pub fn max_scroll_top(&self) -> f32 {
        (self.content_height() - self.viewport_height).max(0.0)
    }

    pub fn set_scroll_top(&mut self, scroll_top: f32) {
        self.scroll_top = scroll_top.clamp(0.0, self.max_scroll_top());
    }
}

/// Shared handle to one simulated scroller.
#[derive(Clone, Debug)]
pub struct TestHost {
    state: Rc<RefCell<HostState>>,
}

impl TestHost {
    pub fn new(viewport_height: f32, item_height: f32) -> Self {
        Self {
            state: Rc::new(RefCell::new(HostState::new(viewport_height, item_height))),
        }
    }

    pub fn with_kind(self, kind: ScrollerKind) -> Self {
        self.state.borrow_mut().kind = kind;
        self
    }

    pub fn state(&self) -> std::cell::Ref<'_, HostState> {
        self.state.borrow()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut HostState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    pub fn container<T: Clone>(&self) -> TestContainer<T> {
        TestContainer {
            host: self.clone(),
            views: Vec::new(),
        }
    }

    pub fn layout(&self) -> TestLayout {
        TestLayout { host: self.clone() }
    }

    pub fn resize_observer(&self, supported: bool) -> (TestResizeObserver, ResizeHandle) {
        let shared = Rc::new(RefCell::new(ObserverState {
            supported,
            callbacks: Vec::new(),
            disconnects: 0,
        }));
        (
            TestResizeObserver {
                state: Rc::clone(&shared),
            },
            ResizeHandle { state: shared },
        )
    }
}

/// A rendered view. Records what it was last bound to.
#[derive(Clone, Debug)]
pub struct TestView<T> {
    pub id: u64,
    pub index: usize,
    pub item: T,
    pub item_name: String,
    pub is_first: bool,
    pub is_last: bool,
    pub is_even: bool,
    pub bind_count: usize,
}

impl<T: Clone> RenderedView<T> for TestView<T> {
    fn index(&self) -> usize {
        self.index
    }

    fn bind(&mut self, binding: &ItemBinding<'_, T>) {
        self.index = binding.index;
        self.item = binding.item.clone();
        self.item_name = binding.item_name.to_string();
        self.is_first = binding.is_first();
        self.is_last = binding.is_last();
        self.is_even = binding.is_even();
        self.bind_count += 1;
    }
}

/// View container that keeps views in order and reports churn to the host.
#[derive(Debug)]
pub struct TestContainer<T> {
    host: TestHost,
    views: Vec<TestView<T>>,
}

impl<T: Clone> TestContainer<T> {
    pub fn indices(&self) -> Vec<usize> {
        self.views.iter().map(|view| view.index).collect()
    }

    pub fn items(&self) -> Vec<T> {
        self.views.iter().map(|view| view.item.clone()).collect()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.views.iter().map(|view| view.id).collect()
    }

    fn sync_count(&self) {
        self.host.state.borrow_mut().rendered_views = self.views.len();
    }
}

impl<T: Clone> ViewContainer<T> for TestContainer<T> {
    type View = TestView<T>;

    fn create_view(&mut self, binding: &ItemBinding<'_, T>) -> TestView<T> {
        let mut state = self.host.state.borrow_mut();
        let id = state.next_view;
        state.next_view += 1;
        state.views_created += 1;
        TestView {
            id,
            index: binding.index,
            item: binding.item.clone(),
            item_name: binding.item_name.to_string(),
            is_first: binding.is_first(),
            is_last: binding.is_last(),
            is_even: binding.is_even(),
            bind_count: 0,
        }
    }

    fn views(&self) -> &[TestView<T>] {
        &self.views
    }

    fn view_mut(&mut self, position: usize) -> Option<&mut TestView<T>> {
        self.views.get_mut(position)
    }

    fn add_view(&mut self, view: TestView<T>) {
        self.views.push(view);
        self.sync_count();
    }

    fn insert_view(&mut self, position: usize, view: TestView<T>) {
        let position = position.min(self.views.len());
        self.views.insert(position, view);
        self.sync_count();
    }

    fn remove_view(&mut self, position: usize) -> Option<TestView<T>> {
        if position >= self.views.len() {
            return None;
        }
        let view = self.views.remove(position);
        self.host.state.borrow_mut().views_destroyed += 1;
        self.sync_count();
        Some(view)
    }

    fn remove_all_views(&mut self) {
        let removed = self.views.len();
        self.views.clear();
        self.host.state.borrow_mut().views_destroyed += removed;
        self.sync_count();
    }

    fn move_view(&mut self, from: usize, to: usize) {
        if from >= self.views.len() {
            return;
        }
        let view = self.views.remove(from);
        let to = to.min(self.views.len());
        self.views.insert(to, view);
        self.host.state.borrow_mut().views_moved += 1;
    }
}

#[derive(Clone, Debug)]
pub struct TestLayout {
    host: TestHost,
}

impl LayoutAdapter for TestLayout {
    fn scroll_container(&mut self) -> ScrollerKind {
        self.host.state.borrow().kind
    }

    fn create_buffers(&mut self) -> BufferPair {
        let mut state = self.host.state.borrow_mut();
        let top = BufferHandle(state.next_buffer);
        let bottom = BufferHandle(state.next_buffer + 1);
        state.next_buffer += 2;
        state.buffers_created += 1;
        let pair = BufferPair { top, bottom };
        state.buffers = Some(pair);
        pair
    }

    fn remove_buffers(&mut self, buffers: BufferPair) {
        let mut state = self.host.state.borrow_mut();
        if state.buffers == Some(buffers) {
            state.buffers = None;
            state.top_buffer_height = 0.0;
            state.bottom_buffer_height = 0.0;
            state.buffers_removed += 1;
        }
    }

    fn set_buffer_heights(&mut self, buffers: &BufferPair, top: f32, bottom: f32) {
        let mut state = self.host.state.borrow_mut();
        if state.buffers.as_ref() == Some(buffers) {
            state.top_buffer_height = top;
            state.bottom_buffer_height = bottom;
        }
    }

    fn first_rendered_height(&self, buffers: &BufferPair) -> Option<f32> {
        let state = self.host.state.borrow();
        if state.buffers.as_ref() != Some(buffers) || state.rendered_views == 0 {
            return None;
        }
        Some(state.item_height)
    }

    fn scroller_snapshot(&self) -> ScrollerSnapshot {
        let state = self.host.state.borrow();
        ScrollerSnapshot::new(state.scroll_top, state.content_height(), state.viewport_height)
    }

    fn list_offset_top(&self) -> f32 {
        self.host.state.borrow().list_offset_top
    }

    fn set_scroll_top(&mut self, scroll_top: f32) {
        self.host.state.borrow_mut().set_scroll_top(scroll_top);
    }
}

struct ObserverState {
    supported: bool,
    callbacks: Vec<(ResizeTarget, ResizeCallback)>,
    disconnects: usize,
}

/// Resize observer whose notifications are fired by a [`ResizeHandle`].
pub struct TestResizeObserver {
    state: Rc<RefCell<ObserverState>>,
}

impl ResizeObserver for TestResizeObserver {
    fn is_supported(&self) -> bool {
        self.state.borrow().supported
    }

    fn observe(&mut self, target: ResizeTarget, on_change: ResizeCallback) {
        self.state.borrow_mut().callbacks.push((target, on_change));
    }

    fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.callbacks.clear();
        state.disconnects += 1;
    }
}

/// Test-side end of a [`TestResizeObserver`].
#[derive(Clone)]
pub struct ResizeHandle {
    state: Rc<RefCell<ObserverState>>,
}

impl ResizeHandle {
    pub fn fire(&self, target: ResizeTarget, size: ContentSize) {
        let callbacks: Vec<ResizeCallback> = self
            .state
            .borrow()
            .callbacks
            .iter()
            .filter(|(observed, _)| *observed == target)
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(size);
        }
    }

    pub fn observed_targets(&self) -> Vec<ResizeTarget> {
        self.state
            .borrow()
            .callbacks
            .iter()
            .map(|(target, _)| *target)
            .collect()
    }

    pub fn disconnects(&self) -> usize {
        self.state.borrow().disconnects
    }
}
