//! Ready-made controller setups for integration tests and benches.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use futures::channel::oneshot;
use vrepeat::{
    BindingScope, BoundItems, ConfigError, ItemList, LoadMoreBinding, LoadMoreOutcome,
    ScrollContext, ScrollerKind, VirtualRepeat, VirtualRepeatConfig,
};
use vrepeat_core::{DefaultScheduler, ManualClock, Runtime};

use crate::context::TestBindingContext;
use crate::host::{ResizeHandle, TestContainer, TestHost};

pub type TestRepeat = VirtualRepeat<u32, TestContainer<u32>>;

const FRAME_NANOS: u64 = 16_000_000;

/// Records load-more invocations and optionally holds them open.
#[derive(Clone, Default)]
pub struct LoadMoreProbe {
    calls: Rc<RefCell<Vec<ScrollContext>>>,
    pending: Rc<RefCell<Vec<oneshot::Sender<()>>>>,
    deferred: Rc<Cell<bool>>,
}

impl LoadMoreProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, each call returns a deferred outcome that stays pending
    /// until [`LoadMoreProbe::complete_all`].
    pub fn set_deferred(&self, deferred: bool) {
        self.deferred.set(deferred);
    }

    /// A context function with the `(top_index, is_at_bottom, is_at_top)` shape.
    pub fn function(&self) -> impl Fn(usize, bool, bool) -> LoadMoreOutcome + 'static {
        let probe = self.clone();
        move |top_index, is_at_bottom, is_at_top| {
            probe.record(ScrollContext {
                top_index,
                is_at_top,
                is_at_bottom,
            })
        }
    }

    pub fn record(&self, context: ScrollContext) -> LoadMoreOutcome {
        self.calls.borrow_mut().push(context);
        if !self.deferred.get() {
            return LoadMoreOutcome::Done;
        }
        let (sender, receiver) = oneshot::channel();
        self.pending.borrow_mut().push(sender);
        LoadMoreOutcome::deferred(async move {
            let _ = receiver.await;
        })
    }

    pub fn calls(&self) -> Vec<ScrollContext> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Resolves every outstanding deferred outcome.
    pub fn complete_all(&self) -> usize {
        let senders: Vec<_> = self.pending.borrow_mut().drain(..).collect();
        let count = senders.len();
        for sender in senders {
            let _ = sender.send(());
        }
        count
    }
}

pub struct FixtureBuilder {
    item_count: usize,
    item_height: f32,
    viewport_height: f32,
    list_offset_top: f32,
    kind: ScrollerKind,
    config: VirtualRepeatConfig,
    load_more: bool,
    resize_observer: Option<bool>,
}

impl FixtureBuilder {
    pub fn item_height(mut self, height: f32) -> Self {
        self.item_height = height;
        self
    }

    pub fn viewport_height(mut self, height: f32) -> Self {
        self.viewport_height = height;
        self
    }

    pub fn list_offset_top(mut self, offset: f32) -> Self {
        self.list_offset_top = offset;
        self
    }

    pub fn page_scroller(mut self) -> Self {
        self.kind = ScrollerKind::Page;
        self
    }

    pub fn config(mut self, config: VirtualRepeatConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds `infinite-scroll-next="getMore"` to a [`LoadMoreProbe`].
    pub fn with_load_more(mut self) -> Self {
        self.load_more = true;
        self
    }

    /// Installs a resize observer that reports `supported`.
    pub fn with_resize_observer(mut self, supported: bool) -> Self {
        self.resize_observer = Some(supported);
        self
    }

    /// Builds and binds, without attaching.
    pub fn build(self) -> Fixture {
        let clock = ManualClock::new();
        let runtime = Runtime::with_clock(Arc::new(DefaultScheduler), Arc::new(clock.clone()));
        let host = TestHost::new(self.viewport_height, self.item_height).with_kind(self.kind);
        host.update(|state| state.list_offset_top = self.list_offset_top);
        let list = ItemList::from_vec(runtime.handle(), (0..self.item_count as u32).collect());
        let context = TestBindingContext::new(BoundItems::List(list.clone()));
        let probe = LoadMoreProbe::new();

        let mut repeat = VirtualRepeat::new(
            runtime.handle(),
            host.container(),
            host.layout(),
            self.config,
        );
        let mut resize = None;
        if let Some(supported) = self.resize_observer {
            let (observer, handle) = host.resize_observer(supported);
            repeat = repeat.with_resize_observer(observer);
            resize = Some(handle);
        }

        let mut scope = BindingScope::new("item", context.clone());
        if self.load_more {
            context.set_function("getMore", probe.function());
            scope = scope.with_load_more(LoadMoreBinding::Named("getMore".into()));
        }
        if let Err(err) = repeat.bind(scope) {
            panic!("fixture binding rejected: {err}");
        }

        Fixture {
            runtime,
            clock,
            host,
            list,
            context,
            repeat,
            resize,
            probe,
            frame_time: Cell::new(0),
        }
    }

    /// Builds, attaches and settles the runtime.
    pub fn attached(self) -> Fixture {
        let fixture = self.build();
        if let Err(err) = fixture.attach() {
            panic!("fixture attach failed: {err}");
        }
        fixture.pump();
        fixture
    }
}

/// A controller over `0..n` with `u32` items in a [`TestHost`].
pub struct Fixture {
    pub runtime: Runtime,
    pub clock: ManualClock,
    pub host: TestHost,
    pub list: ItemList<u32>,
    pub context: Rc<TestBindingContext<u32>>,
    pub repeat: TestRepeat,
    pub resize: Option<ResizeHandle>,
    pub probe: LoadMoreProbe,
    frame_time: Cell<u64>,
}

impl Fixture {
    /// 20px items in a 400px viewport.
    pub fn builder(item_count: usize) -> FixtureBuilder {
        FixtureBuilder {
            item_count,
            item_height: 20.0,
            viewport_height: 400.0,
            list_offset_top: 0.0,
            kind: ScrollerKind::Fixed,
            config: VirtualRepeatConfig::default(),
            load_more: false,
            resize_observer: None,
        }
    }

    pub fn attach(&self) -> Result<(), ConfigError> {
        self.repeat.attach()
    }

    /// Moves the scroller and notifies the controller, without pumping.
    pub fn scroll_to(&self, scroll_top: f32) {
        self.host.update(|state| state.set_scroll_top(scroll_top));
        self.repeat.handle_scroll();
    }

    /// Scrolls, then drains the microtask queue.
    pub fn scroll_and_settle(&self, scroll_top: f32) {
        self.scroll_to(scroll_top);
        self.pump();
    }

    pub fn pump(&self) {
        self.runtime.pump();
    }

    /// Runs one frame (frame callbacks, then microtasks and tasks).
    pub fn frame(&self) {
        let time = self.frame_time.get() + FRAME_NANOS;
        self.frame_time.set(time);
        self.runtime.run_frame(time);
    }

    /// Advances the manual clock and fires due timers.
    pub fn advance(&self, millis: u64) {
        self.clock.advance(millis);
        self.runtime.pump();
    }

    pub fn indices(&self) -> Vec<usize> {
        self.repeat.with_container(|container| container.indices())
    }

    pub fn items(&self) -> Vec<u32> {
        self.repeat.with_container(|container| container.items())
    }

    pub fn view_ids(&self) -> Vec<u64> {
        self.repeat.with_container(|container| container.ids())
    }

    /// Checks the window, the rendered views and the host buffers agree.
    pub fn assert_consistent(&self) {
        let window = self.repeat.window();
        let count = self.list.len();
        assert!(
            window.is_consistent_with(count),
            "window {window:?} inconsistent with {count} items"
        );
        let expected: Vec<usize> = (window.first_index..window.first_index + window.length).collect();
        assert_eq!(self.indices(), expected, "views out of order");
        let expected_items: Vec<u32> = expected
            .iter()
            .filter_map(|&index| self.list.get(index))
            .collect();
        assert_eq!(self.items(), expected_items, "views bound to stale items");
        let state = self.host.state();
        assert_eq!(state.top_buffer_height, window.top_buffer_height);
        assert_eq!(state.bottom_buffer_height, window.bottom_buffer_height);
        assert_eq!(state.rendered_views, window.length);
    }
}
