//! The viewport controller.
//!
//! [`VirtualRepeat`] owns the rendered window and drives it from four inputs:
//! scroll notifications (coalesced on a microtask), change batches from the
//! bound list, resize notifications (recomputed on the next frame) and the
//! edge-triggered load-more protocol.
//!
//! Every deferred callback holds a `Weak` handle plus the attach epoch or a
//! resize token, so anything still queued after `detach` is a no-op.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use vrepeat_core::{FrameCallbackRegistration, RuntimeHandle, TaskHandle, TimerRegistration};

use crate::binding::{resolve_load_more, validate_load_more, BindingScope, LoadMoreBinding};
use crate::binding::{LoadMoreOutcome, ScrollContext};
use crate::config::VirtualRepeatConfig;
use crate::error::ConfigError;
use crate::events::VirtualizationEvent;
use crate::guard::{ActivityState, LoadMoreState, ScrollRequest};
use crate::layout::{LayoutAdapter, ScrollerKind};
use crate::resize::{ContentSize, ResizeObserver, ResizeTarget, ResizeWatcher};
use crate::source::{BoundItems, ChangeBatch, ItemSource, Subscription};
use crate::state::RepeatCore;
use crate::stats::RepeatStats;
use crate::strategy::{CollectionStrategy, PatchOutcome, StrategyLocator};
use crate::transition::{classify_transition, JumpDirection, ScrollTransition};
use crate::view::ViewContainer;
use crate::window::{ScrollerSnapshot, ViewWindow, VisibleRange};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lifecycle {
    #[default]
    Detached,
    /// Attached, waiting for the first item to measure a positive height.
    Initializing,
    Steady,
}

type Shared<T, C> = Rc<RefCell<RepeatInner<T, C>>>;
type WeakShared<T, C> = Weak<RefCell<RepeatInner<T, C>>>;

/// Virtualized repeat over a [`ViewContainer`].
///
/// Cloning yields another handle to the same controller. The controller must
/// not be called from inside its own container or layout callbacks, except
/// for [`VirtualRepeat::handle_scroll`], which defers itself when re-entered.
pub struct VirtualRepeat<T, C>
where
    T: Clone + 'static,
    C: ViewContainer<T> + 'static,
{
    inner: Shared<T, C>,
    runtime: RuntimeHandle,
}

impl<T, C> Clone for VirtualRepeat<T, C>
where
    T: Clone + 'static,
    C: ViewContainer<T> + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            runtime: self.runtime.clone(),
        }
    }
}

struct RepeatInner<T, C> {
    core: RepeatCore<T, C>,
    runtime: RuntimeHandle,
    locator: StrategyLocator,
    strategy: CollectionStrategy,
    scope: Option<BindingScope<T>>,
    source: ItemSource<T>,
    /// The binding reaches the list through a converter.
    indirect: bool,
    lifecycle: Lifecycle,
    epoch: u64,
    activity: ActivityState,
    load_more: LoadMoreState,
    previous_snapshot: ScrollerSnapshot,
    current_snapshot: ScrollerSnapshot,
    last_transition: Option<ScrollTransition>,
    /// List version the rendered window reflects.
    synced_version: Option<u64>,
    subscription: Option<Subscription>,
    resize: ResizeWatcher,
    resize_observer: Option<Box<dyn ResizeObserver>>,
    sizing_retry: Option<TimerRegistration>,
    sizing_attempts: u32,
    page_offset_poll: Option<TimerRegistration>,
    load_more_frame: Option<FrameCallbackRegistration>,
    load_more_task: Option<TaskHandle>,
}

impl<T, C> VirtualRepeat<T, C>
where
    T: Clone + 'static,
    C: ViewContainer<T> + 'static,
{
    pub fn new(
        runtime: RuntimeHandle,
        container: C,
        layout: impl LayoutAdapter + 'static,
        config: VirtualRepeatConfig,
    ) -> Self {
        let inner = RepeatInner {
            core: RepeatCore::new(container, Box::new(layout), config),
            runtime: runtime.clone(),
            locator: StrategyLocator::default(),
            strategy: CollectionStrategy::Null,
            scope: None,
            source: ItemSource::Empty,
            indirect: false,
            lifecycle: Lifecycle::Detached,
            epoch: 0,
            activity: ActivityState::Idle,
            load_more: LoadMoreState::Idle,
            previous_snapshot: ScrollerSnapshot::default(),
            current_snapshot: ScrollerSnapshot::default(),
            last_transition: None,
            synced_version: None,
            subscription: None,
            resize: ResizeWatcher::default(),
            resize_observer: None,
            sizing_retry: None,
            sizing_attempts: 0,
            page_offset_poll: None,
            load_more_frame: None,
            load_more_task: None,
        };
        Self {
            inner: Rc::new(RefCell::new(inner)),
            runtime,
        }
    }

    /// Uses native size observation instead of manual
    /// [`VirtualizationEvent`]s.
    pub fn with_resize_observer(self, observer: impl ResizeObserver + 'static) -> Self {
        self.inner.borrow_mut().resize_observer = Some(Box::new(observer));
        self
    }

    pub fn with_strategy_locator(self, locator: StrategyLocator) -> Self {
        self.inner.borrow_mut().locator = locator;
        self
    }

    /// Associates the binding scope. Fails if a load-more binding is present
    /// but not callable. Views are untouched until the next attach or
    /// `items_changed`.
    pub fn bind(&self, scope: BindingScope<T>) -> Result<(), ConfigError> {
        validate_load_more(&scope)?;
        let mut inner = self.inner.borrow_mut();
        inner.core.item_name = scope.item_name.clone();
        inner.scope = Some(scope);
        Ok(())
    }

    /// Clears the binding scope and stops listening for mutations.
    pub fn unbind(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.subscription = None;
        inner.scope = None;
    }

    /// Attaches to the layout and renders the first window.
    ///
    /// On error the controller is left detached.
    pub fn attach(&self) -> Result<(), ConfigError> {
        let weak = Rc::downgrade(&self.inner);
        self.inner.borrow_mut().attach(&weak)
    }

    pub fn detach(&self) {
        self.inner.borrow_mut().detach();
    }

    /// Re-evaluates the bound collection and rebuilds the window at the
    /// current scroll position. A no-op while detached.
    pub fn items_changed(&self) -> Result<(), ConfigError> {
        let weak = Rc::downgrade(&self.inner);
        let mut inner = self.inner.borrow_mut();
        if inner.lifecycle == Lifecycle::Detached {
            log::debug!("virtual repeat: items_changed while detached ignored");
            return Ok(());
        }
        inner.items_changed(&weak)
    }

    /// Scroll notification from the host.
    pub fn handle_scroll(&self) {
        let weak = Rc::downgrade(&self.inner);
        RepeatInner::enter(&weak, &self.runtime, |inner, weak| {
            inner.on_scroll_notification(weak)
        });
    }

    /// Manual resize notification for hosts without a [`ResizeObserver`].
    pub fn dispatch_event(&self, event: VirtualizationEvent) {
        let weak = Rc::downgrade(&self.inner);
        let mut inner = self.inner.borrow_mut();
        if inner.lifecycle == Lifecycle::Detached {
            return;
        }
        log::trace!("virtual repeat: {}", event.name());
        let token = inner.resize.bump();
        inner.schedule_resize_recompute(&weak, token);
    }

    pub fn window(&self) -> ViewWindow {
        self.inner.borrow().core.window
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.borrow().lifecycle
    }

    pub fn stats(&self) -> RepeatStats {
        self.inner.borrow().core.stats()
    }

    pub fn last_transition(&self) -> Option<ScrollTransition> {
        self.inner.borrow().last_transition
    }

    /// Previous and current scroller snapshots.
    pub fn snapshots(&self) -> (ScrollerSnapshot, ScrollerSnapshot) {
        let inner = self.inner.borrow();
        (inner.previous_snapshot, inner.current_snapshot)
    }

    pub fn item_count(&self) -> usize {
        self.inner.borrow().source.len()
    }

    pub fn min_views(&self) -> usize {
        self.inner.borrow().core.min_views
    }

    pub fn scroller_kind(&self) -> ScrollerKind {
        self.inner.borrow().core.scroller_kind
    }

    pub fn load_more_state(&self) -> LoadMoreState {
        self.inner.borrow().load_more
    }

    pub fn activity(&self) -> ActivityState {
        self.inner.borrow().activity
    }

    pub fn strategy(&self) -> CollectionStrategy {
        self.inner.borrow().strategy
    }

    pub fn with_container<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.inner.borrow().core.container)
    }
}

impl<T, C> fmt::Debug for VirtualRepeat<T, C>
where
    T: Clone + 'static,
    C: ViewContainer<T> + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("VirtualRepeat")
                .field("lifecycle", &inner.lifecycle)
                .field("window", &inner.core.window)
                .field("activity", &inner.activity)
                .field("load_more", &inner.load_more)
                .finish(),
            Err(_) => f.write_str("VirtualRepeat { <busy> }"),
        }
    }
}

impl<T, C> RepeatInner<T, C>
where
    T: Clone + 'static,
    C: ViewContainer<T> + 'static,
{
    /// Runs `f` against the controller. If it is mid-call (a host callback
    /// re-entered it), `f` is retried on the next frame.
    fn enter(
        weak: &WeakShared<T, C>,
        runtime: &RuntimeHandle,
        f: impl FnOnce(&mut Self, &WeakShared<T, C>) + 'static,
    ) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let Ok(mut this) = inner.try_borrow_mut() else {
            log::trace!("virtual repeat busy; retrying on next frame");
            let weak = weak.clone();
            let retry = runtime.clone();
            runtime.register_frame_callback(move |_| Self::enter(&weak, &retry, f));
            return;
        };
        f(&mut this, weak);
    }

    // Lifecycle

    fn attach(&mut self, weak: &WeakShared<T, C>) -> Result<(), ConfigError> {
        if self.lifecycle != Lifecycle::Detached {
            log::debug!("virtual repeat: already attached");
            return Ok(());
        }
        if self.scope.is_none() {
            return Err(ConfigError::NotBound);
        }
        self.epoch += 1;
        self.lifecycle = Lifecycle::Initializing;
        self.core.scroller_kind = self.core.layout.scroll_container();
        self.core.buffers = Some(self.core.layout.create_buffers());
        self.core.distance_to_top = self.core.layout.list_offset_top();
        if self.core.scroller_kind == ScrollerKind::Page {
            self.arm_page_offset_poll(weak);
        }
        let snapshot = self.core.layout.scroller_snapshot();
        self.previous_snapshot = snapshot;
        self.current_snapshot = snapshot;

        if let Err(err) = self.items_changed(weak) {
            self.detach();
            return Err(err);
        }
        log::debug!(
            "virtual repeat attached ({:?}): {} item(s), window {:?}",
            self.core.scroller_kind,
            self.source.len(),
            self.core.window.range()
        );
        Ok(())
    }

    fn detach(&mut self) {
        if self.lifecycle == Lifecycle::Detached {
            return;
        }
        self.epoch += 1;
        self.lifecycle = Lifecycle::Detached;
        self.subscription = None;
        if self.resize.is_installed() {
            if let Some(observer) = self.resize_observer.as_mut() {
                observer.disconnect();
            }
        }
        self.resize.reset();
        self.sizing_retry = None;
        self.sizing_attempts = 0;
        self.page_offset_poll = None;
        self.load_more_frame = None;
        if let Some(task) = self.load_more_task.take() {
            task.cancel();
        }
        self.load_more = LoadMoreState::Idle;
        self.activity = ActivityState::Idle;

        self.core.remove_all_views();
        if let Some(buffers) = self.core.buffers.take() {
            self.core.layout.remove_buffers(buffers);
        }
        self.core.window = ViewWindow::default();
        self.core.min_views = 0;
        self.core.distance_to_top = 0.0;
        self.previous_snapshot = ScrollerSnapshot::default();
        self.current_snapshot = ScrollerSnapshot::default();
        self.last_transition = None;
        self.synced_version = None;
        self.source = ItemSource::Empty;
        self.strategy = CollectionStrategy::Null;
        self.indirect = false;
        log::debug!("virtual repeat detached");
    }

    fn items_changed(&mut self, weak: &WeakShared<T, C>) -> Result<(), ConfigError> {
        let scope = self.scope.as_ref().ok_or(ConfigError::NotBound)?;
        let bound = scope.context.evaluate_items();
        let strategy = self
            .locator
            .locate(&bound)
            .ok_or_else(|| ConfigError::NotIterable {
                found: bound.describe(),
            })?;

        self.subscription = None;
        self.indirect = matches!(bound, BoundItems::Converted { .. });
        if let Some(list) = bound.observable() {
            let weak = weak.clone();
            let runtime = self.runtime.clone();
            self.subscription = Some(list.subscribe(move |batch| {
                let batch = batch.clone();
                Self::enter(&weak, &runtime, move |inner, weak| {
                    inner.handle_mutation(weak, &batch)
                });
            }));
        }
        self.strategy = strategy;
        self.source = ItemSource::from_bound(&bound);
        self.resync(weak);
        Ok(())
    }

    /// Sizes the source and rebuilds the window at the current scroll position.
    fn resync(&mut self, weak: &WeakShared<T, C>) {
        let sizing = self.strategy.size_for_source(&mut self.core, &self.source);
        if sizing.reset {
            self.sizing_retry = None;
            self.synced_version = self.source.observed_version();
            self.lifecycle = Lifecycle::Steady;
            return;
        }
        if !sizing.succeeded {
            self.lifecycle = Lifecycle::Initializing;
            self.arm_sizing_retry(weak);
            return;
        }
        self.sizing_retry = None;
        self.sizing_attempts = 0;

        let snapshot = self.core.layout.scroller_snapshot();
        self.previous_snapshot = snapshot;
        self.current_snapshot = snapshot;
        let start = self
            .strategy
            .visible_range(&self.core, self.source.len(), &snapshot)
            .map_or(0, |range| range.start);
        self.strategy
            .instantiate_window(&mut self.core, &self.source, start, true);
        self.synced_version = self.source.observed_version();
        if sizing.observe_scroller {
            self.install_resize_watcher(weak);
        }
        self.lifecycle = Lifecycle::Steady;
    }

    // Timers

    fn arm_sizing_retry(&mut self, weak: &WeakShared<T, C>) {
        if self.sizing_retry.is_some() {
            return;
        }
        let weak = weak.clone();
        let runtime = self.runtime.clone();
        self.sizing_retry = self
            .runtime
            .set_interval(self.core.config.sizing_retry_interval, move || {
                Self::enter(&weak, &runtime, |inner, weak| inner.retry_sizing(weak));
            });
    }

    fn retry_sizing(&mut self, weak: &WeakShared<T, C>) {
        if self.lifecycle == Lifecycle::Detached {
            self.sizing_retry = None;
            return;
        }
        self.sizing_attempts += 1;
        if self.core.measure_first_item().is_some() {
            log::debug!(
                "virtual repeat: item sized after {} retr(ies)",
                self.sizing_attempts
            );
            self.sizing_retry = None;
            self.sizing_attempts = 0;
            if let Err(err) = self.items_changed(weak) {
                log::warn!("virtual repeat: recompute after sizing failed: {err}");
            }
        } else if self.sizing_attempts >= self.core.config.sizing_retry_limit {
            log::warn!(
                "virtual repeat: first item still has no height after {} attempts; giving up",
                self.sizing_attempts
            );
            self.sizing_retry = None;
        }
    }

    fn arm_page_offset_poll(&mut self, weak: &WeakShared<T, C>) {
        let weak = weak.clone();
        let runtime = self.runtime.clone();
        self.page_offset_poll =
            self.runtime
                .set_interval(self.core.config.page_offset_poll_interval, move || {
                    Self::enter(&weak, &runtime, |inner, weak| {
                        let distance = inner.core.layout.list_offset_top();
                        if (distance - inner.core.distance_to_top).abs() > f32::EPSILON {
                            log::trace!("virtual repeat: list offset now {distance}");
                            inner.core.distance_to_top = distance;
                            inner.on_scroll_notification(weak);
                        }
                    });
                });
    }

    // Resize

    fn install_resize_watcher(&mut self, weak: &WeakShared<T, C>) {
        if self.resize.is_installed() {
            return;
        }
        let Some(observer) = self.resize_observer.as_mut() else {
            return;
        };
        if !observer.is_supported() {
            log::debug!("virtual repeat: no native resize observation, use VirtualizationEvent");
            return;
        }
        for target in [ResizeTarget::Scroller, ResizeTarget::FirstItem] {
            let weak = weak.clone();
            let runtime = self.runtime.clone();
            observer.observe(
                target,
                Rc::new(move |size: ContentSize| {
                    Self::enter(&weak, &runtime, move |inner, weak| {
                        inner.on_resize(weak, target, size)
                    });
                }),
            );
        }
        self.resize.mark_installed();
    }

    fn on_resize(&mut self, weak: &WeakShared<T, C>, target: ResizeTarget, size: ContentSize) {
        if self.lifecycle == Lifecycle::Detached {
            return;
        }
        match self.resize.record(target, size) {
            Some(token) => self.schedule_resize_recompute(weak, token),
            None => log::trace!("virtual repeat: duplicate {target:?} size {size:?} ignored"),
        }
    }

    fn schedule_resize_recompute(&mut self, weak: &WeakShared<T, C>, token: u64) {
        let weak = weak.clone();
        let runtime = self.runtime.clone();
        let slot = Rc::clone(&self.resize.pending);
        self.runtime.frame_clock().request_into(&slot, move |_| {
            Self::enter(&weak, &runtime, move |inner, weak| {
                if inner.lifecycle == Lifecycle::Detached || !inner.resize.is_current(token) {
                    return;
                }
                inner.core.distance_to_top = inner.core.layout.list_offset_top();
                inner.resync(weak);
            });
        });
    }

    // Scrolling

    fn on_scroll_notification(&mut self, weak: &WeakShared<T, C>) {
        if self.lifecycle != Lifecycle::Steady {
            return;
        }
        self.previous_snapshot = self.current_snapshot;
        self.current_snapshot = self.core.layout.scroller_snapshot();
        match self.activity.request_scroll() {
            ScrollRequest::Schedule => self.queue_scroll(weak),
            ScrollRequest::Coalesced => {}
            ScrollRequest::Deferred => log::trace!("virtual repeat: scroll deferred by mutation"),
        }
    }

    fn queue_scroll(&self, weak: &WeakShared<T, C>) {
        let weak = weak.clone();
        let runtime = self.runtime.clone();
        let epoch = self.epoch;
        self.runtime.enqueue_microtask(move || {
            Self::enter(&weak, &runtime, move |inner, weak| {
                if inner.epoch != epoch || inner.lifecycle != Lifecycle::Steady {
                    return;
                }
                if inner.activity.begin_scroll() {
                    inner.process_scroll(weak);
                }
            });
        });
    }

    fn process_scroll(&mut self, weak: &WeakShared<T, C>) {
        let count = self.source.len();
        let snapshot = self.current_snapshot;
        let Some(new_range) = self.strategy.visible_range(&self.core, count, &snapshot) else {
            return;
        };
        let Some(old_range) = self.core.window.range() else {
            self.strategy
                .instantiate_window(&mut self.core, &self.source, new_range.start, true);
            self.synced_version = self.source.observed_version();
            return;
        };

        let transition = classify_transition(old_range, new_range);
        log::trace!("virtual repeat: {old_range:?} -> {new_range:?} = {transition:?}");
        self.last_transition = Some(transition);
        let threshold = self.core.config.edge_threshold;
        let near_top = |strategy: CollectionStrategy, start: usize| strategy.is_near_top(threshold, start);
        let near_bottom =
            |strategy: CollectionStrategy, end: usize| strategy.is_near_bottom(threshold, count, end);
        let strategy = self.strategy;

        match transition {
            ScrollTransition::PinnedBottom => {
                if near_bottom(strategy, new_range.end) {
                    self.signal_load_more(weak, false, true);
                }
            }
            ScrollTransition::PinnedTop => {
                if near_top(strategy, new_range.start) {
                    self.signal_load_more(weak, true, false);
                }
            }
            ScrollTransition::ScrollDown { moved } => {
                self.recycle(moved, true);
                strategy.instantiate_window(&mut self.core, &self.source, new_range.start, false);
                if near_bottom(strategy, new_range.end) {
                    self.signal_load_more(weak, false, true);
                }
            }
            ScrollTransition::ScrollUp { moved } => {
                self.recycle(moved, false);
                strategy.instantiate_window(&mut self.core, &self.source, new_range.start, false);
                if near_top(strategy, new_range.start) {
                    self.signal_load_more(weak, true, false);
                }
            }
            ScrollTransition::Jump { direction } => {
                let range = self.rebuild(&snapshot).unwrap_or(new_range);
                match direction {
                    JumpDirection::Down if near_bottom(strategy, range.end) => {
                        self.signal_load_more(weak, false, true)
                    }
                    JumpDirection::Up if near_top(strategy, range.start) => {
                        self.signal_load_more(weak, true, false)
                    }
                    _ => {}
                }
            }
            ScrollTransition::Unclassified => {
                log::warn!(
                    "virtual repeat: unclassified transition {old_range:?} -> {new_range:?}, remeasuring"
                );
                self.core.stats.unclassified_transitions += 1;
                let range = self.rebuild(&snapshot).unwrap_or(new_range);
                let at_top = near_top(strategy, range.start);
                let at_bottom = near_bottom(strategy, range.end);
                self.signal_load_more(weak, at_top, at_bottom);
            }
        }

        if !transition.requires_rebuild() && self.has_unsynced_changes() {
            // A change batch is still queued; render current data now and
            // let the stale batch be skipped.
            let first = self.core.window.first_index;
            strategy.instantiate_window(&mut self.core, &self.source, first, true);
            self.synced_version = self.source.observed_version();
        }
    }

    /// Moves `moved` views from head to tail (`down`) or tail to head.
    fn recycle(&mut self, moved: usize, down: bool) {
        let len = self.core.container.view_count();
        if len == 0 {
            return;
        }
        let moved = moved.min(len);
        for _ in 0..moved {
            if down {
                self.core.container.move_view(0, len - 1);
            } else {
                self.core.container.move_view(len - 1, 0);
            }
        }
        self.core.stats.views_moved += moved;
    }

    fn rebuild(&mut self, snapshot: &ScrollerSnapshot) -> Option<VisibleRange> {
        let range = self
            .strategy
            .remeasure(&mut self.core, &self.source, snapshot);
        self.synced_version = self.source.observed_version();
        range
    }

    fn has_unsynced_changes(&self) -> bool {
        match (self.source.live_version(), self.synced_version) {
            (Some(live), Some(synced)) => live != synced,
            _ => false,
        }
    }

    // Load-more

    fn signal_load_more(&mut self, weak: &WeakShared<T, C>, at_top: bool, at_bottom: bool) {
        if !(at_top || at_bottom) {
            return;
        }
        let enabled = self
            .scope
            .as_ref()
            .is_some_and(|scope| !matches!(scope.load_more, LoadMoreBinding::Absent));
        if !enabled {
            return;
        }
        if !self.load_more.try_schedule() {
            log::trace!("virtual repeat: load-more already {:?}", self.load_more);
            return;
        }
        let context = ScrollContext {
            top_index: self.core.window.first_index,
            is_at_top: at_top,
            is_at_bottom: at_bottom,
        };
        let weak = weak.clone();
        let runtime = self.runtime.clone();
        let epoch = self.epoch;
        self.load_more_frame = self.runtime.frame_clock().with_frame_nanos(move |_| {
            Self::enter(&weak, &runtime, move |inner, weak| {
                inner.begin_load_more(weak, epoch, context)
            });
        });
        if self.load_more_frame.is_none() {
            self.load_more.complete();
        }
    }

    fn begin_load_more(&mut self, weak: &WeakShared<T, C>, epoch: u64, context: ScrollContext) {
        self.load_more_frame = None;
        if self.epoch != epoch || self.lifecycle == Lifecycle::Detached {
            return;
        }
        if self.core.container.view_count() == 0 {
            self.load_more.complete();
            return;
        }
        let Some(handler) = self.scope.as_ref().and_then(resolve_load_more) else {
            self.load_more.complete();
            return;
        };
        if !self.load_more.start() {
            return;
        }
        self.core.stats.load_more_calls += 1;
        log::debug!("virtual repeat: requesting more items at {context:?}");

        // The handler runs outside the borrow so it may mutate the list.
        let weak = weak.clone();
        let runtime = self.runtime.clone();
        self.runtime.enqueue_microtask(move || {
            let current = weak.upgrade().is_some_and(|inner| {
                inner.try_borrow().map_or(true, |inner| inner.epoch == epoch)
            });
            if !current {
                log::debug!("virtual repeat: detached before load-more ran; dropped");
                return;
            }
            let outcome = handler.invoke(&context);
            Self::enter(&weak, &runtime, move |inner, weak| {
                inner.finish_load_more(weak, epoch, outcome)
            });
        });
    }

    fn finish_load_more(&mut self, weak: &WeakShared<T, C>, epoch: u64, outcome: LoadMoreOutcome) {
        if self.epoch != epoch {
            return;
        }
        match outcome {
            LoadMoreOutcome::Done => self.load_more.complete(),
            LoadMoreOutcome::Deferred(future) => {
                let weak = weak.clone();
                let runtime = self.runtime.clone();
                let task = self.runtime.spawn_ui(async move {
                    future.await;
                    Self::enter(&weak, &runtime, move |inner, _| {
                        if inner.epoch == epoch {
                            inner.load_more.complete();
                            inner.load_more_task = None;
                        }
                    });
                });
                match task {
                    Some(task) => self.load_more_task = Some(task),
                    None => self.load_more.complete(),
                }
            }
        }
    }

    // Mutations

    fn handle_mutation(&mut self, weak: &WeakShared<T, C>, batch: &ChangeBatch) {
        match self.lifecycle {
            Lifecycle::Detached => return,
            Lifecycle::Initializing => {
                if self.sizing_retry.is_none() {
                    if let Err(err) = self.items_changed(weak) {
                        log::warn!("virtual repeat: recompute after mutation failed: {err}");
                    }
                }
                return;
            }
            Lifecycle::Steady => {}
        }
        if self.synced_version.is_some_and(|synced| batch.version <= synced) {
            log::trace!("virtual repeat: skipping stale batch v{}", batch.version);
            return;
        }

        if self.indirect {
            if !self.activity.begin_mutation() {
                log::trace!("virtual repeat: nested converter notification ignored");
                return;
            }
            self.resync_converted(weak);
        } else {
            self.activity.begin_mutation();
            let strategy = self.strategy;
            match strategy.patch_for_mutation(&mut self.core, &self.source, &batch.splices) {
                PatchOutcome::NeedsRecompute => self.resync(weak),
                PatchOutcome::Patched { anchor_shift } => {
                    if anchor_shift != 0 {
                        self.preserve_anchor(anchor_shift);
                    }
                }
            }
        }
        self.synced_version = Some(
            self.synced_version
                .map_or(batch.version, |synced| synced.max(batch.version)),
        );
        self.queue_mutation_reset(weak);
    }

    /// Re-evaluates a converted binding and rebinds the window in place.
    fn resync_converted(&mut self, weak: &WeakShared<T, C>) {
        let Some(scope) = self.scope.as_ref() else {
            return;
        };
        let bound = scope.context.evaluate_items();
        let same_list = match (&self.source, bound.observable()) {
            (ItemSource::Derived { source, .. }, Some(list)) => source.ptr_eq(list),
            _ => false,
        };
        if !same_list {
            if let Err(err) = self.items_changed(weak) {
                log::warn!("virtual repeat: converted binding no longer valid: {err}");
            }
            return;
        }
        self.source = ItemSource::from_bound(&bound);
        if self.core.window.item_height <= 0.0 {
            self.resync(weak);
            return;
        }
        let first = self.core.window.first_index;
        let strategy = self.strategy;
        strategy.instantiate_window(&mut self.core, &self.source, first, true);
    }

    /// Scrolls by `shift` rows so the same items stay on screen.
    fn preserve_anchor(&mut self, shift: isize) {
        let current = self.core.layout.scroller_snapshot();
        let target = (current.scroll_top + shift as f32 * self.core.window.item_height).max(0.0);
        self.core.layout.set_scroll_top(target);
        let snapshot = self.core.layout.scroller_snapshot();
        self.previous_snapshot = snapshot;
        self.current_snapshot = snapshot;
    }

    fn queue_mutation_reset(&self, weak: &WeakShared<T, C>) {
        let weak = weak.clone();
        let runtime = self.runtime.clone();
        let epoch = self.epoch;
        self.runtime.enqueue_microtask(move || {
            Self::enter(&weak, &runtime, move |inner, weak| {
                if inner.epoch != epoch {
                    return;
                }
                if inner.activity.end_mutation()
                    && inner.activity.request_scroll() == ScrollRequest::Schedule
                {
                    inner.queue_scroll(weak);
                }
            });
        });
    }
}
