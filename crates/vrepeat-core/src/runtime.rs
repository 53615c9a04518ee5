use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use crate::collections::map::HashMap;
use crate::frame_clock::FrameClock;
use crate::platform::{Clock, DefaultScheduler, RuntimeScheduler, SystemClock};
use crate::timer::TimerRegistration;

pub type FrameCallbackId = u64;
pub type TimerId = u64;

type Microtask = Box<dyn FnOnce() + 'static>;

struct FrameCallbackEntry {
    id: FrameCallbackId,
    callback: Option<Box<dyn FnOnce(u64) + 'static>>,
}

struct TaskEntry {
    id: u64,
    future: Pin<Box<dyn Future<Output = ()> + 'static>>,
}

struct TimerEntry {
    deadline: u64,
    /// `Some` for repeating timers.
    period: Option<u64>,
    callback: Rc<dyn Fn() + 'static>,
}

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    clock: Arc<dyn Clock>,
    needs_frame: Cell<bool>,
    microtasks: RefCell<VecDeque<Microtask>>,
    frame_callbacks: RefCell<VecDeque<FrameCallbackEntry>>,
    next_frame_callback_id: Cell<u64>,
    tasks: RefCell<Vec<TaskEntry>>,
    next_task_id: Cell<u64>,
    task_waker: RefCell<Option<Waker>>,
    timers: RefCell<HashMap<TimerId, TimerEntry>>,
    next_timer_id: Cell<u64>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            scheduler,
            clock,
            needs_frame: Cell::new(false),
            microtasks: RefCell::new(VecDeque::new()),
            frame_callbacks: RefCell::new(VecDeque::new()),
            next_frame_callback_id: Cell::new(1),
            tasks: RefCell::new(Vec::new()),
            next_task_id: Cell::new(1),
            task_waker: RefCell::new(None),
            timers: RefCell::new(HashMap::default()),
            next_timer_id: Cell::new(1),
        }
    }

    fn init_task_waker(this: &Rc<Self>) {
        let waker = RuntimeTaskWaker {
            scheduler: Arc::clone(&this.scheduler),
        }
        .into_waker();
        *this.task_waker.borrow_mut() = Some(waker);
    }

    fn schedule(&self) {
        self.needs_frame.set(true);
        self.scheduler.schedule_frame();
    }

    /// Queues a closure to run on the next microtask drain.
    ///
    /// The closure may capture `Rc`/`RefCell` values because it never leaves
    /// the runtime thread.
    fn enqueue_microtask(&self, task: Microtask) {
        self.microtasks.borrow_mut().push_back(task);
        self.schedule();
    }

    fn drain_microtasks(&self) -> bool {
        let mut executed = false;
        loop {
            let task = self.microtasks.borrow_mut().pop_front();
            match task {
                Some(task) => {
                    executed = true;
                    task();
                }
                None => break,
            }
        }
        executed
    }

    fn spawn_task(&self, future: Pin<Box<dyn Future<Output = ()> + 'static>>) -> u64 {
        let id = self.next_task_id.get();
        self.next_task_id.set(id + 1);
        self.tasks.borrow_mut().push(TaskEntry { id, future });
        self.schedule();
        id
    }

    fn cancel_task(&self, id: u64) {
        self.tasks.borrow_mut().retain(|entry| entry.id != id);
    }

    fn poll_tasks(&self) -> bool {
        let waker = match self.task_waker.borrow().as_ref() {
            Some(waker) => waker.clone(),
            None => return false,
        };
        let mut cx = Context::from_waker(&waker);
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        if tasks.is_empty() {
            return false;
        }
        let mut pending = Vec::with_capacity(tasks.len());
        let mut made_progress = false;
        for mut entry in tasks {
            match entry.future.as_mut().poll(&mut cx) {
                Poll::Ready(()) => made_progress = true,
                Poll::Pending => pending.push(entry),
            }
        }
        if !pending.is_empty() {
            // Tasks spawned while polling were pushed into the (now empty) vec.
            let mut tasks = self.tasks.borrow_mut();
            pending.append(&mut tasks);
            *tasks = pending;
        }
        made_progress
    }

    fn register_frame_callback(&self, callback: Box<dyn FnOnce(u64) + 'static>) -> FrameCallbackId {
        let id = self.next_frame_callback_id.get();
        self.next_frame_callback_id.set(id + 1);
        self.frame_callbacks
            .borrow_mut()
            .push_back(FrameCallbackEntry {
                id,
                callback: Some(callback),
            });
        self.schedule();
        id
    }

    fn cancel_frame_callback(&self, id: FrameCallbackId) {
        let mut callbacks = self.frame_callbacks.borrow_mut();
        if let Some(index) = callbacks.iter().position(|entry| entry.id == id) {
            callbacks.remove(index);
        }
    }

    fn drain_frame_callbacks(&self, frame_time_nanos: u64) {
        // Callbacks registered while draining wait for the next frame.
        let pending: Vec<_> = self
            .frame_callbacks
            .borrow_mut()
            .drain(..)
            .filter_map(|mut entry| entry.callback.take())
            .collect();
        for callback in pending {
            callback(frame_time_nanos);
        }
    }

    fn set_timer(
        &self,
        delay_ms: u64,
        period: Option<u64>,
        callback: Rc<dyn Fn() + 'static>,
    ) -> TimerId {
        let id = self.next_timer_id.get();
        self.next_timer_id.set(id + 1);
        let deadline = self.clock.now_millis().saturating_add(delay_ms);
        self.timers.borrow_mut().insert(
            id,
            TimerEntry {
                deadline,
                period: period.map(|p| p.max(1)),
                callback,
            },
        );
        id
    }

    fn cancel_timer(&self, id: TimerId) {
        self.timers.borrow_mut().remove(&id);
    }

    /// Fires every timer whose deadline has passed, once each.
    fn fire_due_timers(&self) -> bool {
        let now = self.clock.now_millis();
        let mut due: Vec<(u64, TimerId)> = self
            .timers
            .borrow()
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(&id, entry)| (entry.deadline, id))
            .collect();
        if due.is_empty() {
            return false;
        }
        due.sort_unstable();
        let mut fired = false;
        for (_, id) in due {
            // An earlier callback in this batch may have cancelled this one.
            let callback = {
                let mut timers = self.timers.borrow_mut();
                let Some(entry) = timers.get_mut(&id) else {
                    continue;
                };
                let callback = Rc::clone(&entry.callback);
                match entry.period {
                    Some(period) => entry.deadline = entry.deadline.saturating_add(period),
                    None => {
                        timers.remove(&id);
                    }
                }
                callback
            };
            fired = true;
            callback();
        }
        fired
    }

    fn pump(&self) -> bool {
        let mut any = false;
        loop {
            let mut progressed = self.drain_microtasks();
            progressed |= self.poll_tasks();
            progressed |= self.fire_due_timers();
            if !progressed {
                break;
            }
            any = true;
        }
        if !self.has_pending_work() {
            self.needs_frame.set(false);
        }
        any
    }

    fn has_pending_work(&self) -> bool {
        let microtasks = self
            .microtasks
            .try_borrow()
            .map(|queue| !queue.is_empty())
            .unwrap_or(true);
        let frames = self
            .frame_callbacks
            .try_borrow()
            .map(|queue| !queue.is_empty())
            .unwrap_or(true);
        microtasks || frames
    }
}

/// Owner of the runtime. Dropping the last `Runtime` invalidates every handle.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self::with_clock(scheduler, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(scheduler: Arc<dyn RuntimeScheduler>, clock: Arc<dyn Clock>) -> Self {
        let inner = Rc::new(RuntimeInner::new(scheduler, clock));
        RuntimeInner::init_task_waker(&inner);
        Self { inner }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Runs microtasks, polls spawned tasks and fires due timers until quiescent.
    ///
    /// Returns whether any work ran.
    pub fn pump(&self) -> bool {
        self.inner.pump()
    }

    /// Runs the frame callbacks registered before this call, then pumps.
    pub fn run_frame(&self, frame_time_nanos: u64) {
        self.inner.drain_frame_callbacks(frame_time_nanos);
        self.inner.pump();
    }

    pub fn needs_frame(&self) -> bool {
        self.inner.needs_frame.get()
    }

    pub fn has_pending_work(&self) -> bool {
        self.inner.has_pending_work()
    }

    pub fn has_frame_callbacks(&self) -> bool {
        !self.inner.frame_callbacks.borrow().is_empty()
    }

    pub fn pending_task_count(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    pub fn now_millis(&self) -> u64 {
        self.inner.clock.now_millis()
    }

    pub fn frame_clock(&self) -> FrameClock {
        FrameClock::new(self.handle())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(DefaultScheduler))
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("needs_frame", &self.inner.needs_frame.get())
            .field("timers", &self.inner.timers.borrow().len())
            .finish()
    }
}

/// Weak handle to a [`Runtime`]. Every operation is a no-op once the runtime is gone.
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Weak<RuntimeInner>,
}

impl RuntimeHandle {
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Schedules `task` to run at the next microtask drain, after the current
    /// synchronous work finishes.
    pub fn enqueue_microtask(&self, task: impl FnOnce() + 'static) {
        match self.inner.upgrade() {
            Some(inner) => inner.enqueue_microtask(Box::new(task)),
            None => log::debug!("runtime dropped; discarding microtask"),
        }
    }

    pub fn spawn_ui<F>(&self, fut: F) -> Option<TaskHandle>
    where
        F: Future<Output = ()> + 'static,
    {
        self.inner.upgrade().map(|inner| {
            let id = inner.spawn_task(Box::pin(fut));
            TaskHandle {
                id,
                runtime: self.clone(),
            }
        })
    }

    pub fn cancel_task(&self, id: u64) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel_task(id);
        }
    }

    pub fn register_frame_callback(
        &self,
        callback: impl FnOnce(u64) + 'static,
    ) -> Option<FrameCallbackId> {
        self.inner
            .upgrade()
            .map(|inner| inner.register_frame_callback(Box::new(callback)))
    }

    pub fn cancel_frame_callback(&self, id: FrameCallbackId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel_frame_callback(id);
        }
    }

    pub fn frame_clock(&self) -> FrameClock {
        FrameClock::new(self.clone())
    }

    /// Runs `callback` once after `delay`. Dropping the registration cancels it.
    pub fn set_timeout(
        &self,
        delay: Duration,
        callback: impl Fn() + 'static,
    ) -> Option<TimerRegistration> {
        let inner = self.inner.upgrade()?;
        let id = inner.set_timer(duration_millis(delay), None, Rc::new(callback));
        Some(TimerRegistration::new(self.clone(), id))
    }

    /// Runs `callback` every `period` until the registration is cancelled or dropped.
    pub fn set_interval(
        &self,
        period: Duration,
        callback: impl Fn() + 'static,
    ) -> Option<TimerRegistration> {
        let inner = self.inner.upgrade()?;
        let millis = duration_millis(period);
        let id = inner.set_timer(millis, Some(millis), Rc::new(callback));
        Some(TimerRegistration::new(self.clone(), id))
    }

    pub fn cancel_timer(&self, id: TimerId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel_timer(id);
        }
    }

    pub fn has_timer(&self, id: TimerId) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.timers.borrow().contains_key(&id))
            .unwrap_or(false)
    }

    pub fn now_millis(&self) -> u64 {
        self.inner
            .upgrade()
            .map(|inner| inner.clock.now_millis())
            .unwrap_or(0)
    }

    pub fn pump(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.pump())
            .unwrap_or(false)
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Handle to a spawned UI future.
#[derive(Debug)]
pub struct TaskHandle {
    id: u64,
    runtime: RuntimeHandle,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(self) {
        self.runtime.cancel_task(self.id);
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

struct RuntimeTaskWaker {
    scheduler: Arc<dyn RuntimeScheduler>,
}

impl RuntimeTaskWaker {
    fn into_waker(self) -> Waker {
        futures_task::waker(Arc::new(self))
    }
}

impl futures_task::ArcWake for RuntimeTaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.scheduler.schedule_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ManualClock;
    use std::cell::Cell;

    fn runtime_with_clock() -> (Runtime, ManualClock) {
        let clock = ManualClock::new();
        let runtime = Runtime::with_clock(Arc::new(DefaultScheduler), Arc::new(clock.clone()));
        (runtime, clock)
    }

    #[test]
    fn microtasks_run_in_fifo_order_on_pump() {
        let runtime = Runtime::default();
        let handle = runtime.handle();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = Rc::clone(&log);
            handle.enqueue_microtask(move || log.borrow_mut().push(i));
        }
        assert!(log.borrow().is_empty());
        assert!(runtime.pump());
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(!runtime.pump());
    }

    #[test]
    fn nested_microtasks_drain_in_the_same_pump() {
        let runtime = Runtime::default();
        let handle = runtime.handle();
        let hits = Rc::new(Cell::new(0));
        let inner_handle = handle.clone();
        let inner_hits = Rc::clone(&hits);
        handle.enqueue_microtask(move || {
            inner_hits.set(inner_hits.get() + 1);
            let hits = Rc::clone(&inner_hits);
            inner_handle.enqueue_microtask(move || hits.set(hits.get() + 1));
        });
        runtime.pump();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn frame_callbacks_run_only_on_frame_and_can_be_cancelled() {
        let runtime = Runtime::default();
        let handle = runtime.handle();
        let fired = Rc::new(Cell::new(0u64));
        let first = Rc::clone(&fired);
        handle.register_frame_callback(move |time| first.set(time));
        let second = Rc::clone(&fired);
        let cancelled = handle
            .register_frame_callback(move |_| second.set(999))
            .unwrap();
        handle.cancel_frame_callback(cancelled);

        runtime.pump();
        assert_eq!(fired.get(), 0);
        runtime.run_frame(16);
        assert_eq!(fired.get(), 16);
        assert!(!runtime.has_frame_callbacks());
    }

    #[test]
    fn timeout_fires_once_after_deadline() {
        let (runtime, clock) = runtime_with_clock();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let _registration = runtime
            .handle()
            .set_timeout(Duration::from_millis(100), move || counter.set(counter.get() + 1))
            .unwrap();
        clock.advance(99);
        runtime.pump();
        assert_eq!(hits.get(), 0);
        clock.advance(1);
        runtime.pump();
        assert_eq!(hits.get(), 1);
        clock.advance(500);
        runtime.pump();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn interval_catches_up_and_stops_when_dropped() {
        let (runtime, clock) = runtime_with_clock();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let registration = runtime
            .handle()
            .set_interval(Duration::from_millis(50), move || counter.set(counter.get() + 1))
            .unwrap();
        clock.advance(200);
        runtime.pump();
        assert_eq!(hits.get(), 4);
        drop(registration);
        clock.advance(200);
        runtime.pump();
        assert_eq!(hits.get(), 4);
    }

    #[test]
    fn spawned_task_completes_when_polled() {
        let runtime = Runtime::default();
        let done = Rc::new(Cell::new(false));
        let flag = Rc::clone(&done);
        let handle = runtime.handle().spawn_ui(async move { flag.set(true) });
        assert!(handle.is_some());
        runtime.pump();
        assert!(done.get());
        assert_eq!(runtime.pending_task_count(), 0);
    }

    #[test]
    fn cancelled_task_never_runs() {
        let runtime = Runtime::default();
        let done = Rc::new(Cell::new(false));
        let flag = Rc::clone(&done);
        let handle = runtime.handle().spawn_ui(async move { flag.set(true) }).unwrap();
        handle.cancel();
        runtime.pump();
        assert!(!done.get());
    }

    #[test]
    fn handle_is_inert_after_runtime_drop() {
        let runtime = Runtime::default();
        let handle = runtime.handle();
        drop(runtime);
        assert!(!handle.is_alive());
        assert!(handle.register_frame_callback(|_| {}).is_none());
        assert!(handle.set_timeout(Duration::from_millis(1), || {}).is_none());
        handle.enqueue_microtask(|| panic!("must not run"));
    }
}
