use crate::runtime::{RuntimeHandle, TimerId};

/// Live timeout or interval. Dropping it cancels the timer.
#[derive(Debug)]
pub struct TimerRegistration {
    runtime: RuntimeHandle,
    id: Option<TimerId>,
}

impl TimerRegistration {
    pub(crate) fn new(runtime: RuntimeHandle, id: TimerId) -> Self {
        Self {
            runtime,
            id: Some(id),
        }
    }

    pub fn id(&self) -> Option<TimerId> {
        self.id
    }

    /// Whether the timer is still registered with the runtime.
    ///
    /// A one-shot timer stops being scheduled once it has fired.
    pub fn is_scheduled(&self) -> bool {
        self.id
            .map(|id| self.runtime.has_timer(id))
            .unwrap_or(false)
    }

    pub fn cancel(mut self) {
        self.cancel_in_place();
    }

    fn cancel_in_place(&mut self) {
        if let Some(id) = self.id.take() {
            self.runtime.cancel_timer(id);
        }
    }
}

impl Drop for TimerRegistration {
    fn drop(&mut self) {
        self.cancel_in_place();
    }
}

#[cfg(test)]
mod tests {
    use crate::platform::{DefaultScheduler, ManualClock};
    use crate::runtime::Runtime;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn one_shot_is_unscheduled_after_firing() {
        let clock = ManualClock::new();
        let runtime = Runtime::with_clock(Arc::new(DefaultScheduler), Arc::new(clock.clone()));
        let registration = runtime
            .handle()
            .set_timeout(Duration::from_millis(10), || {})
            .unwrap();
        assert!(registration.is_scheduled());
        clock.advance(10);
        runtime.pump();
        assert!(!registration.is_scheduled());
    }

    #[test]
    fn cancelling_from_inside_the_callback_stops_an_interval() {
        let clock = ManualClock::new();
        let runtime = Runtime::with_clock(Arc::new(DefaultScheduler), Arc::new(clock.clone()));
        let slot = Rc::new(std::cell::RefCell::new(None));
        let hits = Rc::new(Cell::new(0));
        let weak_slot = Rc::downgrade(&slot);
        let counter = Rc::clone(&hits);
        let registration = runtime
            .handle()
            .set_interval(Duration::from_millis(100), move || {
                counter.set(counter.get() + 1);
                if counter.get() == 2 {
                    if let Some(slot) = weak_slot.upgrade() {
                        slot.borrow_mut().take();
                    }
                }
            })
            .unwrap();
        *slot.borrow_mut() = Some(registration);
        clock.advance(1_000);
        runtime.pump();
        assert_eq!(hits.get(), 2);
    }
}
