use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::{FrameCallbackId, RuntimeHandle};

/// Per-frame callback registry bound to a runtime.
#[derive(Clone, Debug)]
pub struct FrameClock {
    runtime: RuntimeHandle,
}

impl FrameClock {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self { runtime }
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.clone()
    }

    /// Runs `callback` with the frame time of the next frame.
    ///
    /// Returns `None` when the runtime has already been dropped.
    pub fn with_frame_nanos(
        &self,
        callback: impl FnOnce(u64) + 'static,
    ) -> Option<FrameCallbackRegistration> {
        let mut callback_opt = Some(callback);
        let registration = self.runtime.register_frame_callback(move |time| {
            if let Some(callback) = callback_opt.take() {
                callback(time);
            }
        })?;
        Some(FrameCallbackRegistration::new(self.runtime.clone(), registration))
    }

    /// Millisecond variant of [`FrameClock::with_frame_nanos`].
    pub fn with_frame_millis(
        &self,
        callback: impl FnOnce(u64) + 'static,
    ) -> Option<FrameCallbackRegistration> {
        self.with_frame_nanos(move |nanos| callback(nanos / 1_000_000))
    }

    /// Same as [`FrameClock::with_frame_nanos`], but the registration only
    /// lives as long as the shared slot holds it. The slot is cleared when the
    /// callback runs.
    pub fn request_into(
        &self,
        slot: &Rc<RefCell<Option<FrameCallbackRegistration>>>,
        callback: impl FnOnce(u64) + 'static,
    ) -> bool {
        let weak_slot = Rc::downgrade(slot);
        let registration = self.with_frame_nanos(move |time| {
            if let Some(slot) = weak_slot.upgrade() {
                if let Some(registration) = slot.borrow_mut().take() {
                    registration.defuse();
                }
            }
            callback(time);
        });
        match registration {
            Some(registration) => {
                if let Some(previous) = slot.borrow_mut().replace(registration) {
                    previous.cancel();
                }
                true
            }
            None => false,
        }
    }
}

/// Pending frame callback. Dropping it cancels the callback.
#[derive(Debug)]
pub struct FrameCallbackRegistration {
    runtime: RuntimeHandle,
    id: Option<FrameCallbackId>,
}

impl FrameCallbackRegistration {
    fn new(runtime: RuntimeHandle, id: FrameCallbackId) -> Self {
        Self {
            runtime,
            id: Some(id),
        }
    }

    pub fn id(&self) -> Option<FrameCallbackId> {
        self.id
    }

    pub fn cancel(mut self) {
        if let Some(id) = self.id.take() {
            self.runtime.cancel_frame_callback(id);
        }
    }

    /// Forgets the callback id without cancelling. Used once the callback has fired.
    fn defuse(mut self) {
        self.id = None;
    }
}

impl Drop for FrameCallbackRegistration {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.runtime.cancel_frame_callback(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use std::cell::Cell;

    #[test]
    fn dropping_registration_cancels_callback() {
        let runtime = Runtime::default();
        let clock = runtime.frame_clock();
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let registration = clock.with_frame_nanos(move |_| flag.set(true));
        drop(registration);
        runtime.run_frame(1);
        assert!(!fired.get());
    }

    #[test]
    fn millis_variant_converts_frame_time() {
        let runtime = Runtime::default();
        let clock = runtime.frame_clock();
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let _registration = clock.with_frame_millis(move |millis| sink.set(millis));
        runtime.run_frame(32_000_000);
        assert_eq!(seen.get(), 32);
    }

    #[test]
    fn request_into_replaces_previous_and_clears_slot() {
        let runtime = Runtime::default();
        let clock = runtime.frame_clock();
        let slot = Rc::new(RefCell::new(None));
        let hits = Rc::new(Cell::new(0));

        let first = Rc::clone(&hits);
        assert!(clock.request_into(&slot, move |_| first.set(first.get() + 10)));
        let second = Rc::clone(&hits);
        assert!(clock.request_into(&slot, move |_| second.set(second.get() + 1)));

        runtime.run_frame(16);
        assert_eq!(hits.get(), 1);
        assert!(slot.borrow().is_none());
    }
}
