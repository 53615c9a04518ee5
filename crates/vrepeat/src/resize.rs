//! Resize observation and duplicate suppression.

use std::cell::RefCell;
use std::rc::Rc;

use vrepeat_core::FrameCallbackRegistration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResizeTarget {
    Scroller,
    FirstItem,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContentSize {
    pub width: f32,
    pub height: f32,
}

impl ContentSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

pub type ResizeCallback = Rc<dyn Fn(ContentSize)>;

/// Native size observation. Hosts without it report `is_supported() == false`
/// and forward [`VirtualizationEvent`](crate::VirtualizationEvent)s instead.
pub trait ResizeObserver {
    fn is_supported(&self) -> bool;

    fn observe(&mut self, target: ResizeTarget, on_change: ResizeCallback);

    fn disconnect(&mut self);
}

/// Bookkeeping for pending resize recomputes.
///
/// Each accepted notification bumps `token`; the frame callback it schedules
/// only acts if its token is still the latest.
#[derive(Default)]
pub(crate) struct ResizeWatcher {
    installed: bool,
    last_scroller: Option<ContentSize>,
    last_item: Option<ContentSize>,
    token: u64,
    pub(crate) pending: Rc<RefCell<Option<FrameCallbackRegistration>>>,
}

impl ResizeWatcher {
    pub(crate) fn is_installed(&self) -> bool {
        self.installed
    }

    pub(crate) fn mark_installed(&mut self) {
        self.installed = true;
    }

    /// Records `size` for `target`, returning the new token unless the size
    /// is identical to the last one seen.
    pub(crate) fn record(&mut self, target: ResizeTarget, size: ContentSize) -> Option<u64> {
        let last = match target {
            ResizeTarget::Scroller => &mut self.last_scroller,
            ResizeTarget::FirstItem => &mut self.last_item,
        };
        if *last == Some(size) {
            return None;
        }
        *last = Some(size);
        Some(self.bump())
    }

    pub(crate) fn bump(&mut self) -> u64 {
        self.token += 1;
        self.token
    }

    pub(crate) fn is_current(&self, token: u64) -> bool {
        self.token == token
    }

    /// Forgets observed sizes and cancels the pending recompute.
    pub(crate) fn reset(&mut self) {
        self.installed = false;
        self.last_scroller = None;
        self.last_item = None;
        self.token += 1;
        if let Some(registration) = self.pending.borrow_mut().take() {
            registration.cancel();
        }
    }
}
