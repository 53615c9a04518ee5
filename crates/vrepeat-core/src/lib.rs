//! Single-threaded runtime services for the virtual repeat controller.
//!
//! The runtime owns three queues that mirror a browser-style event loop:
//! microtasks that run after the current synchronous work, frame callbacks
//! that run once per rendered frame, and millisecond timers driven by a
//! [`Clock`]. Spawned futures are polled alongside microtasks.

pub mod collections;
pub mod frame_clock;
pub mod platform;
pub mod runtime;
pub mod timer;

pub use frame_clock::{FrameCallbackRegistration, FrameClock};
pub use platform::{Clock, DefaultScheduler, ManualClock, RuntimeScheduler, SystemClock};
pub use runtime::{FrameCallbackId, Runtime, RuntimeHandle, TaskHandle, TimerId};
pub use timer::TimerRegistration;
