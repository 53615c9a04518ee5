//! Testing utilities and harness for vrepeat.
//!
//! [`TestHost`] simulates a scroll container with two spacer buffers and a
//! list of rendered views, all in memory. [`Fixture`] wires a host, a
//! manually driven runtime and a [`vrepeat::VirtualRepeat`] together.

pub mod context;
pub mod fixture;
pub mod host;

pub use context::TestBindingContext;
pub use fixture::{Fixture, FixtureBuilder, LoadMoreProbe, TestRepeat};
pub use host::{HostState, ResizeHandle, TestContainer, TestHost, TestLayout, TestResizeObserver, TestView};

pub mod prelude {
    pub use crate::context::TestBindingContext;
    pub use crate::fixture::{Fixture, FixtureBuilder, LoadMoreProbe, TestRepeat};
    pub use crate::host::*;
    pub use vrepeat::*;
}
