//! Virtualized repeat.
//!
//! Renders a very large or unbounded list inside a scrollable viewport by
//! keeping only the items near the scroll position materialized as views.
//! Two spacer buffers stand in for everything above and below the rendered
//! window, so the scroll height always matches the full list.
//!
//! The host supplies three collaborators: a [`ViewContainer`] that owns the
//! concrete views, a [`LayoutAdapter`] for the scroller and spacers, and a
//! [`BindingContext`] that evaluates the bound collection. Everything runs on
//! a single-threaded [`vrepeat_core::Runtime`].
//!
//! ```ignore
//! let repeat = VirtualRepeat::new(runtime.handle(), container, layout, VirtualRepeatConfig::default());
//! repeat.bind(BindingScope::new("item", context))?;
//! repeat.attach()?;
//! // on every scroll event:
//! repeat.handle_scroll();
//! ```

pub mod binding;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod guard;
pub mod layout;
pub mod resize;
pub mod source;
mod state;
pub mod stats;
pub mod strategy;
pub mod transition;
pub mod view;
pub mod window;

pub use binding::{
    BindingContext, BindingScope, ContextExpression, ContextFunction, ContextMember,
    LoadMoreBinding, LoadMoreOutcome, ScrollContext,
};
pub use config::{VirtualRepeatConfig, DEFAULT_EDGE_THRESHOLD};
pub use controller::{Lifecycle, VirtualRepeat};
pub use error::ConfigError;
pub use events::VirtualizationEvent;
pub use guard::{ActivityState, LoadMoreState};
pub use layout::{BufferHandle, BufferPair, LayoutAdapter, ScrollerKind};
pub use resize::{ContentSize, ResizeCallback, ResizeObserver, ResizeTarget};
pub use source::{BoundItems, ChangeBatch, Converter, ItemList, Splice, Subscription};
pub use stats::RepeatStats;
pub use strategy::{CollectionStrategy, Sizing, StrategyLocator};
pub use transition::{classify_transition, JumpDirection, ScrollTransition};
pub use view::{ItemBinding, RenderedView, ViewContainer};
pub use window::{compute_visible_range, ScrollerSnapshot, ViewWindow, VisibleRange};
