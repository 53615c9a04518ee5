//! Collection strategies.
//!
//! A strategy knows how to turn one shape of bound value into rendered views:
//! how many items there are, how to size the first one, which range a scroll
//! offset maps to and how to patch the window after a mutation. The
//! controller picks one through a [`StrategyLocator`] each time the bound
//! value is re-evaluated and hands it the shared core for the duration of a
//! single call.

mod array;
mod null;
pub(crate) mod viewport;

use smallvec::{smallvec, SmallVec};

use crate::source::{BoundItems, ItemSource, Splice};
use crate::state::RepeatCore;
use crate::view::ViewContainer;
use crate::window::{compute_visible_range, ScrollerSnapshot, VisibleRange};

/// Result of sizing the bound source.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sizing {
    /// The source is empty and the window was cleared.
    pub reset: bool,
    /// A positive item height was measured.
    pub succeeded: bool,
    /// The scroller should be observed for size changes.
    pub observe_scroller: bool,
    pub item_height: f32,
    pub min_views: usize,
}

/// What the controller has to do after a mutation patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PatchOutcome {
    /// The window was patched in place. `anchor_shift` items were inserted
    /// (or removed, if negative) above the window.
    Patched { anchor_shift: isize },
    /// Nothing is rendered or the window was never sized; run a full
    /// recompute instead.
    NeedsRecompute,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollectionStrategy {
    /// Nothing is bound.
    #[default]
    Null,
    /// An ordered, countable list, possibly behind a converter.
    Array,
}

impl CollectionStrategy {
    pub fn can_handle<T>(&self, items: &BoundItems<T>) -> bool {
        match self {
            CollectionStrategy::Null => matches!(items, BoundItems::None),
            CollectionStrategy::Array => {
                matches!(items, BoundItems::List(_) | BoundItems::Converted { .. })
            }
        }
    }

    /// Near enough to index 0 to ask for earlier items.
    pub fn is_near_top(&self, edge_threshold: usize, index: usize) -> bool {
        match self {
            CollectionStrategy::Null => false,
            CollectionStrategy::Array => index <= edge_threshold,
        }
    }

    /// Near enough to the last item to ask for more.
    pub fn is_near_bottom(&self, edge_threshold: usize, item_count: usize, index: usize) -> bool {
        match self {
            CollectionStrategy::Null => false,
            CollectionStrategy::Array => item_count > 0 && index + 1 + edge_threshold >= item_count,
        }
    }

    pub(crate) fn size_for_source<T, C>(
        &self,
        core: &mut RepeatCore<T, C>,
        items: &ItemSource<T>,
    ) -> Sizing
    where
        T: Clone + 'static,
        C: ViewContainer<T>,
    {
        match self {
            CollectionStrategy::Null => null::reset(core),
            CollectionStrategy::Array => array::size_for_source(core, items),
        }
    }

    pub(crate) fn instantiate_window<T, C>(
        &self,
        core: &mut RepeatCore<T, C>,
        items: &ItemSource<T>,
        start: usize,
        force_rebind: bool,
    ) where
        T: Clone + 'static,
        C: ViewContainer<T>,
    {
        match self {
            CollectionStrategy::Null => {
                null::reset(core);
            }
            CollectionStrategy::Array => array::instantiate_window(core, items, start, force_rebind),
        }
    }

    pub(crate) fn visible_range<T, C>(
        &self,
        core: &RepeatCore<T, C>,
        item_count: usize,
        snapshot: &ScrollerSnapshot,
    ) -> Option<VisibleRange>
    where
        T: Clone + 'static,
        C: ViewContainer<T>,
    {
        match self {
            CollectionStrategy::Null => None,
            CollectionStrategy::Array => compute_visible_range(
                item_count,
                core.min_views,
                core.window.item_height,
                core.relative_scroll_top(snapshot),
            ),
        }
    }

    pub(crate) fn patch_for_mutation<T, C>(
        &self,
        core: &mut RepeatCore<T, C>,
        items: &ItemSource<T>,
        splices: &[Splice],
    ) -> PatchOutcome
    where
        T: Clone + 'static,
        C: ViewContainer<T>,
    {
        match self {
            CollectionStrategy::Null => PatchOutcome::Patched { anchor_shift: 0 },
            CollectionStrategy::Array => array::patch_for_mutation(core, items, splices),
        }
    }

    /// Re-measures the item height and rebuilds the window for `snapshot`.
    pub(crate) fn remeasure<T, C>(
        &self,
        core: &mut RepeatCore<T, C>,
        items: &ItemSource<T>,
        snapshot: &ScrollerSnapshot,
    ) -> Option<VisibleRange>
    where
        T: Clone + 'static,
        C: ViewContainer<T>,
    {
        match self {
            CollectionStrategy::Null => {
                null::reset(core);
                None
            }
            CollectionStrategy::Array => array::remeasure(core, items, snapshot),
        }
    }
}

/// Ordered strategy providers; the first that can handle a value wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyLocator {
    providers: SmallVec<[CollectionStrategy; 2]>,
}

impl StrategyLocator {
    pub fn new(providers: impl IntoIterator<Item = CollectionStrategy>) -> Self {
        Self {
            providers: providers.into_iter().collect(),
        }
    }

    pub fn locate<T>(&self, items: &BoundItems<T>) -> Option<CollectionStrategy> {
        self.providers
            .iter()
            .copied()
            .find(|strategy| strategy.can_handle(items))
    }
}

impl Default for StrategyLocator {
    fn default() -> Self {
        Self {
            providers: smallvec![CollectionStrategy::Null, CollectionStrategy::Array],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ItemList;
    use std::rc::Rc;
    use vrepeat_core::Runtime;

    #[test]
    fn locator_picks_first_matching_provider() {
        let runtime = Runtime::default();
        let locator = StrategyLocator::default();
        let list = ItemList::from_vec(runtime.handle(), vec![1u32]);
        assert_eq!(
            locator.locate(&BoundItems::List(list.clone())),
            Some(CollectionStrategy::Array)
        );
        assert_eq!(
            locator.locate(&BoundItems::Converted {
                source: list,
                convert: Rc::new(|items: &[u32]| items.to_vec()),
            }),
            Some(CollectionStrategy::Array)
        );
        assert_eq!(
            locator.locate::<u32>(&BoundItems::None),
            Some(CollectionStrategy::Null)
        );
        assert_eq!(locator.locate::<u32>(&BoundItems::Scalar("number".into())), None);
    }

    #[test]
    fn empty_locator_handles_nothing() {
        let locator = StrategyLocator::new([]);
        assert_eq!(locator.locate::<u32>(&BoundItems::None), None);
    }

    #[test]
    fn edge_checks_use_threshold() {
        let strategy = CollectionStrategy::Array;
        assert!(strategy.is_near_top(5, 5));
        assert!(!strategy.is_near_top(5, 6));
        assert!(strategy.is_near_bottom(5, 1000, 994));
        assert!(!strategy.is_near_bottom(5, 1000, 993));
        assert!(!strategy.is_near_bottom(5, 0, 0));
        assert!(!CollectionStrategy::Null.is_near_top(5, 0));
    }
}
