//! Observable item list and the shapes a bound value can take.
//!
//! `ItemList` records every mutation as a splice and delivers the accumulated
//! batch to subscribers on the next microtask, so a burst of synchronous
//! mutations arrives as one ordered [`ChangeBatch`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use vrepeat_core::RuntimeHandle;

/// One splice: at `index`, `removed` items were taken out and `added` put in.
///
/// Indices are relative to the list as it was after the preceding splices of
/// the same batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Splice {
    pub index: usize,
    pub removed: usize,
    pub added: usize,
}

impl Splice {
    pub fn insert(index: usize, count: usize) -> Self {
        Self {
            index,
            removed: 0,
            added: count,
        }
    }

    pub fn remove(index: usize, count: usize) -> Self {
        Self {
            index,
            removed: count,
            added: 0,
        }
    }

    pub fn net(&self) -> isize {
        self.added as isize - self.removed as isize
    }
}

pub type SpliceBatch = SmallVec<[Splice; 4]>;

/// Ordered splices delivered together, tagged with the list version they
/// bring a subscriber up to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeBatch {
    pub splices: SpliceBatch,
    pub version: u64,
}

type Subscriber = Rc<dyn Fn(&ChangeBatch)>;

struct ItemListInner<T> {
    items: RefCell<Vec<T>>,
    version: Cell<u64>,
    pending: RefCell<SpliceBatch>,
    flush_scheduled: Cell<bool>,
    subscribers: RefCell<Vec<(u64, Subscriber)>>,
    next_subscriber: Cell<u64>,
    runtime: RuntimeHandle,
}

/// Shared, observable list. Clones refer to the same list.
pub struct ItemList<T> {
    inner: Rc<ItemListInner<T>>,
}

impl<T> Clone for ItemList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ItemList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemList")
            .field("len", &self.inner.items.borrow().len())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: Clone + 'static> ItemList<T> {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self::from_vec(runtime, Vec::new())
    }

    pub fn from_vec(runtime: RuntimeHandle, items: Vec<T>) -> Self {
        Self {
            inner: Rc::new(ItemListInner {
                items: RefCell::new(items),
                version: Cell::new(0),
                pending: RefCell::new(SpliceBatch::new()),
                flush_scheduled: Cell::new(false),
                subscribers: RefCell::new(Vec::new()),
                next_subscriber: Cell::new(1),
                runtime,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.items.borrow().get(index).cloned()
    }

    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.items.borrow())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.inner.items.borrow().clone()
    }

    /// Incremented once per recorded splice.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    pub fn ptr_eq(&self, other: &ItemList<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn push(&self, item: T) {
        let index = self.len();
        self.splice(index, 0, vec![item]);
    }

    pub fn extend(&self, items: impl IntoIterator<Item = T>) {
        let index = self.len();
        self.splice(index, 0, items.into_iter().collect());
    }

    /// Inserts at `index`, clamped to the list length.
    pub fn insert(&self, index: usize, item: T) {
        self.splice(index, 0, vec![item]);
    }

    pub fn remove(&self, index: usize) -> Option<T> {
        if index >= self.len() {
            return None;
        }
        self.splice(index, 1, Vec::new()).pop()
    }

    /// Replaces `removed` items at `index` with `added`, returning the removed
    /// items. Out-of-range arguments are clamped.
    pub fn splice(&self, index: usize, removed: usize, added: Vec<T>) -> Vec<T> {
        let (taken, splice) = {
            let mut items = self.inner.items.borrow_mut();
            let index = index.min(items.len());
            let removed = removed.min(items.len() - index);
            let added_len = added.len();
            let taken: Vec<T> = items.splice(index..index + removed, added).collect();
            (
                taken,
                Splice {
                    index,
                    removed,
                    added: added_len,
                },
            )
        };
        self.record(splice);
        taken
    }

    /// Moves one item, reported as a removal followed by an insertion.
    pub fn move_item(&self, from: usize, to: usize) {
        let len = self.len();
        if from >= len || from == to {
            return;
        }
        let to = to.min(len - 1);
        let item = self.inner.items.borrow_mut().remove(from);
        self.record(Splice::remove(from, 1));
        self.inner.items.borrow_mut().insert(to, item);
        self.record(Splice::insert(to, 1));
    }

    pub fn replace_all(&self, items: Vec<T>) {
        let len = self.len();
        self.splice(0, len, items);
    }

    pub fn clear(&self) {
        self.replace_all(Vec::new());
    }

    /// Registers `callback` for change batches until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe(&self, callback: impl Fn(&ChangeBatch) + 'static) -> Subscription {
        let id = self.inner.next_subscriber.get();
        self.inner.next_subscriber.set(id + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(callback)));
        let weak = Rc::downgrade(&self.inner);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.subscribers.borrow_mut().retain(|(sub, _)| *sub != id);
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    fn record(&self, splice: Splice) {
        if splice.removed == 0 && splice.added == 0 {
            return;
        }
        self.inner.version.set(self.inner.version.get() + 1);
        if self.inner.subscribers.borrow().is_empty() {
            return;
        }
        self.inner.pending.borrow_mut().push(splice);
        if self.inner.flush_scheduled.replace(true) {
            return;
        }
        let weak = Rc::downgrade(&self.inner);
        self.inner
            .runtime
            .enqueue_microtask(move || Self::flush(&weak));
    }

    fn flush(weak: &Weak<ItemListInner<T>>) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        inner.flush_scheduled.set(false);
        let splices = std::mem::take(&mut *inner.pending.borrow_mut());
        if splices.is_empty() {
            return;
        }
        let batch = ChangeBatch {
            splices,
            version: inner.version.get(),
        };
        let subscribers: Vec<Subscriber> = inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        log::trace!(
            "delivering {} splice(s) at version {} to {} subscriber(s)",
            batch.splices.len(),
            batch.version,
            subscribers.len()
        );
        for callback in subscribers {
            callback(&batch);
        }
    }
}

/// Live subscription to an [`ItemList`]. Dropping it unsubscribes.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

pub type Converter<T> = Rc<dyn Fn(&[T]) -> Vec<T>>;

/// What the bound collection expression evaluated to.
pub enum BoundItems<T> {
    /// `null`/`undefined`: nothing to render.
    None,
    /// The list itself.
    List(ItemList<T>),
    /// The list behind a value converter. Mutations are observed on `source`
    /// and the whole expression is re-evaluated on each notification.
    Converted {
        source: ItemList<T>,
        convert: Converter<T>,
    },
    /// A value with no ordering or count. Rejected at configuration time.
    Scalar(String),
}

impl<T> BoundItems<T> {
    /// The list to subscribe to for mutations, unwrapping converters.
    pub fn observable(&self) -> Option<&ItemList<T>> {
        match self {
            BoundItems::List(list) => Some(list),
            BoundItems::Converted { source, .. } => Some(source),
            BoundItems::None | BoundItems::Scalar(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            BoundItems::None => "null".to_string(),
            BoundItems::List(_) => "list".to_string(),
            BoundItems::Converted { .. } => "converted list".to_string(),
            BoundItems::Scalar(kind) => kind.clone(),
        }
    }
}

impl<T> Clone for BoundItems<T> {
    fn clone(&self) -> Self {
        match self {
            BoundItems::None => BoundItems::None,
            BoundItems::List(list) => BoundItems::List(list.clone()),
            BoundItems::Converted { source, convert } => BoundItems::Converted {
                source: source.clone(),
                convert: Rc::clone(convert),
            },
            BoundItems::Scalar(kind) => BoundItems::Scalar(kind.clone()),
        }
    }
}

impl<T> fmt::Debug for BoundItems<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundItems({})", self.describe())
    }
}

/// Items as the strategy reads them.
#[derive(Clone)]
pub(crate) enum ItemSource<T> {
    Empty,
    Live(ItemList<T>),
    Derived { source: ItemList<T>, items: Rc<[T]> },
}

impl<T: Clone + 'static> ItemSource<T> {
    pub(crate) fn from_bound(bound: &BoundItems<T>) -> Self {
        match bound {
            BoundItems::List(list) => ItemSource::Live(list.clone()),
            BoundItems::Converted { source, convert } => {
                // The converter may mutate `source`, so it must not run under
                // the list borrow.
                let snapshot = source.to_vec();
                ItemSource::Derived {
                    source: source.clone(),
                    items: convert(&snapshot).into(),
                }
            }
            BoundItems::None | BoundItems::Scalar(_) => ItemSource::Empty,
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            ItemSource::Empty => 0,
            ItemSource::Live(list) => list.len(),
            ItemSource::Derived { items, .. } => items.len(),
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<T> {
        match self {
            ItemSource::Empty => None,
            ItemSource::Live(list) => list.get(index),
            ItemSource::Derived { items, .. } => items.get(index).cloned(),
        }
    }

    /// Version of the directly observed list; derived items are resynced on
    /// every notification instead.
    pub(crate) fn live_version(&self) -> Option<u64> {
        match self {
            ItemSource::Live(list) => Some(list.version()),
            _ => None,
        }
    }

    pub(crate) fn observed_version(&self) -> Option<u64> {
        match self {
            ItemSource::Empty => None,
            ItemSource::Live(list) | ItemSource::Derived { source: list, .. } => {
                Some(list.version())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrepeat_core::Runtime;

    fn collect(list: &ItemList<u32>) -> (Rc<RefCell<Vec<ChangeBatch>>>, Subscription) {
        let batches = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&batches);
        let subscription = list.subscribe(move |batch| sink.borrow_mut().push(batch.clone()));
        (batches, subscription)
    }

    #[test]
    fn mutations_are_batched_until_the_microtask() {
        let runtime = Runtime::default();
        let list = ItemList::from_vec(runtime.handle(), vec![1, 2, 3]);
        let (batches, _subscription) = collect(&list);

        list.push(4);
        list.insert(0, 0);
        list.remove(2);
        assert!(batches.borrow().is_empty());

        runtime.pump();
        let batches = batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0].splices.as_slice(),
            &[Splice::insert(3, 1), Splice::insert(0, 1), Splice::remove(2, 1)]
        );
        assert_eq!(batches[0].version, 3);
        assert_eq!(list.to_vec(), vec![0, 1, 3, 4]);
    }

    #[test]
    fn move_is_a_remove_then_insert() {
        let runtime = Runtime::default();
        let list = ItemList::from_vec(runtime.handle(), vec![10, 20, 30]);
        let (batches, _subscription) = collect(&list);
        list.move_item(0, 2);
        runtime.pump();
        assert_eq!(list.to_vec(), vec![20, 30, 10]);
        assert_eq!(
            batches.borrow()[0].splices.as_slice(),
            &[Splice::remove(0, 1), Splice::insert(2, 1)]
        );
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let runtime = Runtime::default();
        let list = ItemList::from_vec(runtime.handle(), vec![1]);
        let (batches, subscription) = collect(&list);
        drop(subscription);
        assert_eq!(list.subscriber_count(), 0);
        list.clear();
        runtime.pump();
        assert!(batches.borrow().is_empty());
        assert_eq!(list.version(), 1);
    }

    #[test]
    fn out_of_range_splice_is_clamped() {
        let runtime = Runtime::default();
        let list = ItemList::from_vec(runtime.handle(), vec![1, 2]);
        let removed = list.splice(5, 3, vec![9]);
        assert!(removed.is_empty());
        assert_eq!(list.to_vec(), vec![1, 2, 9]);
        assert_eq!(list.remove(10), None);
    }

    #[test]
    fn converted_source_reads_the_converted_items() {
        let runtime = Runtime::default();
        let list = ItemList::from_vec(runtime.handle(), vec![3, 1, 2]);
        let bound = BoundItems::Converted {
            source: list.clone(),
            convert: Rc::new(|items: &[u32]| {
                let mut sorted = items.to_vec();
                sorted.sort_unstable();
                sorted
            }),
        };
        assert!(bound.observable().unwrap().ptr_eq(&list));
        let source = ItemSource::from_bound(&bound);
        assert_eq!(source.len(), 3);
        assert_eq!(source.get(0), Some(1));
        assert_eq!(source.live_version(), None);
    }
}
