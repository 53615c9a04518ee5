//! View container seam.
//!
//! The controller never owns concrete views. It asks a [`ViewContainer`] to
//! create, reorder and drop them, and rebinds existing views through
//! [`RenderedView::bind`] when they are recycled to a new index.

/// Override context handed to a view when it is bound to an item.
#[derive(Debug)]
pub struct ItemBinding<'a, T> {
    /// Name the item is exposed under in the view's scope.
    pub item_name: &'a str,
    pub index: usize,
    pub item: &'a T,
    /// Item count of the whole list, not of the rendered window.
    pub count: usize,
}

impl<'a, T> ItemBinding<'a, T> {
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.count
    }

    pub fn is_middle(&self) -> bool {
        !self.is_first() && !self.is_last()
    }

    pub fn is_even(&self) -> bool {
        self.index % 2 == 0
    }

    pub fn is_odd(&self) -> bool {
        !self.is_even()
    }
}

/// A live view bound to one item.
pub trait RenderedView<T> {
    /// Logical index of the bound item (`$index`).
    fn index(&self) -> usize;

    /// Rebinds the view to another item.
    fn bind(&mut self, binding: &ItemBinding<'_, T>);
}

/// Ordered set of rendered views, in the same order as their indices.
pub trait ViewContainer<T> {
    type View: RenderedView<T>;

    /// Materializes a new, detached view bound to `binding`.
    fn create_view(&mut self, binding: &ItemBinding<'_, T>) -> Self::View;

    fn views(&self) -> &[Self::View];

    fn view_mut(&mut self, position: usize) -> Option<&mut Self::View>;

    fn add_view(&mut self, view: Self::View);

    fn insert_view(&mut self, position: usize, view: Self::View);

    fn remove_view(&mut self, position: usize) -> Option<Self::View>;

    fn remove_all_views(&mut self);

    fn view_count(&self) -> usize {
        self.views().len()
    }

    fn view(&self, position: usize) -> Option<&Self::View> {
        self.views().get(position)
    }

    /// Repositions a view without destroying it.
    fn move_view(&mut self, from: usize, to: usize) {
        if let Some(view) = self.remove_view(from) {
            self.insert_view(to, view);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(index: usize, count: usize) -> ItemBinding<'static, u8> {
        ItemBinding {
            item_name: "row",
            index,
            item: &0,
            count,
        }
    }

    #[test]
    fn contextual_flags() {
        let first = binding(0, 3);
        assert!(first.is_first() && first.is_even() && !first.is_middle());
        let middle = binding(1, 3);
        assert!(middle.is_middle() && middle.is_odd());
        let last = binding(2, 3);
        assert!(last.is_last() && !last.is_first());
        let only = binding(0, 1);
        assert!(only.is_first() && only.is_last() && !only.is_middle());
    }
}
