use crate::window::ScrollerSnapshot;

/// How the list scrolls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScrollerKind {
    /// A container that clips its own overflow.
    #[default]
    Fixed,
    /// The page itself scrolls. The list's distance to the page top can
    /// change without a scroll or resize event and has to be polled.
    Page,
}

/// Host handle for one spacer element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// The spacers before and after the rendered views.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferPair {
    pub top: BufferHandle,
    pub bottom: BufferHandle,
}

/// Host layout operations for one list topology (plain list, table, custom markup).
pub trait LayoutAdapter {
    /// Locates the element that scrolls the list.
    fn scroll_container(&mut self) -> ScrollerKind;

    fn create_buffers(&mut self) -> BufferPair;

    fn remove_buffers(&mut self, buffers: BufferPair);

    fn set_buffer_heights(&mut self, buffers: &BufferPair, top: f32, bottom: f32);

    /// Height of the first rendered view after the top buffer, if any.
    fn first_rendered_height(&self, buffers: &BufferPair) -> Option<f32>;

    fn scroller_snapshot(&self) -> ScrollerSnapshot;

    /// Distance from the scroller's content top to the top of the list.
    fn list_offset_top(&self) -> f32;

    fn set_scroll_top(&mut self, scroll_top: f32);
}
