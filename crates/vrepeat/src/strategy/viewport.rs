//! Viewport validation for sizing.
//!
//! Detects unbounded viewports (a list inside an unconstrained scroller) and
//! substitutes a fallback height so sizing never asks for millions of views.

/// Maximum reasonable viewport height before treating it as unbounded.
const MAX_REASONABLE_VIEWPORT: f32 = 100_000.0;

/// Items worth of height used when the viewport is unbounded.
const UNBOUNDED_VIEWPORT_ITEM_COUNT: f32 = 20.0;

#[derive(Clone, Copy, Debug)]
pub(crate) struct ViewportFit {
    effective_height: f32,
    #[cfg(test)]
    is_unbounded: bool,
}

impl ViewportFit {
    pub(crate) fn new(viewport_height: f32, item_height: f32) -> Self {
        let is_unbounded = !viewport_height.is_finite() || viewport_height > MAX_REASONABLE_VIEWPORT;
        let effective_height = if is_unbounded {
            let estimated = item_height * UNBOUNDED_VIEWPORT_ITEM_COUNT;
            log::warn!(
                "virtual repeat: unbounded viewport ({viewport_height}), using fallback height {estimated}. \
                 Give the scroll container a fixed height."
            );
            estimated
        } else {
            viewport_height.max(0.0)
        };
        Self {
            effective_height,
            #[cfg(test)]
            is_unbounded,
        }
    }

    #[cfg(test)]
    fn effective_height(&self) -> f32 {
        self.effective_height
    }

    #[cfg(test)]
    fn is_unbounded(&self) -> bool {
        self.is_unbounded
    }

    /// Views needed to cover the viewport, plus one for the partially
    /// visible item at either edge.
    pub(crate) fn min_views(&self, item_height: f32) -> usize {
        if item_height <= 0.0 {
            return 1;
        }
        (self.effective_height / item_height).floor() as usize + 1
    }
}
