use crate::bounds::Bounds;
use crate::math::{
    Projection, RENDER, STORAGE, Vec2, clamp_zoom, resolution_at_zoom, to_render, to_storage,
};

/// The visible world extent (render projection) plus zoom level.
///
/// Derived from the map on every settled view and never stored.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub bounds: Bounds,
    pub zoom: u8,
}

impl Viewport {
    pub fn new(bounds: Bounds, zoom: u8) -> Self {
        Self { bounds, zoom }
    }

    pub fn resolution(&self) -> f64 {
        resolution_at_zoom(self.zoom)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        self.bounds.contains(p)
    }

    /// The same extent in storage degrees.
    pub fn storage_bounds(&self) -> Bounds {
        self.bounds.transform(RENDER, STORAGE)
    }
}

/// Camera state of the map surface: where it looks, how close, and how big
/// the drawing area is.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MapView {
    /// Render-projection center.
    pub center: Vec2,
    pub zoom: u8,
    pub width_px: u32,
    pub height_px: u32,
}

impl MapView {
    pub fn new(center: Vec2, zoom: u8, width_px: u32, height_px: u32) -> Self {
        Self {
            center,
            zoom,
            width_px,
            height_px,
        }
    }

    pub fn from_storage(lon: f64, lat: f64, zoom: u8, width_px: u32, height_px: u32) -> Self {
        let center = to_render(Vec2::new(lon, lat), Projection::Geographic);
        Self::new(center, zoom, width_px, height_px)
    }

    pub fn viewport(&self) -> Viewport {
        let res = resolution_at_zoom(self.zoom);
        let half_w = f64::from(self.width_px) / 2.0 * res;
        let half_h = f64::from(self.height_px) / 2.0 * res;
        Viewport::new(Bounds::from_center(self.center, half_w, half_h), self.zoom)
    }

    /// Center in storage degrees (`x` = lon, `y` = lat).
    pub fn center_storage(&self) -> Vec2 {
        to_storage(self.center, RENDER)
    }

    /// Shift the center by a screen-pixel offset (`dy` positive moves north).
    pub fn panned_px(&self, dx: f64, dy: f64) -> Self {
        let res = resolution_at_zoom(self.zoom);
        Self {
            center: Vec2::new(self.center.x + dx * res, self.center.y + dy * res),
            ..*self
        }
    }

    pub fn zoomed_to(&self, zoom: i64) -> Self {
        Self {
            zoom: clamp_zoom(zoom),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MapView;
    use crate::math::resolution_at_zoom;

    #[test]
    fn viewport_spans_size_times_resolution() {
        let view = MapView::from_storage(2.76, 46.88, 6, 800, 600);
        let vp = view.viewport();
        let res = resolution_at_zoom(6);
        assert!((vp.bounds.width() - 800.0 * res).abs() < 1e-6);
        assert!((vp.bounds.height() - 600.0 * res).abs() < 1e-6);
        assert!(vp.contains(view.center));
    }

    #[test]
    fn zooming_in_shrinks_the_extent() {
        let view = MapView::from_storage(2.76, 46.88, 6, 800, 600);
        let inner = view.zoomed_to(7).viewport();
        assert!(view.viewport().bounds.contains_bounds(&inner.bounds));
    }

    #[test]
    fn center_round_trips_to_degrees() {
        let view = MapView::from_storage(2.76, 46.88, 6, 800, 600);
        let c = view.center_storage();
        assert!((c.x - 2.76).abs() < 1e-9);
        assert!((c.y - 46.88).abs() < 1e-9);
    }

    #[test]
    fn pan_moves_by_pixels() {
        let view = MapView::from_storage(0.0, 0.0, 3, 100, 100);
        let moved = view.panned_px(10.0, 0.0);
        assert!((moved.center.x - 10.0 * resolution_at_zoom(3)).abs() < 1e-6);
    }
}
