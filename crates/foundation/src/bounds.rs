use crate::math::{Projection, Vec2, WORLD_HALF_EXTENT_M, transform};

/// Axis-aligned rectangle in a single projection.
///
/// `top` is the larger `y` and `right` the larger `x` once normalized; the
/// feed may send them inverted, see [`Bounds::normalized`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Bounds {
            left,
            top,
            right,
            bottom,
        }
    }

    /// The whole spherical mercator world square.
    pub fn world() -> Self {
        Bounds::new(
            -WORLD_HALF_EXTENT_M,
            -WORLD_HALF_EXTENT_M,
            WORLD_HALF_EXTENT_M,
            WORLD_HALF_EXTENT_M,
        )
    }

    pub fn from_center(center: Vec2, half_width: f64, half_height: f64) -> Self {
        Bounds::new(
            center.x - half_width,
            center.y - half_height,
            center.x + half_width,
            center.y + half_height,
        )
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.left + self.right) / 2.0,
            (self.bottom + self.top) / 2.0,
        )
    }

    /// Inclusive on every edge.
    pub fn contains(&self, p: Vec2) -> bool {
        self.left <= p.x && p.x <= self.right && self.bottom <= p.y && p.y <= self.top
    }

    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        self.left <= other.left
            && other.right <= self.right
            && self.bottom <= other.bottom
            && other.top <= self.top
    }

    /// Grow every edge outward by `margin` (in this rectangle's units).
    pub fn expand(&self, margin: f64) -> Self {
        Bounds::new(
            self.left - margin,
            self.bottom - margin,
            self.right + margin,
            self.top + margin,
        )
    }

    /// Swap edges so that `left <= right` and `bottom <= top`.
    pub fn normalized(&self) -> Self {
        Bounds::new(
            self.left.min(self.right),
            self.bottom.min(self.top),
            self.left.max(self.right),
            self.bottom.max(self.top),
        )
    }

    pub fn intersection(&self, other: &Bounds) -> Self {
        Bounds::new(
            self.left.max(other.left),
            self.bottom.max(other.bottom),
            self.right.min(other.right),
            self.top.min(other.top),
        )
    }

    /// Transform both corners into another projection.
    pub fn transform(&self, from: Projection, to: Projection) -> Self {
        let min = transform(Vec2::new(self.left, self.bottom), from, to);
        let max = transform(Vec2::new(self.right, self.top), from, to);
        Bounds::new(min.x, min.y, max.x, max.y)
    }
}

#[cfg(test)]
mod tests {
    use super::Bounds;
    use crate::math::{Projection, Vec2};

    #[test]
    fn contains_is_inclusive() {
        let b = Bounds::new(0.0, 0.0, 10.0, 5.0);
        assert!(b.contains(Vec2::new(0.0, 0.0)));
        assert!(b.contains(Vec2::new(10.0, 5.0)));
        assert!(!b.contains(Vec2::new(10.1, 5.0)));
        assert!(!b.contains(Vec2::new(f64::NAN, 1.0)));
    }

    #[test]
    fn expand_grows_each_edge() {
        let b = Bounds::new(0.0, 0.0, 10.0, 5.0).expand(2.0);
        assert_eq!(b, Bounds::new(-2.0, -2.0, 12.0, 7.0));
        assert!(b.contains_bounds(&Bounds::new(0.0, 0.0, 10.0, 5.0)));
    }

    #[test]
    fn normalized_swaps_inverted_edges() {
        let b = Bounds::new(10.0, 5.0, 0.0, 0.0).normalized();
        assert_eq!(b, Bounds::new(0.0, 0.0, 10.0, 5.0));
    }

    #[test]
    fn transform_world_to_degrees() {
        let deg = Bounds::world().transform(Projection::SphericalMercator, Projection::Geographic);
        assert!((deg.left + 180.0).abs() < 1e-6);
        assert!((deg.right - 180.0).abs() < 1e-6);
        assert!((deg.top - 85.0511).abs() < 1e-3);
    }

    #[test]
    fn center_and_size() {
        let b = Bounds::from_center(Vec2::new(1.0, 2.0), 3.0, 4.0);
        assert_eq!(b.center(), Vec2::new(1.0, 2.0));
        assert_eq!(b.width(), 6.0);
        assert_eq!(b.height(), 8.0);
    }
}
