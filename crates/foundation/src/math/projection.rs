use super::Vec2;

/// Half the width of the spherical mercator world square (meters).
pub const WORLD_HALF_EXTENT_M: f64 = 20_037_508.34;
/// Ground resolution at zoom 0 (meters per pixel).
pub const MAX_RESOLUTION: f64 = 156_543.0399;
/// Number of discrete zoom levels (0..=18).
pub const ZOOM_LEVELS: u8 = 19;

/// Coordinate systems known to the map.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    /// Longitude/latitude in decimal degrees. Used by the record feed and
    /// every user-facing value (storage/display projection).
    Geographic,
    /// Spherical mercator in meters. Used by the map surface for drawing.
    SphericalMercator,
}

/// Projection the map surface draws in.
pub const RENDER: Projection = Projection::SphericalMercator;
/// Projection of the record feed and persisted view state.
pub const STORAGE: Projection = Projection::Geographic;

/// Transform `p` between two projections.
///
/// Pure and unguarded: latitudes outside ±90° or non-finite input come out
/// as NaN and are left for the caller to render (or not).
pub fn transform(p: Vec2, from: Projection, to: Projection) -> Vec2 {
    match (from, to) {
        (Projection::Geographic, Projection::SphericalMercator) => geographic_to_mercator(p),
        (Projection::SphericalMercator, Projection::Geographic) => mercator_to_geographic(p),
        _ => p,
    }
}

/// Transform into the render projection.
pub fn to_render(p: Vec2, from: Projection) -> Vec2 {
    transform(p, from, RENDER)
}

/// Transform into the storage projection.
pub fn to_storage(p: Vec2, from: Projection) -> Vec2 {
    transform(p, from, STORAGE)
}

fn geographic_to_mercator(p: Vec2) -> Vec2 {
    let x = p.x * WORLD_HALF_EXTENT_M / 180.0;
    let y = ((90.0 + p.y) * std::f64::consts::PI / 360.0).tan().ln()
        / (std::f64::consts::PI / 180.0);
    Vec2::new(x, y * WORLD_HALF_EXTENT_M / 180.0)
}

fn mercator_to_geographic(p: Vec2) -> Vec2 {
    let lon = p.x / WORLD_HALF_EXTENT_M * 180.0;
    let lat = p.y / WORLD_HALF_EXTENT_M * 180.0;
    let lat = 180.0 / std::f64::consts::PI
        * (2.0 * (lat * std::f64::consts::PI / 180.0).exp().atan() - std::f64::consts::FRAC_PI_2);
    Vec2::new(lon, lat)
}

/// Ground resolution (render meters per screen pixel) at `zoom`.
pub fn resolution_at_zoom(zoom: u8) -> f64 {
    MAX_RESOLUTION / 2f64.powi(i32::from(zoom))
}

/// Clamp an arbitrary zoom request onto the map's discrete levels.
pub fn clamp_zoom(zoom: i64) -> u8 {
    zoom.clamp(0, i64::from(ZOOM_LEVELS - 1)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn origin_maps_to_origin() {
        let p = to_render(Vec2::new(0.0, 0.0), Projection::Geographic);
        assert_close(p.x, 0.0, 1e-9);
        assert_close(p.y, 0.0, 1e-6);
    }

    #[test]
    fn antimeridian_maps_to_world_edge() {
        let p = to_render(Vec2::new(180.0, 0.0), Projection::Geographic);
        assert_close(p.x, WORLD_HALF_EXTENT_M, 1e-6);
    }

    #[test]
    fn round_trip_storage_render() {
        for &(lon, lat) in &[
            (2.76, 46.88),
            (-122.4, 37.7),
            (151.2, -33.9),
            (0.0, 84.9),
            (-179.99, -80.0),
        ] {
            let p = Vec2::new(lon, lat);
            let back = to_storage(to_render(p, Projection::Geographic), RENDER);
            assert_close(back.x, lon, 1e-9);
            assert_close(back.y, lat, 1e-9);
        }
    }

    #[test]
    fn same_projection_is_identity() {
        let p = Vec2::new(3.5, -7.25);
        assert_eq!(transform(p, RENDER, RENDER), p);
        assert_eq!(to_storage(p, STORAGE), p);
    }

    #[test]
    fn invalid_input_propagates_nan() {
        let p = to_render(Vec2::new(f64::NAN, 10.0), Projection::Geographic);
        assert!(p.x.is_nan());
        let p = to_render(Vec2::new(0.0, 95.0), Projection::Geographic);
        assert!(p.y.is_nan());
    }

    #[test]
    fn resolution_halves_per_zoom_level() {
        assert_close(resolution_at_zoom(0), MAX_RESOLUTION, 1e-9);
        assert_close(resolution_at_zoom(1), MAX_RESOLUTION / 2.0, 1e-9);
        assert_close(resolution_at_zoom(6) * 64.0, MAX_RESOLUTION, 1e-9);
    }

    #[test]
    fn zoom_is_clamped_to_known_levels() {
        assert_eq!(clamp_zoom(-3), 0);
        assert_eq!(clamp_zoom(42), 18);
    }
}
