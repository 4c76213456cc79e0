//! Where the map opens: page query parameters over the persisted view over
//! the configured default, decided per parameter.

use foundation::math::clamp_zoom;
use tracing::{debug, warn};
use viewstate::{PersistedView, ViewStateStore};

/// `lat`, `lon` and `zoom` taken from a page query string.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ViewOverrides {
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub zoom: Option<u8>,
}

impl ViewOverrides {
    /// Parse `?lat=..&lon=..&zoom=..` (leading `?` optional). Values are
    /// percent-decoded; pairs without `=` or with unparsable numbers are
    /// ignored.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut out = ViewOverrides::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            match &*key {
                "lon" => out.lon = value.parse().ok().filter(|v: &f64| v.is_finite()),
                "lat" => out.lat = value.parse().ok().filter(|v: &f64| v.is_finite()),
                "zoom" => {
                    out.zoom = value
                        .parse::<f64>()
                        .ok()
                        .filter(|z| z.is_finite())
                        .map(|z| clamp_zoom(z.round() as i64))
                }
                _ => {}
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.lon.is_none() && self.lat.is_none() && self.zoom.is_none()
    }

    pub fn apply_to(&self, base: PersistedView) -> PersistedView {
        PersistedView {
            lon: self.lon.unwrap_or(base.lon),
            lat: self.lat.unwrap_or(base.lat),
            zoom: self.zoom.unwrap_or(base.zoom),
        }
    }
}

pub fn resolve_initial_view(
    default: PersistedView,
    persisted: Option<PersistedView>,
    overrides: &ViewOverrides,
) -> PersistedView {
    overrides.apply_to(persisted.unwrap_or(default))
}

/// Like [`resolve_initial_view`], reading the persisted view from `store`.
/// A store error is logged and treated as no state.
pub fn load_initial_view(
    store: &dyn ViewStateStore,
    default: PersistedView,
    overrides: &ViewOverrides,
) -> PersistedView {
    let persisted = match store.load() {
        Ok(v) => v,
        Err(err) => {
            warn!(%err, "persisted view unavailable; using default");
            None
        }
    };
    let view = resolve_initial_view(default, persisted, overrides);
    debug!(
        lon = view.lon,
        lat = view.lat,
        zoom = view.zoom,
        persisted = persisted.is_some(),
        overridden = !overrides.is_empty(),
        "initial view resolved"
    );
    view
}
