//! Last-known map view, persisted per client.
//!
//! The view is written as three independent cookie-style entries (`lon`,
//! `lat`, `zoom`), each expiring 30 days after the write and scoped to the
//! site root. It is read once at startup; last write wins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use foundation::math::clamp_zoom;
use foundation::time::{Clock, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const KEY_LON: &str = "lon";
pub const KEY_LAT: &str = "lat";
pub const KEY_ZOOM: &str = "zoom";
pub const VIEW_STATE_TTL_DAYS: i64 = 30;
pub const ROOT_PATH: &str = "/";

/// Center (storage degrees) and zoom of the last settled view.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedView {
    pub lon: f64,
    pub lat: f64,
    pub zoom: u8,
}

impl PersistedView {
    pub fn new(lon: f64, lat: f64, zoom: u8) -> Self {
        Self { lon, lat, zoom }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewStateError {
    StorageUnavailable,
    Corrupt(String),
    Io(String),
}

impl std::fmt::Display for ViewStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewStateError::StorageUnavailable => write!(f, "client storage unavailable"),
            ViewStateError::Corrupt(msg) => write!(f, "view state storage corrupt: {msg}"),
            ViewStateError::Io(msg) => write!(f, "view state storage error: {msg}"),
        }
    }
}

impl std::error::Error for ViewStateError {}

pub trait ViewStateStore {
    fn save(&mut self, view: PersistedView) -> Result<(), ViewStateError>;
    /// `Ok(None)` when nothing (or nothing usable) is stored.
    fn load(&self) -> Result<Option<PersistedView>, ViewStateError>;
}

impl<S: ViewStateStore + ?Sized> ViewStateStore for Box<S> {
    fn save(&mut self, view: PersistedView) -> Result<(), ViewStateError> {
        (**self).save(view)
    }

    fn load(&self) -> Result<Option<PersistedView>, ViewStateError> {
        (**self).load()
    }
}

/// A single cookie-like entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieEntry {
    pub value: String,
    pub expires_at_ms: i64,
    pub path: String,
}

impl CookieEntry {
    pub fn is_live(&self, now: Timestamp) -> bool {
        now.0 < self.expires_at_ms
    }
}

/// String key/value persistence with per-entry expiry.
pub trait KeyValueStore {
    fn set(&mut self, key: &str, entry: CookieEntry) -> Result<(), ViewStateError>;
    /// Value of `key` if present and not expired at `now`.
    fn get(&self, key: &str, now: Timestamp) -> Result<Option<String>, ViewStateError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryCookieJar {
    entries: BTreeMap<String, CookieEntry>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, key: &str) -> Option<&CookieEntry> {
        self.entries.get(key)
    }
}

impl KeyValueStore for MemoryCookieJar {
    fn set(&mut self, key: &str, entry: CookieEntry) -> Result<(), ViewStateError> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn get(&self, key: &str, now: Timestamp) -> Result<Option<String>, ViewStateError> {
        Ok(self
            .entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }
}

/// Cookie jar persisted as a JSON file; used by native front ends to keep
/// the view across runs.
#[derive(Debug)]
pub struct FileCookieJar {
    path: PathBuf,
    entries: BTreeMap<String, CookieEntry>,
}

impl FileCookieJar {
    /// Open (or start) the jar at `path`. A missing file is an empty jar.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ViewStateError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| ViewStateError::Corrupt(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(ViewStateError::Io(format!("{}: {e}", path.display()))),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), ViewStateError> {
        let raw = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| ViewStateError::Io(e.to_string()))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| ViewStateError::Io(format!("{}: {e}", self.path.display())))
    }
}

impl KeyValueStore for FileCookieJar {
    fn set(&mut self, key: &str, entry: CookieEntry) -> Result<(), ViewStateError> {
        self.entries.insert(key.to_string(), entry);
        self.flush()
    }

    fn get(&self, key: &str, now: Timestamp) -> Result<Option<String>, ViewStateError> {
        Ok(self
            .entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }
}

/// [`ViewStateStore`] over any cookie-like [`KeyValueStore`].
#[derive(Debug)]
pub struct CookieViewStateStore<K, C> {
    jar: K,
    clock: C,
    ttl_days: i64,
}

impl<K: KeyValueStore, C: Clock> CookieViewStateStore<K, C> {
    pub fn new(jar: K, clock: C) -> Self {
        Self::with_ttl_days(jar, clock, VIEW_STATE_TTL_DAYS)
    }

    pub fn with_ttl_days(jar: K, clock: C, ttl_days: i64) -> Self {
        Self {
            jar,
            clock,
            ttl_days,
        }
    }

    pub fn jar(&self) -> &K {
        &self.jar
    }

    fn write(&mut self, key: &str, value: String) -> Result<(), ViewStateError> {
        let entry = CookieEntry {
            value,
            expires_at_ms: self.clock.now().plus_days(self.ttl_days).0,
            path: ROOT_PATH.to_string(),
        };
        self.jar.set(key, entry)
    }
}

impl<K: KeyValueStore, C: Clock> ViewStateStore for CookieViewStateStore<K, C> {
    fn save(&mut self, view: PersistedView) -> Result<(), ViewStateError> {
        self.write(KEY_LON, view.lon.to_string())?;
        self.write(KEY_LAT, view.lat.to_string())?;
        self.write(KEY_ZOOM, view.zoom.to_string())?;
        debug!(lon = view.lon, lat = view.lat, zoom = view.zoom, "view state saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedView>, ViewStateError> {
        let now = self.clock.now();
        let (Some(lon), Some(lat), Some(zoom)) = (
            self.jar.get(KEY_LON, now)?,
            self.jar.get(KEY_LAT, now)?,
            self.jar.get(KEY_ZOOM, now)?,
        ) else {
            return Ok(None);
        };

        match parse_view(&lon, &lat, &zoom) {
            Some(view) => Ok(Some(view)),
            None => {
                warn!(%lon, %lat, %zoom, "ignoring unparsable view state");
                Ok(None)
            }
        }
    }
}

fn parse_view(lon: &str, lat: &str, zoom: &str) -> Option<PersistedView> {
    let lon = lon.trim().parse::<f64>().ok()?;
    let lat = lat.trim().parse::<f64>().ok()?;
    // Browsers may hand back a fractional zoom written by an older page.
    let zoom = zoom.trim().parse::<f64>().ok().filter(|z| z.is_finite())?;
    Some(PersistedView::new(lon, lat, clamp_zoom(zoom.round() as i64)))
}

/// Wall-clock time from the host.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Timestamp(ms)
    }
}

#[cfg(target_arch = "wasm32")]
impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp(js_sys::Date::now() as i64)
    }
}

#[cfg(target_arch = "wasm32")]
mod document_cookies {
    use super::{CookieEntry, KeyValueStore, ViewStateError};
    use foundation::time::Timestamp;
    use wasm_bindgen::{JsCast, JsValue};

    /// Entries stored in `document.cookie`; the browser enforces expiry.
    #[derive(Debug)]
    pub struct DocumentCookieJar {
        document: web_sys::HtmlDocument,
    }

    impl DocumentCookieJar {
        pub fn new() -> Result<Self, ViewStateError> {
            let document = web_sys::window()
                .and_then(|w| w.document())
                .ok_or(ViewStateError::StorageUnavailable)?
                .dyn_into::<web_sys::HtmlDocument>()
                .map_err(|_| ViewStateError::StorageUnavailable)?;
            Ok(Self { document })
        }
    }

    impl KeyValueStore for DocumentCookieJar {
        fn set(&mut self, key: &str, entry: CookieEntry) -> Result<(), ViewStateError> {
            let expires: String = js_sys::Date::new(&JsValue::from_f64(entry.expires_at_ms as f64))
                .to_utc_string()
                .into();
            let cookie = format!(
                "{key}={}; expires={expires}; path={}",
                entry.value, entry.path
            );
            self.document
                .set_cookie(&cookie)
                .map_err(|e| ViewStateError::Io(format!("set cookie failed: {:?}", e)))
        }

        fn get(&self, key: &str, _now: Timestamp) -> Result<Option<String>, ViewStateError> {
            let all = self
                .document
                .cookie()
                .map_err(|e| ViewStateError::Io(format!("read cookie failed: {:?}", e)))?;
            let prefix = format!("{key}=");
            Ok(all
                .split(';')
                .map(|c| c.trim_start())
                .find_map(|c| c.strip_prefix(prefix.as_str()))
                .map(str::to_string))
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use document_cookies::DocumentCookieJar;

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct DocumentCookieJar;

#[cfg(not(target_arch = "wasm32"))]
impl DocumentCookieJar {
    pub fn new() -> Result<Self, ViewStateError> {
        Err(ViewStateError::StorageUnavailable)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyValueStore for DocumentCookieJar {
    fn set(&mut self, _key: &str, _entry: CookieEntry) -> Result<(), ViewStateError> {
        Err(ViewStateError::StorageUnavailable)
    }

    fn get(&self, _key: &str, _now: Timestamp) -> Result<Option<String>, ViewStateError> {
        Err(ViewStateError::StorageUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundation::time::{MS_PER_DAY, ManualClock};
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn store(clock: Rc<ManualClock>) -> CookieViewStateStore<MemoryCookieJar, Rc<ManualClock>> {
        CookieViewStateStore::new(MemoryCookieJar::new(), clock)
    }

    #[test]
    fn empty_store_loads_nothing() {
        let s = store(Rc::new(ManualClock::new(Timestamp(0))));
        assert_eq!(s.load(), Ok(None));
    }

    #[test]
    fn saved_view_reloads_before_expiry() {
        let clock = Rc::new(ManualClock::new(Timestamp(1_700_000_000_000)));
        let mut s = store(clock.clone());
        s.save(PersistedView::new(2.76, 46.88, 6)).unwrap();

        clock.advance_days(29);
        assert_eq!(s.load(), Ok(Some(PersistedView::new(2.76, 46.88, 6))));

        clock.advance_days(1);
        assert_eq!(s.load(), Ok(None));
    }

    #[test]
    fn entries_expire_thirty_days_after_write_at_root_path() {
        let start = Timestamp(5_000);
        let mut s = store(Rc::new(ManualClock::new(start)));
        s.save(PersistedView::new(1.0, 2.0, 3)).unwrap();

        for key in [KEY_LON, KEY_LAT, KEY_ZOOM] {
            let entry = s.jar().entry(key).expect("entry written");
            assert_eq!(entry.expires_at_ms, start.0 + 30 * MS_PER_DAY);
            assert_eq!(entry.path, "/");
        }
    }

    #[test]
    fn last_write_wins() {
        let mut s = store(Rc::new(ManualClock::new(Timestamp(0))));
        s.save(PersistedView::new(1.0, 2.0, 3)).unwrap();
        s.save(PersistedView::new(4.0, 5.0, 6)).unwrap();
        assert_eq!(s.load(), Ok(Some(PersistedView::new(4.0, 5.0, 6))));
    }

    #[test]
    fn partial_or_garbled_state_is_absent() {
        let clock = Rc::new(ManualClock::new(Timestamp(0)));
        let live = CookieEntry {
            value: "1.5".to_string(),
            expires_at_ms: MS_PER_DAY,
            path: ROOT_PATH.to_string(),
        };

        let mut jar = MemoryCookieJar::new();
        jar.set(KEY_LON, live.clone()).unwrap();
        jar.set(KEY_LAT, live.clone()).unwrap();
        let s = CookieViewStateStore::new(jar.clone(), clock.clone());
        assert_eq!(s.load(), Ok(None));

        jar.set(
            KEY_ZOOM,
            CookieEntry {
                value: "six".to_string(),
                ..live.clone()
            },
        )
        .unwrap();
        let s = CookieViewStateStore::new(jar, clock);
        assert_eq!(s.load(), Ok(None));
    }

    #[test]
    fn fractional_zoom_rounds() {
        assert_eq!(parse_view("1", "2", "6.4"), Some(PersistedView::new(1.0, 2.0, 6)));
        assert_eq!(parse_view("1", "2", "99"), Some(PersistedView::new(1.0, 2.0, 18)));
    }

    #[test]
    fn file_jar_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.json");
        let clock = Rc::new(ManualClock::new(Timestamp(0)));

        let mut s = CookieViewStateStore::new(FileCookieJar::open(&path).unwrap(), clock.clone());
        s.save(PersistedView::new(2.76, 46.88, 6)).unwrap();

        let reopened = CookieViewStateStore::new(FileCookieJar::open(&path).unwrap(), clock);
        assert_eq!(reopened.load(), Ok(Some(PersistedView::new(2.76, 46.88, 6))));
    }

    #[test]
    fn corrupt_file_jar_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("view.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            FileCookieJar::open(&path),
            Err(ViewStateError::Corrupt(_))
        ));
    }

    #[test]
    fn document_jar_is_unavailable_natively() {
        assert_eq!(
            DocumentCookieJar::new().unwrap_err(),
            ViewStateError::StorageUnavailable
        );
    }
}
