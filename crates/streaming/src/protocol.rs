//! Wire format of the record feed.
//!
//! A response is `text/plain; charset=UTF-8`: one header line, then one
//! tab-separated line per record in the order
//! `lat, lon, icon, iconSize, iconOffset, title, description`, each line
//! terminated by `\n`. `iconSize` and `iconOffset` are comma-joined pairs.

use foundation::math::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const HEADER: &str = "lat\tlon\ticon\ticonSize\ticonOffset\ttitle\tdescription";
pub const FIELD_COUNT: usize = 7;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconSize {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconOffset {
    pub dx: i32,
    pub dy: i32,
}

/// A geolocated facility as delivered by the feed. Never mutated after decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Decimal degrees, storage projection.
    pub latitude: f64,
    pub longitude: f64,
    pub icon_url: String,
    pub icon_size: IconSize,
    pub icon_offset: IconOffset,
    /// Rich text (HTML fragment).
    pub title: String,
    /// Rich text (HTML fragment).
    pub description: String,
}

/// Marker identity: the exact `(latitude, longitude)` pair.
///
/// Compared bitwise after folding `-0.0` into `0.0`; two records at the same
/// coordinate are the same marker whatever their other fields say.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoordKey {
    lat_bits: u64,
    lon_bits: u64,
}

impl CoordKey {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            lat_bits: (latitude + 0.0).to_bits(),
            lon_bits: (longitude + 0.0).to_bits(),
        }
    }

    pub fn latitude(&self) -> f64 {
        f64::from_bits(self.lat_bits)
    }

    pub fn longitude(&self) -> f64 {
        f64::from_bits(self.lon_bits)
    }
}

impl Record {
    pub fn coord_key(&self) -> CoordKey {
        CoordKey::new(self.latitude, self.longitude)
    }

    /// `(lon, lat)` in storage degrees.
    pub fn storage_point(&self) -> Vec2 {
        Vec2::new(self.longitude, self.latitude)
    }

    pub fn popup_html(&self) -> String {
        format!("{}{}", self.title, self.description)
    }

    /// Encode as one feed line, without the trailing newline.
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{},{}\t{},{}\t{}\t{}",
            self.latitude,
            self.longitude,
            self.icon_url,
            self.icon_size.w,
            self.icon_size.h,
            self.icon_offset.dx,
            self.icon_offset.dy,
            self.title,
            self.description,
        )
    }
}

/// Why a single feed line was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    Blank,
    FieldCount { found: usize },
    Coordinate(String),
    IconSize(String),
    IconOffset(String),
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineError::Blank => write!(f, "blank line"),
            LineError::FieldCount { found } => {
                write!(f, "expected {FIELD_COUNT} fields, found {found}")
            }
            LineError::Coordinate(raw) => write!(f, "invalid coordinate: {raw:?}"),
            LineError::IconSize(raw) => write!(f, "invalid icon size: {raw:?}"),
            LineError::IconOffset(raw) => write!(f, "invalid icon offset: {raw:?}"),
        }
    }
}

impl std::error::Error for LineError {}

/// Decode one data line (no header, no newline).
pub fn parse_line(line: &str) -> Result<Record, LineError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return Err(LineError::Blank);
    }

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != FIELD_COUNT {
        return Err(LineError::FieldCount {
            found: fields.len(),
        });
    }

    let latitude = parse_coordinate(fields[0])?;
    let longitude = parse_coordinate(fields[1])?;
    let (w, h) =
        parse_pair::<u32>(fields[3]).ok_or_else(|| LineError::IconSize(fields[3].to_string()))?;
    let (dx, dy) =
        parse_pair::<i32>(fields[4]).ok_or_else(|| LineError::IconOffset(fields[4].to_string()))?;

    Ok(Record {
        latitude,
        longitude,
        icon_url: fields[2].to_string(),
        icon_size: IconSize { w, h },
        icon_offset: IconOffset { dx, dy },
        title: fields[5].to_string(),
        description: fields[6].to_string(),
    })
}

fn parse_coordinate(raw: &str) -> Result<f64, LineError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| LineError::Coordinate(raw.to_string()))
}

fn parse_pair<T: std::str::FromStr>(raw: &str) -> Option<(T, T)> {
    let (a, b) = raw.split_once(',')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

/// Encode a complete feed body: header, one line per record, trailing newline.
pub fn encode_feed<'a>(records: impl IntoIterator<Item = &'a Record>) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for r in records {
        out.push_str(&r.to_line());
        out.push('\n');
    }
    out
}

/// Lazily decoded records of one feed response.
///
/// The header line is discarded up front. Data lines are decoded on demand;
/// malformed ones are skipped and counted, blank ones (the segment after the
/// final newline) are skipped silently.
#[derive(Debug, Default)]
pub struct Records {
    body: String,
    cursor: usize,
    skipped: usize,
    failed: bool,
}

impl Records {
    pub fn from_body(body: impl Into<String>) -> Self {
        let body = body.into();
        let cursor = match body.find('\n') {
            Some(i) => i + 1,
            None => body.len(),
        };
        if !body.is_empty() && body[..cursor].trim_end() != HEADER {
            debug!(
                header = body[..cursor].trim_end(),
                "unexpected feed header; discarding it anyway"
            );
        }
        Self {
            body,
            cursor,
            skipped: 0,
            failed: false,
        }
    }

    /// The result of a round trip that did not complete: no records.
    pub fn failed() -> Self {
        Self {
            failed: true,
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Malformed lines skipped so far (grows as the sequence is consumed).
    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }
}

impl Iterator for Records {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            if self.cursor >= self.body.len() {
                return None;
            }
            let start = self.cursor;
            let end = match self.body[start..].find('\n') {
                Some(i) => start + i,
                None => self.body.len(),
            };
            self.cursor = end + 1;

            match parse_line(&self.body[start..end]) {
                Ok(record) => return Some(record),
                Err(LineError::Blank) => continue,
                Err(err) => {
                    self.skipped += 1;
                    debug!(%err, offset = start, "skipping malformed feed line");
                }
            }
        }
    }
}
