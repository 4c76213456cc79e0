use std::cell::{Cell, RefCell};

use foundation::math::Vec2;

use crate::protocol::{Record, Records, encode_feed};
use crate::request::FeedQuery;
use crate::transport::{FeedTransport, FetchError, LocalBoxFuture};

/// An in-process feed serving a fixed record list over the same protocol.
///
/// Selection follows the feed endpoint: inverted bounds are swapped, then a
/// record matches when `l <= lon < r` and `b <= lat < t`. The `tt` type is
/// not used for selection. Every query is logged so callers can inspect
/// what was asked.
#[derive(Debug, Default)]
pub struct StaticFeed {
    records: RefCell<Vec<Record>>,
    offline: Cell<bool>,
    requests: RefCell<Vec<FeedQuery>>,
}

impl StaticFeed {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: RefCell::new(records),
            ..Self::default()
        }
    }

    /// Load from a feed dump; returns the feed and the number of skipped lines.
    pub fn from_tsv(body: &str) -> (Self, usize) {
        let mut parsed = Records::from_body(body);
        let records: Vec<Record> = parsed.by_ref().collect();
        (Self::new(records), parsed.skipped_lines())
    }

    pub fn replace_records(&self, records: Vec<Record>) {
        *self.records.borrow_mut() = records;
    }

    /// While offline every request fails at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    pub fn requests(&self) -> Vec<FeedQuery> {
        self.requests.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Records the endpoint would return for `query`.
    pub fn select(&self, query: &FeedQuery) -> Vec<Record> {
        let b = query.bounds.normalized();
        self.records
            .borrow()
            .iter()
            .filter(|r| {
                let p = Vec2::new(r.longitude, r.latitude);
                p.x >= b.left && p.x < b.right && p.y >= b.bottom && p.y < b.top
            })
            .cloned()
            .collect()
    }
}

impl FeedTransport for StaticFeed {
    fn get<'a>(&'a self, query: &'a FeedQuery) -> LocalBoxFuture<'a, Result<String, FetchError>> {
        self.requests.borrow_mut().push(query.clone());
        let result = if self.offline.get() {
            Err(FetchError::Transport("static feed offline".to_string()))
        } else {
            Ok(encode_feed(&self.select(query)))
        };
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::StaticFeed;
    use crate::protocol::{IconOffset, IconSize, Record, encode_feed};
    use crate::request::{FeedQuery, RecordKind};
    use crate::transport::FeedTransport;
    use foundation::bounds::Bounds;

    fn at(lat: f64, lon: f64) -> Record {
        Record {
            latitude: lat,
            longitude: lon,
            icon_url: "./nuke-central-20x20.png".to_string(),
            icon_size: IconSize { w: 20, h: 20 },
            icon_offset: IconOffset { dx: -10, dy: -10 },
            title: "<h2>x</h2>".to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn selection_is_half_open_and_swaps_inverted_bounds() {
        let feed = StaticFeed::new(vec![at(0.0, 0.0), at(10.0, 10.0), at(5.0, 5.0)]);
        let q = FeedQuery::new(Bounds::new(10.0, 10.0, 0.0, 0.0), 5, RecordKind::All);
        let hits: Vec<f64> = feed.select(&q).iter().map(|r| r.latitude).collect();
        assert_eq!(hits, vec![0.0, 5.0]);
    }

    #[test]
    fn serves_protocol_and_logs_requests() {
        let feed = StaticFeed::new(vec![at(1.0, 1.0)]);
        let q = FeedQuery::new(Bounds::new(0.0, 0.0, 2.0, 2.0), 5, RecordKind::Power);
        let body = pollster::block_on(feed.get(&q)).expect("body");
        assert_eq!(body, encode_feed(&[at(1.0, 1.0)]));
        assert_eq!(feed.requests(), vec![q]);
    }

    #[test]
    fn offline_feed_fails() {
        let feed = StaticFeed::new(vec![at(1.0, 1.0)]);
        feed.set_offline(true);
        let q = FeedQuery::new(Bounds::new(0.0, 0.0, 2.0, 2.0), 5, RecordKind::All);
        assert!(pollster::block_on(feed.get(&q)).is_err());
    }

    #[test]
    fn loads_from_dump() {
        let dump = format!("{}garbage line\n", encode_feed(&[at(1.0, 1.0), at(2.0, 2.0)]));
        let (feed, skipped) = StaticFeed::from_tsv(&dump);
        assert_eq!(feed.len(), 2);
        assert_eq!(skipped, 1);
    }
}
