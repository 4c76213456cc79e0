use tracing::{debug, warn};

use crate::protocol::Records;
use crate::request::FeedQuery;
use crate::transport::{FeedTransport, FetchError};

/// Issues scoped queries against the record feed.
#[derive(Debug)]
pub struct RecordFetcher<T> {
    transport: T,
}

impl<T: FeedTransport> RecordFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// One round trip; errors are returned to the caller.
    pub async fn try_fetch(&self, query: &FeedQuery) -> Result<Records, FetchError> {
        let body = self.transport.get(query).await?;
        debug!(
            query = %query.query_string(),
            bytes = body.len(),
            "feed response received"
        );
        Ok(Records::from_body(body))
    }

    /// One round trip; a failure yields an empty (failed) sequence instead
    /// of an error. No retry.
    pub async fn fetch(&self, query: &FeedQuery) -> Records {
        match self.try_fetch(query).await {
            Ok(records) => records,
            Err(err) => {
                warn!(%err, kind = query.kind.as_str(), "record fetch failed; treating as empty");
                Records::failed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RecordFetcher;
    use crate::protocol::Record;
    use crate::request::{FeedQuery, RecordKind};
    use crate::static_feed::StaticFeed;
    use crate::transport::{FeedTransport, FetchError, LocalBoxFuture};
    use foundation::bounds::Bounds;

    struct FixedBody(&'static str);

    impl FeedTransport for FixedBody {
        fn get<'a>(
            &'a self,
            _query: &'a FeedQuery,
        ) -> LocalBoxFuture<'a, Result<String, FetchError>> {
            let body = self.0.to_string();
            Box::pin(async move { Ok(body) })
        }
    }

    fn query() -> FeedQuery {
        FeedQuery::new(Bounds::new(-10.0, 40.0, 10.0, 55.0), 6, RecordKind::All)
    }

    #[test]
    fn fetch_decodes_the_body() {
        let fetcher = RecordFetcher::new(FixedBody(
            concat!(
                "lat\tlon\ticon\ticonSize\ticonOffset\ttitle\tdescription\n",
                "48.5\t2.3\t./power-20x20.png\t20,20\t-10,-10\t<h2>Plant A</h2>\t<p>desc</p>\n",
            ),
        ));
        let records: Vec<Record> = pollster::block_on(fetcher.fetch(&query())).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].latitude, 48.5);
        assert_eq!(records[0].longitude, 2.3);
    }

    #[test]
    fn transport_failure_is_an_empty_result() {
        let feed = StaticFeed::new(Vec::new());
        feed.set_offline(true);
        let fetcher = RecordFetcher::new(feed);

        assert!(pollster::block_on(fetcher.try_fetch(&query())).is_err());

        let mut records = pollster::block_on(fetcher.fetch(&query()));
        assert!(records.is_failed());
        assert!(records.next().is_none());
    }

    #[test]
    fn larger_bounds_return_a_superset() {
        let (feed, _) = StaticFeed::from_tsv(&crate::protocol::encode_feed(&[
            sample(45.0, 1.0),
            sample(47.0, 3.0),
            sample(52.0, 9.0),
        ]));
        let fetcher = RecordFetcher::new(feed);
        let inner = FeedQuery::new(Bounds::new(0.0, 44.0, 4.0, 48.0), 6, RecordKind::All);
        let outer = FeedQuery::new(Bounds::new(-1.0, 43.0, 10.0, 53.0), 6, RecordKind::All);

        let a: Vec<Record> = pollster::block_on(fetcher.fetch(&inner)).collect();
        let b: Vec<Record> = pollster::block_on(fetcher.fetch(&outer)).collect();
        assert_eq!(a.len(), 2);
        assert!(a.iter().all(|r| b.contains(r)));
        assert_eq!(b.len(), 3);
    }

    fn sample(lat: f64, lon: f64) -> Record {
        crate::protocol::parse_line(&format!("{lat}\t{lon}\ti.png\t20,20\t-10,-10\t<h2>s</h2>\t"))
            .expect("valid line")
    }
}
