use std::collections::BTreeMap;

/// Monotonic counters kept by a map session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Counter {
    Settles,
    FetchesIssued,
    FetchFailures,
    LinesSkipped,
    MarkersAdded,
    MarkersRemoved,
    MarkersRetained,
    DuplicatesSuppressed,
    CompletionsDropped,
    HeatRebuilds,
}

/// Point-in-time values; the last write wins.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gauge {
    ActiveMarkers,
    HeatSources,
    Zoom,
}

impl Counter {
    pub fn name(self) -> &'static str {
        match self {
            Counter::Settles => "settles",
            Counter::FetchesIssued => "fetch.issued",
            Counter::FetchFailures => "fetch.failures",
            Counter::LinesSkipped => "feed.lines_skipped",
            Counter::MarkersAdded => "markers.added",
            Counter::MarkersRemoved => "markers.removed",
            Counter::MarkersRetained => "markers.retained",
            Counter::DuplicatesSuppressed => "markers.duplicates",
            Counter::CompletionsDropped => "completions.dropped",
            Counter::HeatRebuilds => "heat.rebuilds",
        }
    }
}

impl Gauge {
    pub fn name(self) -> &'static str {
        match self {
            Gauge::ActiveMarkers => "markers.active",
            Gauge::HeatSources => "heat.sources",
            Gauge::Zoom => "view.zoom",
        }
    }
}

/// Deterministic metrics aggregation.
///
/// Sorted maps keep snapshots stable so they can be logged and compared.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<Counter, u64>,
    gauges: BTreeMap<Gauge, i64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, c: Counter) -> u64 {
        self.counters.get(&c).copied().unwrap_or(0)
    }

    pub fn inc(&mut self, c: Counter, by: u64) {
        if by == 0 {
            return;
        }
        *self.counters.entry(c).or_insert(0) += by;
    }

    pub fn gauge(&self, g: Gauge) -> Option<i64> {
        self.gauges.get(&g).copied()
    }

    pub fn set_gauge(&mut self, g: Gauge, value: i64) {
        self.gauges.insert(g, value);
    }

    /// `name=value` pairs, counters first, each group sorted.
    pub fn snapshot(&self) -> Vec<(&'static str, i64)> {
        let counters = self
            .counters
            .iter()
            .map(|(c, v)| (c.name(), i64::try_from(*v).unwrap_or(i64::MAX)));
        let gauges = self.gauges.iter().map(|(g, v)| (g.name(), *v));
        counters.chain(gauges).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Counter, Gauge, Metrics};
    use pretty_assertions::assert_eq;

    #[test]
    fn counters_accumulate() {
        let mut m = Metrics::new();
        m.inc(Counter::MarkersAdded, 1);
        m.inc(Counter::MarkersAdded, 2);
        assert_eq!(m.counter(Counter::MarkersAdded), 3);
        assert_eq!(m.counter(Counter::MarkersRemoved), 0);
    }

    #[test]
    fn gauges_overwrite() {
        let mut m = Metrics::new();
        assert_eq!(m.gauge(Gauge::ActiveMarkers), None);
        m.set_gauge(Gauge::ActiveMarkers, 10);
        m.set_gauge(Gauge::ActiveMarkers, 11);
        assert_eq!(m.gauge(Gauge::ActiveMarkers), Some(11));
    }

    #[test]
    fn snapshot_is_stably_sorted_and_skips_zero_increments() {
        let mut m = Metrics::new();
        m.inc(Counter::MarkersRemoved, 1);
        m.inc(Counter::Settles, 1);
        m.inc(Counter::FetchFailures, 0);
        m.set_gauge(Gauge::Zoom, 6);
        m.set_gauge(Gauge::ActiveMarkers, 2);

        assert_eq!(
            m.snapshot(),
            vec![
                ("settles", 1),
                ("markers.removed", 1),
                ("markers.active", 2),
                ("view.zoom", 6),
            ]
        );
    }
}
