//! The "view settled" dispatcher.
//!
//! A settle is handled in two phases. [`MapSession::dispatch`] runs every
//! bound listener's planning step in registration order and then persists the
//! view; the returned [`PendingFetches`] are resolved by the caller (see
//! [`MapSession::fetch`]) and fed back through [`MapSession::complete`] in
//! whatever order they finish. [`MapSession::view_settled`] does all three on
//! the current thread.

use foundation::ids::MarkerId;
use foundation::view::MapView;
use futures_util::future::join;
use layers::heatmap::{HeatReport, HeatTicket, HeatmapController};
use layers::layer::{Layer, LayerId};
use layers::markers::{MarkerSyncReport, MarkerSynchronizer, MarkerTicket};
use layers::surface::MapSurface;
use runtime::event_bus::EventBus;
use runtime::listeners::{ListenerId, ListenerRegistry};
use runtime::metrics::{Counter, Gauge, Metrics};
use serde::{Deserialize, Serialize};
use streaming::fetcher::RecordFetcher;
use streaming::protocol::Records;
use streaming::request::RequestSeq;
use streaming::transport::FeedTransport;
use tracing::{debug, info, warn};
use viewstate::{PersistedView, ViewStateStore};

use crate::config::SessionConfig;

/// What to do with a fetch that completes after a newer one was issued for
/// the same layer.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOrder {
    /// Apply it anyway; the most recently completed fetch wins.
    #[default]
    LastCompletedWins,
    /// Drop it.
    DropSuperseded,
}

/// Handlers bound to the view-settled signal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Listener {
    Heatmap,
    Markers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingFetches {
    pub settle: u64,
    pub view: MapView,
    pub heat: Option<HeatTicket>,
    pub markers: Option<MarkerTicket>,
}

impl PendingFetches {
    pub fn len(&self) -> usize {
        usize::from(self.heat.is_some()) + usize::from(self.markers.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A finished fetch, ready to be applied to its layer.
#[derive(Debug)]
pub enum Completion {
    Heat(HeatTicket, Records),
    Markers(MarkerTicket, Records),
}

impl Completion {
    pub fn layer(&self) -> LayerId {
        match self {
            Completion::Heat(..) => LayerId::HEAT,
            Completion::Markers(..) => LayerId::MARKERS,
        }
    }

    pub fn seq(&self) -> RequestSeq {
        match self {
            Completion::Heat(t, _) => t.seq,
            Completion::Markers(t, _) => t.seq,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Heat(HeatReport),
    Markers(MarkerSyncReport),
    Dropped { layer: LayerId, seq: RequestSeq },
}

/// Outcome of one [`MapSession::view_settled`].
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SettleSummary {
    pub settle: u64,
    pub view: Option<PersistedView>,
    pub heat: Option<HeatReport>,
    pub markers: Option<MarkerSyncReport>,
    pub dropped: usize,
}

pub struct MapSession<T, S, V> {
    surface: S,
    fetcher: RecordFetcher<T>,
    heat: HeatmapController,
    markers: MarkerSynchronizer,
    store: V,
    listeners: ListenerRegistry<Listener>,
    events: EventBus,
    metrics: Metrics,
    completion: CompletionOrder,
    view: Option<MapView>,
}

impl<T: FeedTransport, S: MapSurface, V: ViewStateStore> MapSession<T, S, V> {
    /// Build a session with both layers bound, heat first.
    pub fn new(config: &SessionConfig, transport: T, surface: S, store: V) -> Self {
        let mut listeners = ListenerRegistry::new();
        listeners.register(Listener::Heatmap);
        listeners.register(Listener::Markers);
        Self {
            surface,
            fetcher: RecordFetcher::new(transport),
            heat: HeatmapController::new(config.heatmap),
            markers: MarkerSynchronizer::new(config.retention),
            store,
            listeners,
            events: EventBus::new(),
            metrics: Metrics::new(),
            completion: config.completion,
            view: None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn transport(&self) -> &T {
        self.fetcher.transport()
    }

    pub fn heat(&self) -> &HeatmapController {
        &self.heat
    }

    pub fn markers(&self) -> &MarkerSynchronizer {
        &self.markers
    }

    pub fn store(&self) -> &V {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn completion_order(&self) -> CompletionOrder {
        self.completion
    }

    /// Last dispatched view.
    pub fn view(&self) -> Option<MapView> {
        self.view
    }

    pub fn bind(&mut self, listener: Listener) -> ListenerId {
        self.listeners.register(listener)
    }

    /// Returns how many bindings were removed.
    pub fn unbind(&mut self, listener: Listener) -> usize {
        self.listeners.unregister_key(listener)
    }

    pub fn is_bound(&self, listener: Listener) -> bool {
        self.listeners.is_registered(listener)
    }

    /// Plan every bound listener's fetch for `view`, then persist the view.
    pub fn dispatch(&mut self, view: MapView) -> PendingFetches {
        let settle = self.events.begin_settle();
        let viewport = view.viewport();
        let mut pending = PendingFetches {
            settle,
            view,
            heat: None,
            markers: None,
        };

        for listener in self.listeners.ordered() {
            match listener {
                Listener::Heatmap => {
                    let ticket = self.heat.plan(viewport, &mut self.surface);
                    self.events.emit(
                        "fetch",
                        format!(
                            "{} seq={} {}",
                            self.heat.name(),
                            ticket.seq.0,
                            ticket.query.query_string()
                        ),
                    );
                    pending.heat = Some(ticket);
                }
                Listener::Markers => {
                    let ticket = self.markers.plan(viewport);
                    self.events.emit(
                        "fetch",
                        format!(
                            "{} seq={} {}",
                            self.markers.name(),
                            ticket.seq.0,
                            ticket.query.query_string()
                        ),
                    );
                    pending.markers = Some(ticket);
                }
            }
        }

        self.view = Some(view);
        self.metrics.inc(Counter::Settles, 1);
        self.metrics.inc(Counter::FetchesIssued, pending.len() as u64);
        self.metrics.set_gauge(Gauge::Zoom, i64::from(view.zoom));

        let center = view.center_storage();
        let persisted = PersistedView::new(center.x, center.y, view.zoom);
        if let Err(err) = self.store.save(persisted) {
            warn!(%err, "view state not saved");
            self.events.emit("state", format!("save failed: {err}"));
        }

        debug!(
            settle,
            zoom = view.zoom,
            lon = center.x,
            lat = center.y,
            fetches = pending.len(),
            "view settled"
        );
        pending
    }

    /// Run the pending fetches concurrently on the current thread.
    pub async fn fetch(&self, pending: PendingFetches) -> Vec<Completion> {
        let PendingFetches { heat, markers, .. } = pending;
        let fetcher = &self.fetcher;

        let heat = async move {
            match heat {
                Some(ticket) => {
                    let records = fetcher.fetch(&ticket.query).await;
                    Some(Completion::Heat(ticket, records))
                }
                None => None,
            }
        };
        let markers = async move {
            match markers {
                Some(ticket) => {
                    let records = fetcher.fetch(&ticket.query).await;
                    Some(Completion::Markers(ticket, records))
                }
                None => None,
            }
        };

        let (heat, markers) = join(heat, markers).await;
        heat.into_iter().chain(markers).collect()
    }

    /// Apply one finished fetch to its layer.
    pub fn complete(&mut self, completion: Completion) -> Applied {
        let layer = completion.layer();
        let seq = completion.seq();
        let superseded = match &completion {
            Completion::Heat(..) => self.heat.seq().is_superseded(seq),
            Completion::Markers(..) => self.markers.seq().is_superseded(seq),
        };
        if superseded && self.completion == CompletionOrder::DropSuperseded {
            self.metrics.inc(Counter::CompletionsDropped, 1);
            self.events
                .emit("dropped", format!("layer={} seq={}", layer.0, seq.0));
            debug!(layer = layer.0, seq = seq.0, "superseded completion dropped");
            return Applied::Dropped { layer, seq };
        }

        match completion {
            Completion::Heat(ticket, records) => {
                let report = self.heat.apply(&ticket, records, &mut self.surface);
                self.metrics.inc(Counter::HeatRebuilds, 1);
                self.metrics
                    .inc(Counter::FetchFailures, u64::from(report.fetch_failed));
                self.metrics
                    .inc(Counter::LinesSkipped, report.skipped_lines as u64);
                self.metrics
                    .set_gauge(Gauge::HeatSources, report.sources as i64);
                self.events.emit(
                    "heat",
                    format!(
                        "seq={} sources={} radius={:.2} visible={}",
                        ticket.seq.0,
                        report.sources,
                        self.heat.radius_px(),
                        self.heat.is_visible()
                    ),
                );
                Applied::Heat(report)
            }
            Completion::Markers(ticket, records) => {
                let report = self.markers.apply(&ticket, records, &mut self.surface);
                self.metrics.inc(Counter::MarkersAdded, report.added as u64);
                self.metrics.inc(Counter::MarkersRemoved, report.removed as u64);
                self.metrics.inc(
                    Counter::MarkersRetained,
                    (report.retained + report.unchanged) as u64,
                );
                self.metrics
                    .inc(Counter::DuplicatesSuppressed, report.duplicates as u64);
                self.metrics
                    .inc(Counter::FetchFailures, u64::from(report.fetch_failed));
                self.metrics
                    .inc(Counter::LinesSkipped, report.skipped_lines as u64);
                self.metrics
                    .set_gauge(Gauge::ActiveMarkers, self.markers.len() as i64);
                self.events.emit(
                    "markers",
                    format!(
                        "seq={} added={} removed={} kept={} active={}",
                        ticket.seq.0,
                        report.added,
                        report.removed,
                        report.retained + report.unchanged,
                        self.markers.len()
                    ),
                );
                Applied::Markers(report)
            }
        }
    }

    /// Dispatch, fetch and apply one settled view.
    pub async fn view_settled(&mut self, view: MapView) -> SettleSummary {
        let pending = self.dispatch(view);
        let mut summary = SettleSummary {
            settle: pending.settle,
            view: self.view.map(|v| {
                let c = v.center_storage();
                PersistedView::new(c.x, c.y, v.zoom)
            }),
            ..SettleSummary::default()
        };

        let completions = self.fetch(pending).await;
        for completion in completions {
            match self.complete(completion) {
                Applied::Heat(report) => summary.heat = Some(report),
                Applied::Markers(report) => summary.markers = Some(report),
                Applied::Dropped { .. } => summary.dropped += 1,
            }
        }

        info!(
            settle = summary.settle,
            markers = self.markers.len(),
            heat_sources = self.heat.sources().len(),
            "settle applied"
        );
        summary
    }

    /// Forward a marker click; see [`MarkerSynchronizer::click`].
    pub fn click(&mut self, id: MarkerId) -> Option<bool> {
        self.markers.click(id, &mut self.surface)
    }

    /// Unbind every listener and release all markers.
    pub fn close(&mut self) {
        self.listeners.unregister_key(Listener::Heatmap);
        self.listeners.unregister_key(Listener::Markers);
        let released = self.markers.clear(&mut self.surface);
        self.metrics.inc(Counter::MarkersRemoved, released as u64);
        self.metrics.set_gauge(Gauge::ActiveMarkers, 0);
        debug!(released, "session closed");
    }
}
