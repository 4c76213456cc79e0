//! Point markers for the records inside the current viewport.
//!
//! A sync runs in two steps so the fetch can happen in between:
//! [`MarkerSynchronizer::plan`] turns a viewport into a query, and
//! [`MarkerSynchronizer::apply`] diffs the fetched records against the active
//! set. Identity is the record's exact coordinate; the active set never holds
//! two markers for the same one.

use std::collections::{BTreeMap, BTreeSet};

use foundation::ids::{IdAllocator, MarkerId};
use foundation::math::{STORAGE, Vec2, to_render};
use foundation::view::Viewport;
use serde::{Deserialize, Serialize};
use streaming::protocol::{CoordKey, Record, Records};
use streaming::request::{FeedQuery, RecordKind, RequestSeq, SeqGuard};
use tracing::debug;

use crate::layer::{Layer, LayerId};
use crate::surface::{Icon, MarkerSurface, PopupSpec};

/// Which in-view markers survive a new sync even when the fresh fetch no
/// longer returns them.
///
/// Markers the policy does not retain are diffed against the fetch: those
/// whose coordinate came back are left in place, the rest are removed.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep in-view markers when the zoom level decreased.
    #[default]
    ZoomOut,
    /// Keep in-view markers when the zoom level increased.
    ZoomIn,
    /// Strict diff against every fetch.
    Never,
}

impl RetentionPolicy {
    pub fn should_retain(self, marker: &Marker, prev_zoom: Option<u8>, new: &Viewport) -> bool {
        let Some(prev_zoom) = prev_zoom else {
            return false;
        };
        if !new.contains(marker.position) {
            return false;
        }
        match self {
            RetentionPolicy::ZoomOut => new.zoom < prev_zoom,
            RetentionPolicy::ZoomIn => new.zoom > prev_zoom,
            RetentionPolicy::Never => false,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PopupState {
    /// Not created yet; built on first click.
    Absent,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: MarkerId,
    /// Render projection.
    pub position: Vec2,
    pub record: Record,
    pub popup: PopupState,
}

/// A planned marker fetch, waiting for its records.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerTicket {
    pub seq: RequestSeq,
    pub viewport: Viewport,
    pub query: FeedQuery,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerSyncReport {
    pub added: usize,
    pub removed: usize,
    /// Kept by the retention policy.
    pub retained: usize,
    /// Kept because the fetch returned the same coordinate.
    pub unchanged: usize,
    pub duplicates: usize,
    pub skipped_lines: usize,
    pub fetch_failed: bool,
}

#[derive(Debug, Default)]
pub struct MarkerSynchronizer {
    policy: RetentionPolicy,
    active: BTreeMap<CoordKey, Marker>,
    last_zoom: Option<u8>,
    ids: IdAllocator,
    seq: SeqGuard,
}

impl MarkerSynchronizer {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    pub fn seq(&self) -> &SeqGuard {
        &self.seq
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn active(&self) -> impl Iterator<Item = &Marker> {
        self.active.values()
    }

    pub fn marker_at(&self, latitude: f64, longitude: f64) -> Option<&Marker> {
        self.active.get(&CoordKey::new(latitude, longitude))
    }

    pub fn last_zoom(&self) -> Option<u8> {
        self.last_zoom
    }

    /// Query for every record kind inside `viewport`.
    pub fn plan(&mut self, viewport: Viewport) -> MarkerTicket {
        let seq = self.seq.issue();
        MarkerTicket {
            seq,
            viewport,
            query: FeedQuery::for_viewport(&viewport, RecordKind::All),
        }
    }

    /// Diff `records` against the active set and update the surface.
    pub fn apply(
        &mut self,
        ticket: &MarkerTicket,
        mut records: Records,
        surface: &mut dyn MarkerSurface,
    ) -> MarkerSyncReport {
        let mut report = MarkerSyncReport {
            fetch_failed: records.is_failed(),
            ..MarkerSyncReport::default()
        };
        let fetched: Vec<Record> = records.by_ref().collect();
        let fresh: BTreeSet<CoordKey> = fetched.iter().map(Record::coord_key).collect();

        let previous = std::mem::take(&mut self.active);
        for (key, marker) in previous {
            if self
                .policy
                .should_retain(&marker, self.last_zoom, &ticket.viewport)
            {
                self.active.insert(key, marker);
                report.retained += 1;
            } else if fresh.contains(&key) {
                self.active.insert(key, marker);
                report.unchanged += 1;
            } else {
                release(&marker, surface);
                report.removed += 1;
            }
        }

        for record in fetched {
            let key = record.coord_key();
            if self.active.contains_key(&key) {
                report.duplicates += 1;
                continue;
            }
            let id = self.ids.next_marker();
            let position = to_render(record.storage_point(), STORAGE);
            surface.add_marker(id, position, &Icon::for_record(&record));
            surface.bind_click(id);
            self.active.insert(
                key,
                Marker {
                    id,
                    position,
                    record,
                    popup: PopupState::Absent,
                },
            );
            report.added += 1;
        }
        report.skipped_lines = records.skipped_lines();

        self.last_zoom = Some(ticket.viewport.zoom);
        self.seq.mark_applied(ticket.seq);
        debug!(
            seq = ticket.seq.0,
            zoom = ticket.viewport.zoom,
            added = report.added,
            removed = report.removed,
            retained = report.retained,
            unchanged = report.unchanged,
            duplicates = report.duplicates,
            "markers synced"
        );
        report
    }

    /// Handle a click on `id`: the popup is built on the first click and
    /// toggled afterwards. Returns whether it is now open, or `None` for an
    /// unknown marker.
    pub fn click(&mut self, id: MarkerId, surface: &mut dyn MarkerSurface) -> Option<bool> {
        let marker = self.active.values_mut().find(|m| m.id == id)?;
        marker.popup = match marker.popup {
            PopupState::Absent => {
                surface.add_popup(id, marker.position, &PopupSpec::for_record(&marker.record));
                PopupState::Open
            }
            PopupState::Open => {
                surface.set_popup_visible(id, false);
                PopupState::Closed
            }
            PopupState::Closed => {
                surface.set_popup_visible(id, true);
                PopupState::Open
            }
        };
        Some(marker.popup == PopupState::Open)
    }

    /// Release every marker.
    pub fn clear(&mut self, surface: &mut dyn MarkerSurface) -> usize {
        let n = self.active.len();
        for marker in std::mem::take(&mut self.active).into_values() {
            release(&marker, surface);
        }
        self.last_zoom = None;
        n
    }
}

impl Layer for MarkerSynchronizer {
    fn id(&self) -> LayerId {
        LayerId::MARKERS
    }

    fn name(&self) -> &'static str {
        "markers"
    }
}

fn release(marker: &Marker, surface: &mut dyn MarkerSurface) {
    if marker.popup != PopupState::Absent {
        surface.remove_popup(marker.id);
    }
    surface.unbind_click(marker.id);
    surface.remove_marker(marker.id);
}
