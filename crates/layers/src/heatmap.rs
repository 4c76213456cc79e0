//! Density layer over `power` records.
//!
//! The radius tracks a fixed real-world distance, so it is recomputed in
//! screen pixels whenever the zoom changes. Sources are replaced wholesale
//! on every fetch.

use foundation::bounds::Bounds;
use foundation::math::{RENDER, STORAGE, Vec2, resolution_at_zoom, to_render};
use foundation::view::Viewport;
use serde::{Deserialize, Serialize};
use streaming::protocol::Records;
use streaming::request::{FeedQuery, RecordKind, RequestSeq, SeqGuard};
use tracing::debug;

use crate::layer::{Layer, LayerId};
use crate::surface::HeatSurface;
use crate::symbology::LayerStyle;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Influence radius of one facility, meters.
    pub radius_m: f64,
    /// Pixels per (meters / resolution).
    pub scale: f64,
    /// Lowest zoom at which the layer is drawn.
    pub min_zoom: u8,
    /// Highest zoom at which the layer is drawn.
    pub max_zoom: u8,
    pub opacity: f64,
    pub intensity: f64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            radius_m: 100_000.0,
            scale: 5.0 / 3.0,
            min_zoom: 4,
            max_zoom: 9,
            opacity: 0.5,
            intensity: 1.0,
        }
    }
}

impl HeatmapConfig {
    /// Screen radius at `zoom`, or `None` outside the visible range.
    pub fn radius_px(&self, zoom: u8) -> Option<f64> {
        if zoom < self.min_zoom || zoom > self.max_zoom {
            return None;
        }
        Some(self.scale * self.radius_m / resolution_at_zoom(zoom))
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HeatSource {
    /// Render projection.
    pub position: Vec2,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatTicket {
    pub seq: RequestSeq,
    pub viewport: Viewport,
    pub query: FeedQuery,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct HeatReport {
    pub sources: usize,
    pub skipped_lines: usize,
    pub fetch_failed: bool,
}

#[derive(Debug)]
pub struct HeatmapController {
    config: HeatmapConfig,
    radius_px: f64,
    visible: bool,
    last_zoom: Option<u8>,
    sources: Vec<HeatSource>,
    seq: SeqGuard,
}

impl Default for HeatmapController {
    fn default() -> Self {
        Self::new(HeatmapConfig::default())
    }
}

impl HeatmapController {
    pub fn new(config: HeatmapConfig) -> Self {
        Self {
            config,
            radius_px: 0.0,
            visible: false,
            last_zoom: None,
            sources: Vec::new(),
            seq: SeqGuard::new(),
        }
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.config
    }

    pub fn radius_px(&self) -> f64 {
        self.radius_px
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn last_zoom(&self) -> Option<u8> {
        self.last_zoom
    }

    pub fn sources(&self) -> &[HeatSource] {
        &self.sources
    }

    pub fn seq(&self) -> &SeqGuard {
        &self.seq
    }

    /// Render extent grown by the influence radius, clipped to the world,
    /// in storage degrees.
    pub fn fetch_bounds(&self, viewport: &Viewport) -> Bounds {
        viewport
            .bounds
            .expand(self.config.radius_m)
            .intersection(&Bounds::world())
            .transform(RENDER, STORAGE)
    }

    /// Update radius and visibility for `viewport` and return the query for
    /// its sources.
    pub fn plan(&mut self, viewport: Viewport, surface: &mut dyn HeatSurface) -> HeatTicket {
        if self.last_zoom != Some(viewport.zoom) {
            match self.config.radius_px(viewport.zoom) {
                Some(radius) => {
                    self.visible = true;
                    self.radius_px = radius;
                }
                None => {
                    self.visible = false;
                    self.radius_px = 0.0;
                }
            }
            self.last_zoom = Some(viewport.zoom);
            surface.set_heat_style(LayerStyle::new(self.visible, self.config.opacity));
            surface.set_heat_radius(self.radius_px);
            debug!(
                zoom = viewport.zoom,
                radius_px = self.radius_px,
                visible = self.visible,
                "heat radius updated"
            );
        }

        let seq = self.seq.issue();
        HeatTicket {
            seq,
            viewport,
            query: FeedQuery::new(self.fetch_bounds(&viewport), viewport.zoom, RecordKind::Power),
        }
    }

    /// Replace every source with the fetched records and redraw.
    pub fn apply(
        &mut self,
        ticket: &HeatTicket,
        mut records: Records,
        surface: &mut dyn HeatSurface,
    ) -> HeatReport {
        let fetch_failed = records.is_failed();
        let intensity = self.config.intensity;
        self.sources = records
            .by_ref()
            .map(|r| HeatSource {
                position: to_render(r.storage_point(), STORAGE),
                intensity,
            })
            .collect();
        surface.set_heat_sources(&self.sources);
        surface.redraw_heat();
        self.seq.mark_applied(ticket.seq);

        debug!(seq = ticket.seq.0, sources = self.sources.len(), "heat sources replaced");
        HeatReport {
            sources: self.sources.len(),
            skipped_lines: records.skipped_lines(),
            fetch_failed,
        }
    }
}

impl Layer for HeatmapController {
    fn id(&self) -> LayerId {
        LayerId::HEAT
    }

    fn name(&self) -> &'static str {
        "heatmap"
    }
}
