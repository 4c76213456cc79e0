//! The rendering surface the layers draw onto.
//!
//! Controllers never talk to a concrete map library; they issue calls
//! against [`MarkerSurface`] and [`HeatSurface`]. [`RecordingSurface`] keeps
//! the resulting state in memory for headless runs and tests.

use std::collections::BTreeMap;

use foundation::ids::MarkerId;
use foundation::math::{RENDER, STORAGE, Vec2, transform};
use serde::Serialize;
use streaming::protocol::{IconOffset, IconSize, Record};

use crate::heatmap::HeatSource;
use crate::symbology::LayerStyle;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Icon {
    pub url: String,
    pub size: IconSize,
    pub offset: IconOffset,
}

impl Icon {
    pub fn for_record(record: &Record) -> Self {
        Self {
            url: record.icon_url.clone(),
            size: record.icon_size,
            offset: record.icon_offset,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    Visible,
    Hidden,
    Auto,
}

/// An anchored bubble attached to a marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupSpec {
    pub content_html: String,
    pub min_size: (u32, u32),
    pub auto_size: bool,
    pub close_box: bool,
    pub close_on_move: bool,
    pub overflow: Overflow,
}

impl PopupSpec {
    pub const MIN_SIZE: (u32, u32) = (300, 180);

    pub fn for_record(record: &Record) -> Self {
        Self {
            content_html: record.popup_html(),
            min_size: Self::MIN_SIZE,
            auto_size: true,
            close_box: true,
            close_on_move: true,
            overflow: Overflow::Auto,
        }
    }
}

pub trait MarkerSurface {
    fn add_marker(&mut self, id: MarkerId, position: Vec2, icon: &Icon);
    fn remove_marker(&mut self, id: MarkerId);
    /// Start delivering clicks on `id` to the owner of the marker.
    fn bind_click(&mut self, id: MarkerId);
    fn unbind_click(&mut self, id: MarkerId);
    fn add_popup(&mut self, id: MarkerId, position: Vec2, popup: &PopupSpec);
    fn set_popup_visible(&mut self, id: MarkerId, visible: bool);
    fn remove_popup(&mut self, id: MarkerId);
}

pub trait HeatSurface {
    fn set_heat_style(&mut self, style: LayerStyle);
    /// Radius in screen pixels.
    fn set_heat_radius(&mut self, radius_px: f64);
    /// Replace every source of the heat layer.
    fn set_heat_sources(&mut self, sources: &[HeatSource]);
    fn redraw_heat(&mut self);
}

/// Everything a map session draws onto.
pub trait MapSurface: MarkerSurface + HeatSurface {}

impl<T: MarkerSurface + HeatSurface + ?Sized> MapSurface for T {}

/// One call received by a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    AddMarker(MarkerId),
    RemoveMarker(MarkerId),
    BindClick(MarkerId),
    UnbindClick(MarkerId),
    AddPopup(MarkerId),
    SetPopupVisible(MarkerId, bool),
    RemovePopup(MarkerId),
    HeatStyle(LayerStyle),
    HeatRadius(f64),
    HeatSources(usize),
    HeatRedraw,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMarker {
    pub position: Vec2,
    pub icon: Icon,
    pub click_bound: bool,
    pub popup: Option<RenderedPopup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPopup {
    pub spec: PopupSpec,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedHeat {
    pub style: LayerStyle,
    pub radius_px: f64,
    pub sources: Vec<HeatSource>,
    pub redraws: u64,
}

impl Default for RenderedHeat {
    fn default() -> Self {
        Self {
            style: LayerStyle::default(),
            radius_px: 0.0,
            sources: Vec::new(),
            redraws: 0,
        }
    }
}

/// In-memory surface. Keeps current state and the ordered call log.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    markers: BTreeMap<MarkerId, RenderedMarker>,
    heat: RenderedHeat,
    ops: Vec<SurfaceOp>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> &BTreeMap<MarkerId, RenderedMarker> {
        &self.markers
    }

    pub fn marker(&self, id: MarkerId) -> Option<&RenderedMarker> {
        self.markers.get(&id)
    }

    pub fn heat(&self) -> &RenderedHeat {
        &self.heat
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        let markers = self
            .markers
            .iter()
            .map(|(id, m)| {
                let p = transform(m.position, RENDER, STORAGE);
                MarkerSnapshot {
                    id: id.0,
                    lon: p.x,
                    lat: p.y,
                    icon: m.icon.url.clone(),
                    popup_open: m.popup.as_ref().is_some_and(|p| p.visible),
                }
            })
            .collect();
        SurfaceSnapshot {
            markers,
            heat: HeatSnapshot {
                visible: self.heat.style.visible,
                opacity: self.heat.style.opacity,
                radius_px: self.heat.radius_px,
                sources: self.heat.sources.len(),
                redraws: self.heat.redraws,
            },
        }
    }
}

impl MarkerSurface for RecordingSurface {
    fn add_marker(&mut self, id: MarkerId, position: Vec2, icon: &Icon) {
        self.markers.insert(
            id,
            RenderedMarker {
                position,
                icon: icon.clone(),
                click_bound: false,
                popup: None,
            },
        );
        self.ops.push(SurfaceOp::AddMarker(id));
    }

    fn remove_marker(&mut self, id: MarkerId) {
        self.markers.remove(&id);
        self.ops.push(SurfaceOp::RemoveMarker(id));
    }

    fn bind_click(&mut self, id: MarkerId) {
        if let Some(m) = self.markers.get_mut(&id) {
            m.click_bound = true;
        }
        self.ops.push(SurfaceOp::BindClick(id));
    }

    fn unbind_click(&mut self, id: MarkerId) {
        if let Some(m) = self.markers.get_mut(&id) {
            m.click_bound = false;
        }
        self.ops.push(SurfaceOp::UnbindClick(id));
    }

    fn add_popup(&mut self, id: MarkerId, _position: Vec2, popup: &PopupSpec) {
        if let Some(m) = self.markers.get_mut(&id) {
            m.popup = Some(RenderedPopup {
                spec: popup.clone(),
                visible: true,
            });
        }
        self.ops.push(SurfaceOp::AddPopup(id));
    }

    fn set_popup_visible(&mut self, id: MarkerId, visible: bool) {
        if let Some(p) = self.markers.get_mut(&id).and_then(|m| m.popup.as_mut()) {
            p.visible = visible;
        }
        self.ops.push(SurfaceOp::SetPopupVisible(id, visible));
    }

    fn remove_popup(&mut self, id: MarkerId) {
        if let Some(m) = self.markers.get_mut(&id) {
            m.popup = None;
        }
        self.ops.push(SurfaceOp::RemovePopup(id));
    }
}

impl HeatSurface for RecordingSurface {
    fn set_heat_style(&mut self, style: LayerStyle) {
        self.heat.style = style;
        self.ops.push(SurfaceOp::HeatStyle(style));
    }

    fn set_heat_radius(&mut self, radius_px: f64) {
        self.heat.radius_px = radius_px;
        self.ops.push(SurfaceOp::HeatRadius(radius_px));
    }

    fn set_heat_sources(&mut self, sources: &[HeatSource]) {
        self.heat.sources = sources.to_vec();
        self.ops.push(SurfaceOp::HeatSources(sources.len()));
    }

    fn redraw_heat(&mut self) {
        self.heat.redraws += 1;
        self.ops.push(SurfaceOp::HeatRedraw);
    }
}

/// Serializable view of a [`RecordingSurface`], positions in storage degrees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceSnapshot {
    pub markers: Vec<MarkerSnapshot>,
    pub heat: HeatSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSnapshot {
    pub id: u64,
    pub lon: f64,
    pub lat: f64,
    pub icon: String,
    pub popup_open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatSnapshot {
    pub visible: bool,
    pub opacity: f64,
    pub radius_px: f64,
    pub sources: usize,
    pub redraws: u64,
}
