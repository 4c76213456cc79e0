use foundation::bounds::Bounds;
use foundation::view::Viewport;
use serde::{Deserialize, Serialize};

/// The feed's `tt` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    All,
    Power,
    Category(String),
}

impl RecordKind {
    pub fn as_str(&self) -> &str {
        match self {
            RecordKind::All => "all",
            RecordKind::Power => "power",
            RecordKind::Category(name) => name,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "" | "all" => RecordKind::All,
            "power" => RecordKind::Power,
            other => RecordKind::Category(other.to_string()),
        }
    }
}

/// One bounds + zoom + type scoped query against the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    /// Storage degrees; the feed compares these against latitude/longitude.
    pub bounds: Bounds,
    pub zoom: u8,
    pub kind: RecordKind,
}

impl FeedQuery {
    pub fn new(bounds: Bounds, zoom: u8, kind: RecordKind) -> Self {
        Self { bounds, zoom, kind }
    }

    /// Query the visible extent of `viewport`.
    pub fn for_viewport(viewport: &Viewport, kind: RecordKind) -> Self {
        Self::new(viewport.storage_bounds(), viewport.zoom, kind)
    }

    /// Query parameters in wire order.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("t", self.bounds.top.to_string()),
            ("l", self.bounds.left.to_string()),
            ("b", self.bounds.bottom.to_string()),
            ("r", self.bounds.right.to_string()),
            ("z", self.zoom.to_string()),
            ("tt", self.kind.as_str().to_string()),
        ]
    }

    /// `k=v&k=v` rendering, for logs.
    pub fn query_string(&self) -> String {
        self.params()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Monotonic id of a fetch issued by one layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestSeq(pub u64);

/// Tracks the newest request a layer has issued so late completions can be
/// recognised as superseded.
#[derive(Debug, Default, Clone)]
pub struct SeqGuard {
    issued: u64,
    applied: Option<RequestSeq>,
}

impl SeqGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> RequestSeq {
        self.issued += 1;
        RequestSeq(self.issued)
    }

    pub fn latest_issued(&self) -> Option<RequestSeq> {
        (self.issued > 0).then_some(RequestSeq(self.issued))
    }

    /// A newer request has been issued since `seq`.
    pub fn is_superseded(&self, seq: RequestSeq) -> bool {
        seq.0 < self.issued
    }

    pub fn mark_applied(&mut self, seq: RequestSeq) {
        self.applied = Some(seq);
    }

    pub fn last_applied(&self) -> Option<RequestSeq> {
        self.applied
    }
}
