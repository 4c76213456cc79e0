#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayerStyle {
    pub visible: bool,
    /// 0.0 (transparent) to 1.0.
    pub opacity: f64,
}

impl LayerStyle {
    pub const fn new(visible: bool, opacity: f64) -> Self {
        Self { visible, opacity }
    }
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            visible: true,
            opacity: 1.0,
        }
    }
}
