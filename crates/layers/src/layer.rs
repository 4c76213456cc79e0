#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u64);

impl LayerId {
    pub const MARKERS: LayerId = LayerId(1);
    pub const HEAT: LayerId = LayerId(2);
}

pub trait Layer {
    fn id(&self) -> LayerId;
    fn name(&self) -> &'static str;
}
