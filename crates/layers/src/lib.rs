pub mod heatmap;
pub mod layer;
pub mod markers;
pub mod surface;
pub mod symbology;

pub use heatmap::*;
pub use layer::*;
pub use markers::*;
pub use surface::*;
pub use symbology::*;
