pub mod event_bus;
pub mod listeners;
pub mod metrics;

pub use event_bus::*;
pub use listeners::*;
pub use metrics::*;
