//! A map session: the context object that binds the heat and marker layers
//! to the "view settled" signal, feeds them from the record feed, and keeps
//! the last view across visits.

pub mod config;
pub mod dispatcher;
pub mod startup;

pub use config::*;
pub use dispatcher::*;
pub use startup::*;
