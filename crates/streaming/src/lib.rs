//! Record feed client: the tab-separated wire protocol, bounds/zoom/type
//! scoped queries, transports, and the fetcher that turns a response into a
//! lazy sequence of records.

pub mod fetcher;
pub mod protocol;
pub mod request;
pub mod static_feed;
pub mod transport;

pub use fetcher::*;
pub use protocol::*;
pub use request::*;
pub use static_feed::*;
pub use transport::*;
