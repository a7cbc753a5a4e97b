//! Remote listing
//!
//! - `session`: the connector/session seam
//! - `http`: HTTP directory-index implementation
//! - `worker`: pool worker feeding the download queue

pub mod http;
pub mod session;
pub mod worker;

pub use http::{parse_listing, HttpListingConnector, HttpListingSession};
pub use session::{ListingConnector, ListingSession};
pub use worker::ListingWorker;
