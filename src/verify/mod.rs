pub mod fetch;
pub mod relevance;

pub use fetch::{FetchedPage, HttpWebFetcher, WebFetcher};
pub use relevance::{VerifiedSource, verify_sources};
