pub mod context;
pub mod error;
pub mod fetcher;
pub mod rest;
pub mod retry;
pub mod rss;
pub mod x;

pub use context::FetchContext;
pub use error::{Result, SourceError};
pub use fetcher::{Fetcher, SourceRegistry};
pub use rest::RestFetcher;
pub use rss::RssFetcher;
pub use x::XFetcher;
