//! Streaming-catalog browsing core.
//!
//! - [`feed`]: home sections, the paginated grid and detail lookups
//! - [`history`]: the watch-history heuristic
//! - [`store`]: the content and preference store contracts
//! - [`storage`]: the SQLite implementation of both stores

pub mod catalog;
pub mod config;
pub mod feed;
pub mod history;
pub mod storage;
pub mod store;
pub mod util;
