//! Catalog domain types.
//!
//! - [`model`] - content, episode and report records
//! - [`query`] - store-agnostic query description and pagination cursor
//! - [`sources`] - source-key ordering and playback locator parsing

mod model;
mod query;
mod sources;

pub use model::{BrokenSourceReport, ContentDraft, ContentKind, ContentRecord, EpisodeRecord};
pub use query::{ContentQuery, Direction, Filter, OrderField, PageCursor};
pub use sources::{ordered_sources, LocatorError, PlaybackTarget, SourceEntry, SourceKey};
