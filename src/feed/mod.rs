//! Feed aggregation: the home screen, the paginated grid and detail lookups.

mod browser;
pub mod detail;
mod home;
mod ordering;
mod pager;

pub use browser::{Browser, FeedEvent, FeedSettings, Screen};
pub use home::{HomeBarrier, HomeSection};
pub use ordering::order_by_ids;
pub use pager::{PageOutcome, PageRequest, Pager};
