mod content;
pub mod import;
mod preferences;
mod reports;
mod schema;
mod types;

pub use import::{ImportError, ImportSummary};
pub use schema::Database;
pub use types::DatabaseError;
