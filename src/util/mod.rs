//! Text helpers for printing catalog data to a terminal.
//!
//! ```
//! use vitrine::util::{display_width, truncate_to_width};
//!
//! let title = truncate_to_width("Ciencia Ficción", 10);
//! assert!(display_width(&title) <= 10);
//! ```

mod text;

pub use text::{display_width, fit_to_width, strip_control_chars, truncate_to_width};
