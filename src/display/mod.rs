//! Display surface for tracker state
//!
//! Keeps the in-memory position history fed by a stream subscription and
//! renders the tracker status as text, JSON or CSV.

pub mod history;
pub mod formatting;

pub use history::PositionHistory;
pub use formatting::{OutputFormat, StatusReport, TextFormatter, JsonFormatter, CsvFormatter};
