//! Domain models
//!
//! Token analysis entities live in models.rs; the bounded history log and the
//! database table handle are kept separate.

mod history;
mod models;
mod table;

pub use history::AnalysisHistory;
pub use models::*;
pub use table::Table;
