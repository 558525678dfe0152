// src/history/mod.rs

pub mod downloaded;
pub mod generated;
pub mod table_history;

pub use downloaded::DownloadedRow;
pub use generated::GeneratedRow;
pub use table_history::{HistoryRow, TableHistory};
