//! FAC training-funding report: reshapes the tracking spreadsheet into
//! per-cycle partitions, billing summaries, team checklists and a recap.

pub mod aggregation;
pub mod artifact;
pub mod catalog;
pub mod checklist;
pub mod cleanse;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod partition;
pub mod pipeline;
pub mod recap;
pub mod schema;
pub mod text;
pub mod workbook;

pub use config::ReportConfig;
pub use error::ReportError;
pub use model::FormationTable;
pub use pipeline::{run, RunReport};
