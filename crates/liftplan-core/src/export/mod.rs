//! Plan exporters: CSV, Markdown, and JSON.
//!
//! Exporters resolve exercise details through the catalog. A block whose
//! exercise is unknown to the catalog is still exported, with its id as the
//! name and empty attribute columns.

pub mod csv;
pub mod markdown;

use crate::model::Plan;

pub use csv::{to_csv, write_csv};
pub use markdown::{to_markdown, write_markdown};

/// Pretty-printed JSON for `plan`.
pub fn to_json(plan: &Plan) -> serde_json::Result<String> {
    serde_json::to_string_pretty(plan)
}
