//! Work-item resolution.
//!
//! A work item is one remote folder of audio. The list of pending items
//! comes from a spreadsheet exported as CSV: rows whose done column is
//! empty and whose identifier column is set, normalized and deduplicated
//! in discovery order.

mod resolver;
mod sheet;

pub use resolver::{normalize_label, resolve_from_reader, NormalizedLabel, ResolveOptions, WorkItem};
pub use sheet::{export_url, HttpSheetSource, SheetSource};

use thiserror::Error;

/// Errors raised while obtaining or reading the work list.
#[derive(Error, Debug)]
pub enum WorkItemError {
    /// The sheet could not be downloaded.
    #[error("Failed to download sheet from {url}: {message}")]
    Download { url: String, message: String },

    /// The CSV could not be parsed.
    #[error("Malformed sheet: {0}")]
    Malformed(#[from] csv::Error),

    /// A configured column is missing from the header row.
    #[error("Sheet has no '{0}' column")]
    MissingColumn(String),
}

pub type WorkItemResult<T> = Result<T, WorkItemError>;

/// Download the sheet and resolve the pending work items.
pub fn resolve(source: &dyn SheetSource, options: &ResolveOptions) -> WorkItemResult<Vec<WorkItem>> {
    let body = source.fetch_csv()?;
    resolve_from_reader(body.as_bytes(), options)
}
