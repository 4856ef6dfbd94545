//! Row selection, label normalization and deduplication.

use std::collections::HashSet;
use std::io::Read;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{WorkItemError, WorkItemResult};

static LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)_(\d+)(?:-[A-Za-z0-9]+)?").expect("label pattern is valid"));

/// A pending unit of input: one remote folder to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Canonical `<n>-<n>` identifier, or the raw label when it did not match.
    pub identifier: String,
    /// Label as it appeared in the sheet.
    pub raw_label: String,
    /// Whether the label matched the expected shape.
    pub verified: bool,
}

/// Result of normalizing a sheet label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLabel {
    pub identifier: String,
    pub matched: bool,
}

/// Canonicalize `12_34` / `12_34-suffix` to `12-34`.
///
/// Labels of any other shape are passed through unchanged with
/// `matched = false`.
pub fn normalize_label(raw: &str) -> NormalizedLabel {
    match LABEL_PATTERN.captures(raw) {
        Some(caps) => NormalizedLabel {
            identifier: format!("{}-{}", &caps[1], &caps[2]),
            matched: true,
        },
        None => NormalizedLabel {
            identifier: raw.to_string(),
            matched: false,
        },
    }
}

/// Column names and limits for a resolution pass.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub done_column: String,
    pub id_column: String,
    /// Stop once this many unique items have been found.
    pub max_items: Option<usize>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            done_column: "Done".to_string(),
            id_column: "as".to_string(),
            max_items: None,
        }
    }
}

impl From<&crate::config::SheetSettings> for ResolveOptions {
    fn from(sheet: &crate::config::SheetSettings) -> Self {
        Self {
            done_column: sheet.done_column.clone(),
            id_column: sheet.id_column.clone(),
            max_items: sheet.max_items,
        }
    }
}

/// Resolve pending work items from CSV text with a header row.
///
/// A row is selected iff its done cell is empty or absent and its
/// identifier cell is non-empty. The first occurrence of each normalized
/// identifier wins.
pub fn resolve_from_reader<R: Read>(
    reader: R,
    options: &ResolveOptions,
) -> WorkItemResult<Vec<WorkItem>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);

    let id_index =
        column(&options.id_column).ok_or_else(|| WorkItemError::MissingColumn(options.id_column.clone()))?;
    // A sheet without a done column has nothing marked done yet.
    let done_index = column(&options.done_column);

    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for record in csv_reader.records() {
        if let Some(max) = options.max_items {
            if items.len() >= max {
                tracing::info!("Reached maximum of {} work items, stopping", max);
                break;
            }
        }

        let record = record?;

        let done = done_index
            .and_then(|i| record.get(i))
            .map(str::trim)
            .unwrap_or("");
        if !done.is_empty() {
            continue;
        }

        let raw = record.get(id_index).map(str::trim).unwrap_or("");
        if raw.is_empty() {
            continue;
        }

        let normalized = normalize_label(raw);
        if !normalized.matched {
            tracing::warn!(
                "Label '{}' does not look like <n>_<n>; using it unverified",
                raw
            );
        }

        if seen.insert(normalized.identifier.clone()) {
            items.push(WorkItem {
                identifier: normalized.identifier,
                raw_label: raw.to_string(),
                verified: normalized.matched,
            });
        } else {
            tracing::debug!("Skipping duplicate label '{}'", raw);
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[WorkItem]) -> Vec<&str> {
        items.iter().map(|i| i.identifier.as_str()).collect()
    }

    #[test]
    fn normalizes_matching_labels() {
        assert_eq!(normalize_label("12_34").identifier, "12-34");
        assert_eq!(normalize_label("12_34-x").identifier, "12-34");
        assert_eq!(normalize_label("007_1-Part2").identifier, "007-1");
        assert!(normalize_label("12_34-x").matched);
    }

    #[test]
    fn non_matching_label_is_identity() {
        let n = normalize_label("interview-final");
        assert_eq!(n.identifier, "interview-final");
        assert!(!n.matched);

        assert_eq!(normalize_label("x12_34").identifier, "x12_34");
    }

    #[test]
    fn duplicates_after_normalization_are_dropped() {
        let csv = "as,Done\n12_34-x,\n12_34-y,\n56_78,\n";
        let items = resolve_from_reader(csv.as_bytes(), &ResolveOptions::default()).unwrap();
        assert_eq!(ids(&items), vec!["12-34", "56-78"]);
        assert_eq!(items[0].raw_label, "12_34-x");
    }

    #[test]
    fn done_rows_and_blank_ids_are_skipped() {
        let csv = "Name,as,Done\na,1_1,yes\nb,,\nc,2_2,  \nd,3_3,x\n";
        let items = resolve_from_reader(csv.as_bytes(), &ResolveOptions::default()).unwrap();
        assert_eq!(ids(&items), vec!["2-2"]);
    }

    #[test]
    fn stops_at_max_items() {
        let csv = "as,Done\n1_1,\n1_1,\n2_2,\n3_3,\n";
        let options = ResolveOptions {
            max_items: Some(2),
            ..ResolveOptions::default()
        };
        let items = resolve_from_reader(csv.as_bytes(), &options).unwrap();
        assert_eq!(ids(&items), vec!["1-1", "2-2"]);
    }

    #[test]
    fn missing_done_column_selects_everything() {
        let csv = "as\n4_5\nloose\n";
        let items = resolve_from_reader(csv.as_bytes(), &ResolveOptions::default()).unwrap();
        assert_eq!(ids(&items), vec!["4-5", "loose"]);
        assert!(!items[1].verified);
    }

    #[test]
    fn missing_id_column_is_an_error() {
        let csv = "Folder,Done\n1_2,\n";
        let err = resolve_from_reader(csv.as_bytes(), &ResolveOptions::default()).unwrap_err();
        assert!(matches!(err, WorkItemError::MissingColumn(ref c) if c == "as"));
    }

    #[test]
    fn short_rows_are_tolerated() {
        let csv = "Done,as,Notes\n,9_9\n";
        let items = resolve_from_reader(csv.as_bytes(), &ResolveOptions::default()).unwrap();
        assert_eq!(ids(&items), vec!["9-9"]);
    }
}
