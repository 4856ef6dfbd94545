//! Spreadsheet sources.

use std::time::Duration;

use super::{WorkItemError, WorkItemResult};

/// Produces the work list as CSV text.
pub trait SheetSource: Send + Sync {
    fn fetch_csv(&self) -> WorkItemResult<String>;

    /// Where the sheet comes from, for logs.
    fn describe(&self) -> String;
}

/// Turn a Google Sheets edit link into its CSV export link.
///
/// `.../spreadsheets/d/<id>/edit#gid=0` becomes
/// `.../spreadsheets/d/<id>/export?format=csv`. Links that already point at
/// an export, or are not Google Sheets links, are returned unchanged.
pub fn export_url(url: &str) -> String {
    if url.contains("/export") || url.contains("format=csv") {
        return url.to_string();
    }

    let marker = "/spreadsheets/d/";
    let Some(start) = url.find(marker) else {
        return url.to_string();
    };

    let id_start = start + marker.len();
    let rest = &url[id_start..];
    let id_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let id = &rest[..id_len];

    let mut export = format!("{}{}/export?format=csv", &url[..id_start], id);
    if let Some(gid) = gid_of(url) {
        export.push_str("&gid=");
        export.push_str(gid);
    }
    export
}

fn gid_of(url: &str) -> Option<&str> {
    let pos = url.find("gid=")?;
    let value = &url[pos + 4..];
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    (end > 0).then(|| &value[..end])
}

/// Downloads the sheet over HTTP.
pub struct HttpSheetSource {
    url: String,
    timeout: Duration,
}

impl HttpSheetSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn from_settings(sheet: &crate::config::SheetSettings) -> Self {
        Self::new(&sheet.url, Duration::from_secs(sheet.timeout_secs))
    }

    fn download_error(&self, message: impl ToString) -> WorkItemError {
        WorkItemError::Download {
            url: self.url.clone(),
            message: message.to_string(),
        }
    }
}

impl SheetSource for HttpSheetSource {
    fn fetch_csv(&self) -> WorkItemResult<String> {
        let url = export_url(&self.url);
        tracing::debug!("Downloading work list from {}", url);

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| self.download_error(e))?;

        let response = client
            .get(&url)
            .send()
            .map_err(|e| self.download_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.download_error(format!("HTTP {}", status)));
        }

        response.text().map_err(|e| self.download_error(e))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
