//! CSV report export.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::client::BackendClient;
use crate::session::Session;

/// Download name of a report: `scans.csv`, or `scan_<id>.csv` for a single scan.
pub fn file_name(scan_id: Option<i64>) -> String {
    match scan_id {
        Some(id) => format!("scan_{id}.csv"),
        None => "scans.csv".to_string(),
    }
}

/// Fetch a report and write it into `dir` under its download name.
pub async fn download_report(
    client: &BackendClient,
    session: &Session,
    scan_id: Option<i64>,
    dir: &Path,
) -> Result<PathBuf> {
    let bytes = client
        .export_csv(session, scan_id)
        .await
        .context("Export failed")?;
    let path = dir.join(file_name(scan_id));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_scope() {
        assert_eq!(file_name(None), "scans.csv");
        assert_eq!(file_name(Some(42)), "scan_42.csv");
    }
}
