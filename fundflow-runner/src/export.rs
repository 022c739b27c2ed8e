//! Report export: pretty JSON written atomically to `{output_dir}/{SYMBOL}.json`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fundflow_core::store::write_atomic;

use crate::report::FlowReport;

/// Serialize a report to pretty JSON.
pub fn export_json(report: &FlowReport) -> Result<String> {
    serde_json::to_string_pretty(report)
        .with_context(|| format!("failed to serialize report for {}", report.ticker))
}

/// Parse a previously written report.
pub fn import_json(json: &str) -> Result<FlowReport> {
    let report: FlowReport =
        serde_json::from_str(json).context("failed to deserialize FlowReport from JSON")?;
    if report.ticker.trim().is_empty() {
        bail!("report has an empty ticker");
    }
    Ok(report)
}

/// Write `report` into `output_dir` and return the file path.
pub fn write_report(report: &FlowReport, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(format!("{}.json", report.ticker));
    let json = export_json(report)?;
    write_atomic(&path, json.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Read a report back from disk.
pub fn read_report(path: &Path) -> Result<FlowReport> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
