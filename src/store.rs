use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

/// Canonical locations of every pipeline artifact, relative to the working
/// directory.
pub mod paths {
    pub const RAW_APPROVALS: &str = "data/raw/drug_approval_data.json";
    pub const RAW_PILLS: &str = "data/raw/pill_raw_data.json";
    pub const PROCESSED_APPROVALS: &str = "data/processed/drug_approval_data_processed.json";
    pub const ERROR_REPORT: &str = "data/processed/error_report.json";
    pub const MERGED: &str = "data/merged/merged_drug_data.json";
    pub const UNMATCHED_PILLS: &str = "data/merged/unmatched_pills.json";
    pub const UNMATCHED_APPROVALS: &str = "data/merged/unmatched_approvals.json";
    pub const FILTERED_APPROVALS: &str = "data/filtered/filtered_drug_approvals.json";
    pub const FILTERED_PILLS: &str = "data/filtered/filtered_pill_data.json";
}

/// Load a JSON array of records. A single top-level object is accepted and
/// wrapped into a one-element list, as some upstream dumps do that.
pub fn load_records<T: DeserializeOwned>(path: &str) -> Result<Vec<T>> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path))?;
    let records = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .with_context(|| format!("unexpected record shape in {}", path))?,
        other => vec![serde_json::from_value(other)
            .with_context(|| format!("unexpected record shape in {}", path))?],
    };
    info!("Loaded {} records from {}", records.len(), path);
    Ok(records)
}

/// Write records as pretty-printed JSON, creating parent directories.
pub fn save_records<T: Serialize>(path: &str, records: &[T]) -> Result<()> {
    save_value(path, &serde_json::to_value(records)?)
}

/// Write any serializable value as pretty-printed JSON.
pub fn save_value<T: Serialize + ?Sized>(path: &str, value: &T) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path))?;
    info!("Saved {}", path);
    Ok(())
}

/// Record count of one artifact file, or `None` if it does not exist or is
/// not a JSON array.
pub fn count_records(path: &str) -> Option<usize> {
    let text = fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&text).ok()?;
    value.as_array().map(Vec::len)
}
