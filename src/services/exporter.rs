//! Multi-format export of result snapshots
//!
//! Exports are full snapshots, not appends: each write replaces the prior
//! file for its scope, so a file is consistent even if an earlier export was
//! interrupted mid-write. One format failing does not stop the others.

use rust_xlsxwriter::Workbook;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

use crate::core::progress::sanitize_path_segment;
use crate::error::Result;
use crate::types::{BusinessRecord, ExportFormat};

/// Writes record snapshots under
/// `{base}/{query}/{country}/results/{scope}.{ext}`.
pub struct ExportManager {
    base_dir: PathBuf,
}

impl ExportManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn results_dir(&self, query: &str, country_code: &str) -> PathBuf {
        self.base_dir
            .join(sanitize_path_segment(query))
            .join(country_code)
            .join("results")
    }

    fn scope_path(&self, query: &str, country_code: &str, scope: &str, format: ExportFormat) -> PathBuf {
        self.results_dir(query, country_code)
            .join(format!("{}.{}", sanitize_path_segment(scope), format.extension()))
    }

    /// Write `records` for one scope in every requested format.
    ///
    /// Returns the number of formats that succeeded; individual format
    /// failures are logged and skipped.
    pub async fn write(
        &self,
        records: &[BusinessRecord],
        query: &str,
        country_code: &str,
        scope: &str,
        formats: &[ExportFormat],
    ) -> usize {
        let dir = self.results_dir(query, country_code);
        if let Err(e) = fs::create_dir_all(&dir).await {
            warn!("Could not create results directory {}: {}", dir.display(), e);
            return 0;
        }

        let mut written = 0;
        for format in formats {
            let path = self.scope_path(query, country_code, scope, *format);
            let result = match format {
                ExportFormat::Json => self.write_json(&path, records).await,
                ExportFormat::Csv => self.write_csv(&path, records).await,
                ExportFormat::Xlsx => self.write_xlsx(&path, records).await,
            };
            match result {
                Ok(()) => {
                    debug!("Exported {} records to {}", records.len(), path.display());
                    written += 1;
                }
                Err(e) => warn!("Export to {} failed: {}", path.display(), e),
            }
        }
        written
    }

    async fn write_json(&self, path: &PathBuf, records: &[BusinessRecord]) -> Result<()> {
        // Struct serialization keeps field order fixed, so identical input
        // produces byte-identical output.
        let json = serde_json::to_string_pretty(records)?;
        fs::write(path, json).await?;
        Ok(())
    }

    async fn write_csv(&self, path: &PathBuf, records: &[BusinessRecord]) -> Result<()> {
        let (columns, rows) = tabulate(records)?;

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&columns)?;
        for row in rows {
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }

    async fn write_xlsx(&self, path: &PathBuf, records: &[BusinessRecord]) -> Result<()> {
        let (columns, rows) = tabulate(records)?;

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        for (col, name) in columns.iter().enumerate() {
            worksheet.write_string(0, col as u16, name)?;
        }
        for (row_index, row) in rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                worksheet.write_string(row_index as u32 + 1, col as u16, cell)?;
            }
        }
        workbook.save(path)?;
        Ok(())
    }

    /// Path of one scope's export, exposed for tests and log lines.
    pub fn export_path(&self, query: &str, country_code: &str, scope: &str, format: ExportFormat) -> PathBuf {
        self.scope_path(query, country_code, scope, format)
    }
}

/// Flatten records into a table: columns are the union of keys present in
/// the batch (stable alphabetical order), missing fields render as empty
/// cells.
fn tabulate(records: &[BusinessRecord]) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let values: Vec<Value> = records
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<_, _>>()?;

    let mut columns: BTreeSet<String> = BTreeSet::new();
    for value in &values {
        if let Value::Object(map) = value {
            columns.extend(map.keys().cloned());
        }
    }
    let columns: Vec<String> = columns.into_iter().collect();

    let rows = values
        .iter()
        .map(|value| {
            columns
                .iter()
                .map(|column| match value.get(column) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                })
                .collect()
        })
        .collect();

    Ok((columns, rows))
}
