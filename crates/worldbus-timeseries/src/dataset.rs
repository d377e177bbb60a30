//! Historical dataset archive: one row per entity, one column per time offset.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::TimeSeriesError;

/// Raw archive layout. Every field is required; `null` cells are undefined.
#[derive(Debug, Deserialize)]
struct Archive {
    data: Vec<Vec<Option<f64>>>,
    ids: Vec<Value>,
    startdate: Value,
    enddate: Value,
}

/// Row-major `rows × columns` matrix with undefined entries stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    values: Vec<f64>,
    rows: usize,
    columns: usize,
    ids: Vec<String>,
    start: Value,
    end: Value,
}

impl Dataset {
    /// Build a dataset from in-memory rows.
    pub fn from_rows(
        rows: Vec<Vec<f64>>,
        ids: Vec<String>,
        start: Value,
        end: Value,
    ) -> Result<Self, TimeSeriesError> {
        if rows.len() != ids.len() {
            return Err(TimeSeriesError::load(format!(
                "{} ids for {} data rows",
                ids.len(),
                rows.len()
            )));
        }
        let columns = rows.first().map_or(0, Vec::len);
        if columns == 0 {
            return Err(TimeSeriesError::load("dataset has no time columns"));
        }
        if let Some(row) = rows.iter().position(|row| row.len() != columns) {
            return Err(TimeSeriesError::load(format!(
                "row {row} has {} columns, expected {columns}",
                rows[row].len()
            )));
        }
        let height = rows.len();
        Ok(Self {
            values: rows.into_iter().flatten().collect(),
            rows: height,
            columns,
            ids,
            start,
            end,
        })
    }

    /// Parse a JSON archive with `data`, `ids`, `startdate` and `enddate` fields.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TimeSeriesError> {
        let archive: Archive = serde_json::from_reader(reader)
            .map_err(|err| TimeSeriesError::load(err.to_string()))?;
        let rows = archive
            .data
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.unwrap_or(f64::NAN)).collect())
            .collect();
        let ids = archive.ids.iter().map(id_label).collect();
        Self::from_rows(rows, ids, archive.startdate, archive.enddate)
    }

    pub fn from_json_str(json: &str) -> Result<Self, TimeSeriesError> {
        Self::from_reader(json.as_bytes())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TimeSeriesError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let dataset = Self::from_reader(BufReader::new(file))?;
        info!(
            path = %path.display(),
            ids = dataset.rows,
            columns = dataset.columns,
            "loaded time series archive"
        );
        Ok(dataset)
    }

    /// Number of entities (rows).
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of time offsets (columns).
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Opaque start marker, passed through unchanged.
    #[must_use]
    pub fn start(&self) -> &Value {
        &self.start
    }

    #[must_use]
    pub fn end(&self) -> &Value {
        &self.end
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.columns..(row + 1) * self.columns]
    }

    pub(crate) fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.values[row * self.columns..(row + 1) * self.columns]
    }

    /// Gather column `t`, one value per id.
    #[must_use]
    pub fn column(&self, t: usize) -> Vec<f64> {
        (0..self.rows)
            .map(|row| self.values[row * self.columns + t])
            .collect()
    }
}

fn id_label(id: &Value) -> String {
    match id {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
