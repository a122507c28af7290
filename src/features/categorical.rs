//! Label encoding of categorical columns

use crate::data::{Column, EventTable};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Class used for missing or empty values
pub const UNKNOWN: &str = "Unknown";

/// Fitted string -> integer mapping; classes are sorted so codes are stable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on raw values; `None` and blank strings become [`UNKNOWN`]
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut classes: Vec<String> = values
            .into_iter()
            .map(|v| normalize(v).to_string())
            .collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Code for a raw value, `None` if it was never seen during fitting
    pub fn transform(&self, value: Option<&str>) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(normalize(value)))
            .ok()
    }

    pub fn inverse_transform(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

fn normalize(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => UNKNOWN,
    }
}

/// Encoders fitted for each categorical column present in the table
///
/// Returned by feature engineering and consumed by the heterogeneous graph
/// builder, so organizer and venue nodes share the feature codes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoricalEncoders {
    encoders: Vec<(Column, LabelEncoder)>,
}

impl CategoricalEncoders {
    /// Fit one encoder per present categorical column
    pub fn fit(table: &EventTable) -> Self {
        let encoders = Column::categorical()
            .into_iter()
            .filter(|c| table.has(*c))
            .map(|column| {
                let encoder = LabelEncoder::fit(table.records().iter().map(|r| r.text(column)));
                info!("{}: {} unique values", column, encoder.len());
                (column, encoder)
            })
            .collect();
        Self { encoders }
    }

    pub fn get(&self, column: Column) -> Option<&LabelEncoder> {
        self.encoders
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, e)| e)
    }

    /// Encoded columns, in block order
    pub fn columns(&self) -> Vec<Column> {
        self.encoders.iter().map(|(c, _)| *c).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }

    /// Integer-coded block; a single zero column when nothing was encoded
    pub fn transform(&self, table: &EventTable) -> Array2<f64> {
        let n = table.len();
        if self.encoders.is_empty() {
            warn!("No categorical columns, using a zero column");
            return Array2::zeros((n, 1));
        }

        let mut block = Array2::zeros((n, self.encoders.len()));
        for (j, (column, encoder)) in self.encoders.iter().enumerate() {
            for (i, record) in table.records().iter().enumerate() {
                if let Some(code) = encoder.transform(record.text(*column)) {
                    block[[i, j]] = code as f64;
                }
            }
        }
        block
    }
}
