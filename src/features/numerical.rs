//! Numerical event statistics and standardization

use crate::data::{Column, EventTable};
use crate::utils::FreeFlagDefault;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Date strings that mean "not announced"
pub const PLACEHOLDER_DATES: &[&str] = &["Не се знае сеуште", "", "TBD"];

/// Column-wise z-score scaling with population standard deviation
///
/// Columns with zero deviation are passed through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> Self {
        let n = data.nrows().max(1) as f64;
        let mean = data.sum_axis(Axis(0)) / n;
        let std = data
            .axis_iter(Axis(1))
            .zip(mean.iter())
            .map(|(col, m)| (col.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n).sqrt())
            .collect();
        Self { mean, std }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut out = data.clone();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let std = self.std[j];
            if std > 0.0 && std.is_finite() {
                let mean = self.mean[j];
                col.mapv_inplace(|x| (x - mean) / std);
            } else {
                debug!("Column {} has zero variance, left unscaled", j);
            }
        }
        out
    }

    pub fn fit_transform(data: &Array2<f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(data);
        let scaled = scaler.transform(data);
        (scaler, scaled)
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn std(&self) -> &Array1<f64> {
        &self.std
    }
}

/// Does the date string carry an actual date?
pub fn has_valid_date(date: Option<&str>) -> bool {
    match date {
        None => false,
        Some(d) => !PLACEHOLDER_DATES.contains(&d.trim()),
    }
}

/// NaN -> 0, +inf -> 1, -inf -> 0
pub fn nan_to_num(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else if x == f64::INFINITY {
        1.0
    } else if x == f64::NEG_INFINITY {
        0.0
    } else {
        x
    }
}

/// Names of the numerical columns, in block order
pub const NUMERICAL_COLUMNS: [&str; 5] = [
    "title_length",
    "description_length",
    "is_free",
    "has_valid_date",
    "combined_length",
];

/// Raw (unscaled) numerical statistics per event
///
/// `combined` holds the combined text documents used for the last column.
pub fn raw_statistics(
    table: &EventTable,
    combined: &[String],
    free_default: FreeFlagDefault,
) -> Array2<f64> {
    let n = table.len();
    let mut block = Array2::zeros((n, NUMERICAL_COLUMNS.len()));
    let has_date = table.has(Column::DateStart);

    for (i, record) in table.records().iter().enumerate() {
        let free = record
            .is_free
            .map(|f| if f { 1.0 } else { 0.0 })
            .unwrap_or_else(|| free_default.value());
        let valid_date = has_date && has_valid_date(record.date_start.as_deref());
        let combined_len = combined.get(i).map(|d| d.chars().count()).unwrap_or(0);

        let row = [
            record.title.chars().count() as f64,
            record.description.chars().count() as f64,
            free,
            if valid_date { 1.0 } else { 0.0 },
            combined_len as f64,
        ];
        for (j, value) in row.into_iter().enumerate() {
            block[[i, j]] = nan_to_num(value);
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ColumnSet, EventRecord};
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_scaler_zero_mean_unit_std() {
        let data = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let (scaler, scaled) = StandardScaler::fit_transform(&data);
        assert_relative_eq!(scaled.column(0).sum(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(scaler.std()[0], (2.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        // constant column untouched
        assert_eq!(scaled.column(1).to_vec(), vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_nan_to_num() {
        assert_eq!(nan_to_num(f64::NAN), 0.0);
        assert_eq!(nan_to_num(f64::INFINITY), 1.0);
        assert_eq!(nan_to_num(f64::NEG_INFINITY), 0.0);
        assert_eq!(nan_to_num(2.5), 2.5);
    }

    #[test]
    fn test_placeholder_dates() {
        assert!(!has_valid_date(Some("Не се знае сеуште")));
        assert!(!has_valid_date(Some("TBD")));
        assert!(!has_valid_date(None));
        assert!(has_valid_date(Some("2024-06-01")));
    }

    #[test]
    fn test_free_flag_default_policy() {
        let table = EventTable::new(
            vec![
                EventRecord::new(0, "ab", "").with_free(true),
                EventRecord::new(1, "ab", ""),
            ],
            ColumnSet::empty().with(Column::Title).with(Column::IsFree),
        );
        let docs = vec!["ab".to_string(), "ab".to_string()];

        let paid = raw_statistics(&table, &docs, FreeFlagDefault::Paid);
        assert_eq!(paid[[0, 2]], 1.0);
        assert_eq!(paid[[1, 2]], 0.0);

        let free = raw_statistics(&table, &docs, FreeFlagDefault::Free);
        assert_eq!(free[[1, 2]], 1.0);
        assert_eq!(paid[[0, 0]], 2.0);
        assert_eq!(paid[[0, 3]], 0.0);
    }
}
