//! Feature engineering
//!
//! Turns an [`EventTable`] into three row-aligned blocks:
//!
//! - textual: TF-IDF over title, description and category (or a ones placeholder)
//! - categorical: label-encoded category / organizer / location / source
//! - numerical: standardized text lengths, free-flag and date validity

pub mod categorical;
pub mod numerical;
pub mod stopwords;
pub mod text;
pub mod tokenizer;

pub use categorical::{CategoricalEncoders, LabelEncoder, UNKNOWN};
pub use numerical::{has_valid_date, nan_to_num, StandardScaler, NUMERICAL_COLUMNS};
pub use text::{combined_documents, BlockKind, TextualFeatures, TfIdfVectorizer, DUMMY_TEXT_WIDTH};
pub use tokenizer::Tokenizer;

use crate::data::EventTable;
use crate::error::{Error, Result};
use crate::utils::FeatureConfig;
use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Width of each block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDimensions {
    pub textual: usize,
    pub categorical: usize,
    pub numerical: usize,
}

impl FeatureDimensions {
    pub fn total(&self) -> usize {
        self.textual + self.categorical + self.numerical
    }
}

/// Engineered features plus the fitted transforms that produced them
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub textual: TextualFeatures,
    pub categorical: Array2<f64>,
    pub numerical: Array2<f64>,
    pub encoders: CategoricalEncoders,
    pub scaler: StandardScaler,
}

impl FeatureSet {
    pub fn num_rows(&self) -> usize {
        self.textual.matrix.nrows()
    }

    pub fn dimensions(&self) -> FeatureDimensions {
        FeatureDimensions {
            textual: self.textual.width(),
            categorical: self.categorical.ncols(),
            numerical: self.numerical.ncols(),
        }
    }

    /// `[textual | categorical | numerical]` per event
    pub fn concatenated(&self) -> Result<Array2<f64>> {
        concatenate(
            Axis(1),
            &[
                self.textual.matrix.view(),
                self.categorical.view(),
                self.numerical.view(),
            ],
        )
        .map_err(|e| Error::GraphConstruction(format!("feature blocks misaligned: {}", e)))
    }
}

/// Builds a [`FeatureSet`] from an event table
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer {
    config: FeatureConfig,
}

impl FeatureEngineer {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Engineer all three blocks; degenerate inputs fall back, never fail
    pub fn build(&self, table: &EventTable) -> FeatureSet {
        let tokenizer = Tokenizer::new().with_min_length(self.config.min_token_length);
        let textual = TextualFeatures::build(
            table,
            self.config.max_text_features,
            tokenizer,
            self.config.ngram_max,
        );

        let encoders = CategoricalEncoders::fit(table);
        let categorical = encoders.transform(table);

        let documents = combined_documents(table);
        let raw = numerical::raw_statistics(table, &documents, self.config.free_flag_default);
        let (scaler, numerical) = StandardScaler::fit_transform(&raw);

        let features = FeatureSet {
            textual,
            categorical,
            numerical,
            encoders,
            scaler,
        };
        info!(
            "Features ready for {} events: {:?}",
            features.num_rows(),
            features.dimensions()
        );
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, ColumnSet, EventRecord};

    fn table() -> EventTable {
        let records = vec![
            EventRecord::new(0, "Jazz night", "Live jazz quartet").with_category("Music"),
            EventRecord::new(1, "Rock festival", "Three rock bands").with_category("Music"),
            EventRecord::new(2, "Film premiere", "Macedonian drama").with_category("Film"),
        ];
        let columns = ColumnSet::empty()
            .with(Column::Title)
            .with(Column::Description)
            .with(Column::Category);
        EventTable::new(records, columns)
    }

    #[test]
    fn test_blocks_aligned() {
        let features = FeatureEngineer::default().build(&table());
        assert_eq!(features.textual.matrix.nrows(), 3);
        assert_eq!(features.categorical.nrows(), 3);
        assert_eq!(features.numerical.nrows(), 3);
        assert!(!features.textual.is_dummy());

        let dims = features.dimensions();
        assert_eq!(dims.categorical, 1);
        assert_eq!(dims.numerical, NUMERICAL_COLUMNS.len());
        assert_eq!(features.concatenated().unwrap().ncols(), dims.total());
    }

    #[test]
    fn test_vocabulary_respects_cap() {
        let config = FeatureConfig {
            max_text_features: 4,
            ..Default::default()
        };
        let features = FeatureEngineer::new(config).build(&table());
        assert_eq!(features.dimensions().textual, 4);
    }
}
