//! Text vectorization
//!
//! TF-IDF over event documents with a capped vocabulary, and the textual
//! feature block built from it.

use super::tokenizer::Tokenizer;
use crate::data::{Column, EventTable};
use crate::error::{Error, Result};
use hashbrown::{HashMap, HashSet};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Width of the placeholder text block
pub const DUMMY_TEXT_WIDTH: usize = 10;

/// TF-IDF vectorizer with smooth idf and L2-normalized rows
#[derive(Debug, Clone)]
pub struct TfIdfVectorizer {
    tokenizer: Tokenizer,
    /// Vocabulary cap, most frequent terms kept
    max_features: usize,
    /// Largest n-gram size
    ngram_max: usize,
    /// Term -> column index
    vocabulary: HashMap<String, usize>,
    /// Column index -> term, alphabetical
    terms: Vec<String>,
    /// IDF per column
    idf: Vec<f64>,
}

impl TfIdfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            max_features,
            ngram_max: 2,
            vocabulary: HashMap::new(),
            terms: Vec::new(),
            idf: Vec::new(),
        }
    }

    pub fn with_ngram_max(mut self, ngram_max: usize) -> Self {
        self.ngram_max = ngram_max.max(1);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Learn vocabulary and idf; fails when no document has a usable term
    pub fn fit(&mut self, documents: &[String]) -> Result<()> {
        let analyzed: Vec<Vec<String>> = documents
            .iter()
            .map(|d| self.tokenizer.ngrams(d, self.ngram_max))
            .collect();

        let mut corpus_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &analyzed {
            for term in doc {
                *corpus_freq.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        if corpus_freq.is_empty() {
            return Err(Error::GraphConstruction(
                "empty vocabulary; documents contain only stop words or no letters".to_string(),
            ));
        }

        let mut ranked: Vec<(&str, usize)> = corpus_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.max_features);

        let mut terms: Vec<String> = ranked.into_iter().map(|(t, _)| t.to_string()).collect();
        terms.sort();

        self.vocabulary = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        self.terms = terms;

        let mut doc_freq = vec![0usize; self.terms.len()];
        for doc in &analyzed {
            let unique: HashSet<&String> = doc.iter().collect();
            for term in unique {
                if let Some(&idx) = self.vocabulary.get(term) {
                    doc_freq[idx] += 1;
                }
            }
        }

        let n_docs = documents.len() as f64;
        self.idf = doc_freq
            .into_iter()
            .map(|df| ((n_docs + 1.0) / (df as f64 + 1.0)).ln() + 1.0)
            .collect();

        Ok(())
    }

    /// Vectorize one document
    pub fn transform(&self, document: &str) -> Vec<f64> {
        let mut row = vec![0.0; self.terms.len()];
        for term in self.tokenizer.ngrams(document, self.ngram_max) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                row[idx] += 1.0;
            }
        }
        for (value, idf) in row.iter_mut().zip(&self.idf) {
            *value *= idf;
        }
        l2_normalize(&mut row);
        row
    }

    /// Fit and vectorize all documents into a dense matrix
    pub fn fit_transform(&mut self, documents: &[String]) -> Result<Array2<f64>> {
        self.fit(documents)?;
        let width = self.terms.len();
        let mut matrix = Array2::zeros((documents.len(), width));
        for (i, doc) in documents.iter().enumerate() {
            for (j, value) in self.transform(doc).into_iter().enumerate() {
                matrix[[i, j]] = value;
            }
        }
        Ok(matrix)
    }

    /// Vocabulary terms in column order
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }
}

fn l2_normalize(vector: &mut [f64]) {
    let norm: f64 = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Whether a text block comes from real vocabulary or is the placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    /// TF-IDF columns, one per term
    Real { terms: Vec<String> },
    /// All-ones matrix of [`DUMMY_TEXT_WIDTH`] columns
    Dummy,
}

/// Textual feature block
#[derive(Debug, Clone)]
pub struct TextualFeatures {
    pub matrix: Array2<f64>,
    pub kind: BlockKind,
}

impl TextualFeatures {
    /// Placeholder block for `n` events
    pub fn dummy(n: usize) -> Self {
        Self {
            matrix: Array2::ones((n, DUMMY_TEXT_WIDTH)),
            kind: BlockKind::Dummy,
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.kind == BlockKind::Dummy
    }

    pub fn width(&self) -> usize {
        self.matrix.ncols()
    }

    /// Vectorize the combined title / description / category of each event
    ///
    /// Falls back to the placeholder when every document is empty, when the
    /// vocabulary is empty, or when it has a single term and so cannot tell
    /// events apart.
    pub fn build(table: &EventTable, max_features: usize, tokenizer: Tokenizer, ngram_max: usize) -> Self {
        let documents = combined_documents(table);
        let n = table.len();

        if documents.iter().all(|d| d.is_empty()) {
            warn!("All event texts are empty, using dummy text features");
            return Self::dummy(n);
        }

        let mut vectorizer = TfIdfVectorizer::new(max_features)
            .with_tokenizer(tokenizer)
            .with_ngram_max(ngram_max);

        match vectorizer.fit_transform(&documents) {
            Ok(matrix) if matrix.ncols() >= 2 => {
                info!("TF-IDF features: {:?}", matrix.dim());
                Self {
                    matrix,
                    kind: BlockKind::Real {
                        terms: vectorizer.terms().to_vec(),
                    },
                }
            }
            Ok(matrix) => {
                warn!(
                    "Vocabulary has {} term(s), using dummy text features",
                    matrix.ncols()
                );
                Self::dummy(n)
            }
            Err(e) => {
                warn!("TF-IDF failed ({}), using dummy text features", e);
                Self::dummy(n)
            }
        }
    }
}

/// Title, description and category joined with spaces and trimmed
pub fn combined_documents(table: &EventTable) -> Vec<String> {
    let present: Vec<Column> = Column::textual()
        .into_iter()
        .filter(|c| table.has(*c) || matches!(c, Column::Title | Column::Description))
        .collect();

    table
        .records()
        .iter()
        .map(|r| {
            present
                .iter()
                .map(|c| r.text(*c).unwrap_or(""))
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ColumnSet, EventRecord};
    use approx::assert_relative_eq;

    fn docs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_vocabulary_sorted_and_capped() {
        let mut v = TfIdfVectorizer::new(3);
        v.fit(&docs(&["jazz jazz concert", "jazz festival", "rock concert"]))
            .unwrap();
        // jazz(3), concert(2) then ties at 1 broken alphabetically
        assert_eq!(v.terms(), &["concert", "festival", "jazz"]);
    }

    #[test]
    fn test_rows_are_unit_length() {
        let mut v = TfIdfVectorizer::new(50);
        let m = v
            .fit_transform(&docs(&["jazz concert", "rock festival night"]))
            .unwrap();
        for row in m.rows() {
            let norm: f64 = row.iter().map(|x| x * x).sum::<f64>().sqrt();
            assert_relative_eq!(norm, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_smooth_idf() {
        let mut v = TfIdfVectorizer::new(50).with_ngram_max(1);
        v.fit(&docs(&["jazz", "jazz rock"])).unwrap();
        let jazz = v.terms().iter().position(|t| t == "jazz").unwrap();
        let rock = v.terms().iter().position(|t| t == "rock").unwrap();
        assert_relative_eq!(v.idf()[jazz], 1.0, epsilon = 1e-12);
        assert_relative_eq!(v.idf()[rock], (3.0f64 / 2.0).ln() + 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_vocabulary_is_error() {
        let mut v = TfIdfVectorizer::new(50);
        assert!(v.fit(&docs(&["the and of", "Концерт"])).is_err());
    }

    #[test]
    fn test_empty_texts_fall_back_to_dummy() {
        let records = (0..4).map(|i| EventRecord::new(i, "", "")).collect();
        let columns = ColumnSet::empty().with(Column::Title).with(Column::Description);
        let table = EventTable::new(records, columns);

        let block = TextualFeatures::build(&table, 50, Tokenizer::new(), 2);
        assert!(block.is_dummy());
        assert_eq!(block.matrix.dim(), (4, DUMMY_TEXT_WIDTH));
        assert!(block.matrix.iter().all(|&x| x == 1.0));
    }

    #[test]
    fn test_combined_documents_skip_absent_category() {
        let records = vec![EventRecord::new(0, " Jazz ", "night").with_category("Music")];
        let with = EventTable::new(
            records.clone(),
            ColumnSet::empty()
                .with(Column::Title)
                .with(Column::Description)
                .with(Column::Category),
        );
        assert_eq!(combined_documents(&with), vec!["Jazz  night Music"]);

        let without = EventTable::new(records, ColumnSet::empty().with(Column::Title));
        assert_eq!(combined_documents(&without), vec!["Jazz  night"]);
    }
}
