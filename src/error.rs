//! Error types for the event graph pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
///
/// Degenerate data (empty text, constant columns, edgeless graphs) is not an
/// error: it is recovered locally and tagged on the returned value.
#[derive(Error, Debug)]
pub enum Error {
    /// No readable event table was found in any candidate location
    #[error("no CSV event table found; attempted: {}", format_paths(.attempted))]
    MissingInput { attempted: Vec<PathBuf> },

    /// The event table was found but has no rows
    #[error("event table {0:?} contains no records")]
    EmptyDataset(PathBuf),

    /// A graph type could not be built
    #[error("graph construction failed: {0}")]
    GraphConstruction(String),

    /// A training run could not be completed
    #[error("training failed: {0}")]
    Training(String),

    /// Architecture name outside GCN / GAT / GraphSAGE
    #[error("unknown architecture: {0}")]
    UnknownArchitecture(String),

    /// Matrix dimensions do not line up
    #[error("shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<none>".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
