//! Utilities: configuration.

pub mod config;

pub use config::{
    Config, DataConfig, FeatureConfig, FreeFlagDefault, GraphConfig, GraphKind, TrainingConfig,
};
