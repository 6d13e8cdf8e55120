//! Salvage - recovery and preparation of corrupted transaction tables
//!
//! Every record carries the identity `total = quantity * unit_price`. Salvage
//! uses it to recover single missing values exactly, falls back to per-item
//! medians when two or more are missing, then prepares the recovered table
//! for modeling without leaking held-out rows into anything fitted.
//!
//! # Modules
//!
//! - [`recovery`] - Schema normalization, missingness classification, equation solving, grouped imputation
//! - [`preprocessing`] - Outlier removal, temporal features, target transform, split, encoding, scaling
//! - [`validation`] - Identity residual and imputed-vs-observed checks
//! - [`pipeline`] - End-to-end run over one batch
//! - [`config`] - Schema and pipeline configuration
//! - [`utils`] - Data loading and summary statistics
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Stages
pub mod recovery;
pub mod preprocessing;
pub mod validation;
pub mod pipeline;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{Result, SalvageError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, SalvageError};

    // Configuration
    pub use crate::config::{PipelineConfig, SchemaConfig};

    // Recovery
    pub use crate::recovery::{
        EquationSolver, GroupMedians, GroupedMedianImputer, MissingnessClassifier, MissingnessProfile,
        NumericField, NumericTriple, RecoveryClass, RecoveryEngine, RecoveryOutput, RecoveryReport,
        SchemaNormalizer, IS_IMPUTED_COLUMN, RECOVERY_CLASS_COLUMN,
    };

    // Preparation
    pub use crate::preprocessing::{
        FeaturePipeline, FittedArtifacts, HoldoutPartition, OneHotEncoder, OutlierBounds, OutlierFilter,
        PreparedDataset, ScalerParams, StandardScaler, TargetTransform, TemporalFeatures, TrainPartition,
        TrainTestSplit, TARGET_COLUMN,
    };

    // Validation
    pub use crate::validation::{ValidationHarness, ValidationReport};

    // Pipeline
    pub use crate::pipeline::{SalvageOutput, SalvagePipeline};

    // Data loading
    pub use crate::utils::{DataLoader, DataSaver};
}
