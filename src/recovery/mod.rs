//! Record recovery for transaction tables
//!
//! Recovery runs in a fixed order:
//! - Schema normalization (sentinels to nulls, type coercion)
//! - Missingness classification of the `(quantity, unit_price, total)` triple
//! - Deterministic solve of single missing fields from `total = quantity * unit_price`
//! - Grouped-median imputation of the rest, with identity re-derivation
//!
//! Medians are always fitted on rows that were complete before any recovery,
//! so solved or imputed values never feed back into the reference set.

mod classifier;
mod engine;
mod imputer;
mod normalizer;
mod record;
mod report;
mod solver;

pub use classifier::MissingnessClassifier;
pub use engine::{RecoveryEngine, RecoveryOutput};
pub use imputer::{FieldMedians, GroupMedians, GroupedMedianImputer, ImputeOutcome};
pub use normalizer::{parse_numeric, parse_timestamp, timestamp_millis, SchemaNormalizer};
pub use record::{NumericField, NumericTriple, RecoveryClass};
pub use report::{ColumnMissingness, MissingnessProfile, RecoveryReport};
pub use solver::{EquationSolver, SolveOutcome};

/// Boolean column marking rows filled by the median imputer
pub const IS_IMPUTED_COLUMN: &str = "is_imputed";

/// Final recovery class label per row
pub const RECOVERY_CLASS_COLUMN: &str = "recovery_class";
