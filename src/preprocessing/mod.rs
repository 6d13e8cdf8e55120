//! Post-recovery preparation
//!
//! - IQR outlier removal on the recovered total
//! - Calendar features and the skew-driven target transform
//! - Seeded train / held-out partitioning
//! - One-hot encoding and standardization fitted on the training partition

mod encoder;
mod outlier;
mod pipeline;
mod scaler;
mod split;
mod transforms;

pub use encoder::{ColumnCategories, OneHotEncoder};
pub use outlier::{OutlierBounds, OutlierFilter, OutlierSummary};
pub use pipeline::{column_matrix, FeaturePipeline, FittedArtifacts, PreparedDataset, TARGET_COLUMN};
pub use scaler::{ColumnScale, ScalerParams, StandardScaler};
pub use split::{HoldoutPartition, TrainPartition, TrainTestSplit};
pub use transforms::{Season, TargetTransform, TemporalFeatures, SEASON_COLUMN, TEMPORAL_COLUMNS};
