//! Leakage-safe feature preparation
//!
//! Everything learned from data (categories, scaling parameters) is fitted on
//! the training partition and replayed on held-out and future rows through
//! [`FittedArtifacts`].

use super::encoder::OneHotEncoder;
use super::scaler::{ScalerParams, StandardScaler};
use super::split::TrainTestSplit;
use super::transforms::{TargetTransform, TemporalFeatures, SEASON_COLUMN, TEMPORAL_COLUMNS};
use crate::config::PipelineConfig;
use crate::error::{Result, SalvageError};
use crate::recovery::IS_IMPUTED_COLUMN;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Name of the transformed regression target column
pub const TARGET_COLUMN: &str = "target";

/// Copy the named columns into a dense row-major matrix.
///
/// Nulls and non-finite values are errors.
pub fn column_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let mut matrix = Array2::zeros((df.height(), columns.len()));
    for (j, name) in columns.iter().enumerate() {
        let casted = df
            .column(name)
            .map_err(|_| SalvageError::ColumnNotFound(name.clone()))?
            .cast(&DataType::Float64)?;
        let ca = casted.f64()?;
        if ca.null_count() > 0 {
            return Err(SalvageError::DataError(format!(
                "feature column '{}' contains {} null value(s)",
                name,
                ca.null_count()
            )));
        }
        for (i, value) in ca.into_no_null_iter().enumerate() {
            if !value.is_finite() {
                return Err(SalvageError::DataError(format!(
                    "feature column '{}' has non-finite value {} at row {}",
                    name, value, i
                )));
            }
            matrix[[i, j]] = value;
        }
    }
    Ok(matrix)
}

/// Everything needed to turn recovered rows into model inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedArtifacts {
    pub temporal: TemporalFeatures,
    pub encoder: OneHotEncoder,
    pub scaler: ScalerParams,
    pub target_transform: TargetTransform,
    /// Column the target is derived from
    pub target_source: String,
    /// Model feature columns, in matrix order
    pub feature_columns: Vec<String>,
}

impl FittedArtifacts {
    /// Apply the fitted transforms to recovered rows.
    ///
    /// The target column is only added when its source column is present.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = self.temporal.transform(df)?;
        if out.column(&self.target_source).is_ok() {
            out = self
                .target_transform
                .apply_column(&out, &self.target_source, TARGET_COLUMN)?;
        }
        let out = self.encoder.transform(&out)?;
        self.scaler.apply(&out)
    }

    /// Feature matrix of an already transformed table
    pub fn feature_matrix(&self, df: &DataFrame) -> Result<Array2<f64>> {
        column_matrix(df, &self.feature_columns)
    }

    /// Target vector of an already transformed table
    pub fn target_vector(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let matrix = column_matrix(df, &[TARGET_COLUMN.to_string()])?;
        Ok(matrix.column(0).to_owned())
    }

    /// Map model predictions back to the original target scale
    pub fn inverse_target(&self, predictions: &Array1<f64>) -> Array1<f64> {
        predictions.mapv(|y| self.target_transform.inverse(y))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let artifacts: Self = serde_json::from_str(&json)?;
        Ok(artifacts)
    }
}

/// Prepared partitions plus the artifacts that produced them
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub train: DataFrame,
    pub holdout: DataFrame,
    pub artifacts: FittedArtifacts,
    /// Sample skewness of the raw target that drove the transform choice
    pub target_skewness: f64,
}

impl PreparedDataset {
    pub fn encoder(&self) -> &OneHotEncoder {
        &self.artifacts.encoder
    }

    pub fn scaler(&self) -> &ScalerParams {
        &self.artifacts.scaler
    }

    pub fn target_transform(&self) -> TargetTransform {
        self.artifacts.target_transform
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.artifacts.feature_columns
    }

    pub fn train_features(&self) -> Result<Array2<f64>> {
        self.artifacts.feature_matrix(&self.train)
    }

    pub fn train_target(&self) -> Result<Array1<f64>> {
        self.artifacts.target_vector(&self.train)
    }

    pub fn holdout_features(&self) -> Result<Array2<f64>> {
        self.artifacts.feature_matrix(&self.holdout)
    }

    pub fn holdout_target(&self) -> Result<Array1<f64>> {
        self.artifacts.target_vector(&self.holdout)
    }
}

/// Builds model-ready partitions from a recovered, outlier-filtered table
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    config: PipelineConfig,
}

impl FeaturePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    fn categorical_columns(&self) -> Vec<&str> {
        let mut columns = self.config.schema.categorical_columns().to_vec();
        columns.push(SEASON_COLUMN);
        columns
    }

    fn scaled_columns(&self) -> Vec<&str> {
        vec![
            self.config.schema.quantity.as_str(),
            self.config.schema.unit_price.as_str(),
        ]
    }

    /// Temporal features, target transform, split, encode, scale
    pub fn prepare(&self, df: &DataFrame) -> Result<PreparedDataset> {
        let schema = &self.config.schema;

        let temporal = TemporalFeatures::new(schema.timestamp.as_str());
        let featured = temporal.transform(df)?;

        let totals: Vec<f64> = featured
            .column(&schema.total)
            .map_err(|_| SalvageError::ColumnNotFound(schema.total.clone()))?
            .f64()?
            .into_iter()
            .flatten()
            .collect();
        let (target_transform, target_skewness) =
            TargetTransform::select(&totals, self.config.skew_threshold);
        let featured = target_transform.apply_column(&featured, &schema.total, TARGET_COLUMN)?;

        let (train, holdout) =
            TrainTestSplit::new(self.config.test_fraction, self.config.random_state).split(&featured)?;

        let encoder = OneHotEncoder::fit(&train, &self.categorical_columns())?;
        let scaler = StandardScaler::new(&self.scaled_columns()).fit(&train)?;

        let mut feature_columns: Vec<String> = self.scaled_columns().iter().map(|c| c.to_string()).collect();
        if self.config.include_imputed_flag {
            feature_columns.push(IS_IMPUTED_COLUMN.to_string());
        }
        feature_columns.extend(TEMPORAL_COLUMNS.iter().map(|c| c.to_string()));
        feature_columns.extend(encoder.feature_names());

        let encode_and_scale = |df: &DataFrame| -> Result<DataFrame> { scaler.apply(&encoder.transform(df)?) };
        let train_df = encode_and_scale(train.data())?;
        let holdout_df = encode_and_scale(holdout.data())?;

        info!(
            train = train_df.height(),
            holdout = holdout_df.height(),
            features = feature_columns.len(),
            target_transform = ?target_transform,
            skewness = target_skewness,
            "Feature preparation finished"
        );

        Ok(PreparedDataset {
            train: train_df,
            holdout: holdout_df,
            artifacts: FittedArtifacts {
                temporal,
                encoder,
                scaler,
                target_transform,
                target_source: schema.total.clone(),
                feature_columns,
            },
            target_skewness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recovered_df() -> DataFrame {
        let n = 10;
        let millis: Vec<i64> = (0..n).map(|i| 1_672_531_200_000 + i * 86_400_000).collect();
        let ts = Series::new("transaction_timestamp".into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        let quantity: Vec<f64> = (0..n).map(|i| (i % 5 + 1) as f64).collect();
        let unit_price: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 2.0 } else { 3.0 }).collect();
        let total: Vec<f64> = quantity.iter().zip(&unit_price).map(|(q, p)| q * p).collect();
        let items: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "Coffee" } else { "Tea" }).collect();

        DataFrame::new(vec![
            Column::new("item".into(), items),
            Column::new("quantity".into(), quantity),
            Column::new("unit_price".into(), unit_price),
            Column::new("total".into(), total),
            Column::new("payment_method".into(), vec!["Cash"; n as usize]),
            Column::new("location".into(), vec!["In-store"; n as usize]),
            ts.into(),
            Column::new(IS_IMPUTED_COLUMN.into(), vec![false; n as usize]),
        ])
        .unwrap()
    }

    #[test]
    fn test_prepare_shapes() {
        let prepared = FeaturePipeline::new(PipelineConfig::default())
            .prepare(&recovered_df())
            .unwrap();

        assert_eq!(prepared.train.height(), 8);
        assert_eq!(prepared.holdout.height(), 2);

        let x = prepared.train_features().unwrap();
        let y = prepared.train_target().unwrap();
        assert_eq!(x.nrows(), 8);
        assert_eq!(x.ncols(), prepared.feature_columns().len());
        assert_eq!(y.len(), 8);
        assert!(prepared.feature_columns().contains(&IS_IMPUTED_COLUMN.to_string()));
        assert!(!prepared.feature_columns().contains(&"total".to_string()));
    }

    #[test]
    fn test_artifacts_replay_on_new_rows() {
        let df = recovered_df();
        let prepared = FeaturePipeline::new(PipelineConfig::default()).prepare(&df).unwrap();
        let transformed = prepared.artifacts.transform(&df).unwrap();
        let x = prepared.artifacts.feature_matrix(&transformed).unwrap();
        assert_eq!(x.dim(), (10, prepared.feature_columns().len()));
    }

    #[test]
    fn test_artifacts_round_trip_through_json() {
        let prepared = FeaturePipeline::new(PipelineConfig::default())
            .prepare(&recovered_df())
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts.json");
        let path = path.to_str().unwrap();
        prepared.artifacts.save(path).unwrap();
        let loaded = FittedArtifacts::load(path).unwrap();
        assert_eq!(loaded, prepared.artifacts);
    }

    #[test]
    fn test_column_matrix_rejects_non_finite_values() {
        let df = df!("target" => &[1.0, f64::NAN, 2.0]).unwrap();
        let err = column_matrix(&df, &["target".to_string()]).unwrap_err();
        assert!(matches!(err, SalvageError::DataError(_)));
    }

    #[test]
    fn test_imputed_flag_can_be_excluded() {
        let config = PipelineConfig {
            include_imputed_flag: false,
            ..Default::default()
        };
        let prepared = FeaturePipeline::new(config).prepare(&recovered_df()).unwrap();
        assert!(!prepared.feature_columns().contains(&IS_IMPUTED_COLUMN.to_string()));
    }
}
