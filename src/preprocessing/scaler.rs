//! Standardization fitted on training rows only

use super::split::TrainPartition;
use crate::error::{Result, SalvageError};
use crate::utils::stats;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Mean and population variance of one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub mean: f64,
    pub variance: f64,
}

impl ColumnScale {
    /// Divisor used when scaling; constant columns only get centered
    pub fn scale(&self) -> f64 {
        let std = self.variance.sqrt();
        if std == 0.0 {
            1.0
        } else {
            std
        }
    }
}

/// Fitted standardization parameters, applicable to any table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub columns: Vec<(String, ColumnScale)>,
}

impl ScalerParams {
    pub fn get(&self, column: &str) -> Option<&ColumnScale> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, scale)| scale)
    }

    /// `(x - mean) / std` for every fitted column
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        self.map_columns(df, |v, scale| (v - scale.mean) / scale.scale())
    }

    /// Undo [`ScalerParams::apply`]
    pub fn inverse(&self, df: &DataFrame) -> Result<DataFrame> {
        self.map_columns(df, |v, scale| v * scale.scale() + scale.mean)
    }

    fn map_columns(&self, df: &DataFrame, f: impl Fn(f64, &ColumnScale) -> f64) -> Result<DataFrame> {
        let mut result = df.clone();
        for (name, scale) in &self.columns {
            let mapped: Float64Chunked = df
                .column(name)
                .map_err(|_| SalvageError::ColumnNotFound(name.clone()))?
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|opt| opt.map(|v| f(v, scale)))
                .collect();
            result.with_column(mapped.with_name(name.as_str().into()).into_series())?;
        }
        Ok(result)
    }
}

/// Z-score scaler over a fixed set of columns
#[derive(Debug, Clone)]
pub struct StandardScaler {
    columns: Vec<String>,
}

impl StandardScaler {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Fit on the training partition; held-out rows never reach this
    pub fn fit(&self, train: &TrainPartition) -> Result<ScalerParams> {
        let df = train.data();
        let columns = self
            .columns
            .iter()
            .map(|name| {
                let values: Vec<f64> = df
                    .column(name)
                    .map_err(|_| SalvageError::ColumnNotFound(name.clone()))?
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .flatten()
                    .collect();

                let mean = stats::mean(&values)
                    .ok_or_else(|| SalvageError::EmptyPartition(format!("no training values for '{}'", name)))?;
                let variance = stats::population_variance(&values).unwrap_or(0.0);
                Ok((name.clone(), ColumnScale { mean, variance }))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ScalerParams { columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train() -> TrainPartition {
        TrainPartition::new(df!("quantity" => &[1.0, 2.0, 3.0, 4.0]).unwrap())
    }

    #[test]
    fn test_fit_uses_population_variance() {
        let params = StandardScaler::new(&["quantity"]).fit(&train()).unwrap();
        let scale = params.get("quantity").unwrap();
        assert!((scale.mean - 2.5).abs() < 1e-12);
        assert!((scale.variance - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_apply_centres_and_scales() {
        let params = StandardScaler::new(&["quantity"]).fit(&train()).unwrap();
        let scaled = params.apply(train().data()).unwrap();
        let values: Vec<f64> = scaled.column("quantity").unwrap().f64().unwrap().into_no_null_iter().collect();

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);

        let restored = params.inverse(&scaled).unwrap();
        let first = restored.column("quantity").unwrap().f64().unwrap().get(0).unwrap();
        assert!((first - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_only_centres() {
        let train = TrainPartition::new(df!("unit_price" => &[2.0, 2.0]).unwrap());
        let params = StandardScaler::new(&["unit_price"]).fit(&train).unwrap();
        let other = df!("unit_price" => &[3.0]).unwrap();
        let scaled = params.apply(&other).unwrap();
        assert_eq!(scaled.column("unit_price").unwrap().f64().unwrap().get(0), Some(1.0));
    }

    #[test]
    fn test_empty_training_column() {
        let train = TrainPartition::new(DataFrame::new(vec![Column::new("quantity".into(), Vec::<f64>::new())]).unwrap());
        assert!(matches!(
            StandardScaler::new(&["quantity"]).fit(&train),
            Err(SalvageError::EmptyPartition(_))
        ));
    }
}
