//! One-hot encoding with categories learned from the training partition

use super::split::TrainPartition;
use crate::error::{Result, SalvageError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Categories observed for one column, sorted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCategories {
    pub column: String,
    pub categories: Vec<String>,
}

impl ColumnCategories {
    /// Indicator column names, in category order
    pub fn feature_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|category| format!("{}_{}", self.column, category))
            .collect()
    }
}

/// Fitted one-hot encoder.
///
/// Values not seen during fitting (and nulls) encode as all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<ColumnCategories>,
}

impl OneHotEncoder {
    /// Learn the category set of each column from training rows only
    pub fn fit(train: &TrainPartition, columns: &[&str]) -> Result<Self> {
        let df = train.data();
        let columns = columns
            .iter()
            .map(|name| {
                let ca = df
                    .column(name)
                    .map_err(|_| SalvageError::ColumnNotFound(name.to_string()))?
                    .str()?
                    .clone();
                let categories: BTreeSet<String> = ca.into_iter().flatten().map(str::to_string).collect();
                Ok(ColumnCategories {
                    column: name.to_string(),
                    categories: categories.into_iter().collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnCategories] {
        &self.columns
    }

    /// All indicator column names in output order
    pub fn feature_names(&self) -> Vec<String> {
        self.columns.iter().flat_map(ColumnCategories::feature_names).collect()
    }

    /// Append one `i32` indicator column per learned category.
    ///
    /// Source columns are left in place.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();

        for encoded in &self.columns {
            let ca = df
                .column(&encoded.column)
                .map_err(|_| SalvageError::ColumnNotFound(encoded.column.clone()))?
                .str()?;

            for (category, name) in encoded.categories.iter().zip(encoded.feature_names()) {
                let values: Vec<i32> = ca
                    .into_iter()
                    .map(|v| (v == Some(category.as_str())) as i32)
                    .collect();
                result.with_column(Series::new(name.into(), values))?;
            }
        }

        Ok(result)
    }
}
