//! Typed view of the numeric triple and its recovery class

use crate::config::SchemaConfig;
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three fields linked by `total = quantity * unit_price`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NumericField {
    Quantity,
    UnitPrice,
    Total,
}

impl NumericField {
    pub const ALL: [NumericField; 3] = [
        NumericField::Quantity,
        NumericField::UnitPrice,
        NumericField::Total,
    ];

    /// Column holding this field in the working table
    pub fn column<'a>(&self, schema: &'a SchemaConfig) -> &'a str {
        match self {
            NumericField::Quantity => &schema.quantity,
            NumericField::UnitPrice => &schema.unit_price,
            NumericField::Total => &schema.total,
        }
    }

    /// The field a solve for `self` divides by, if any.
    ///
    /// A missing total needs no division, but its unit price must still be
    /// positive for the product to be trusted.
    pub fn divisor(&self) -> NumericField {
        match self {
            NumericField::Total | NumericField::Quantity => NumericField::UnitPrice,
            NumericField::UnitPrice => NumericField::Quantity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NumericField::Quantity => "quantity",
            NumericField::UnitPrice => "unit_price",
            NumericField::Total => "total",
        }
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a record can be brought back to a complete numeric triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecoveryClass {
    /// All three numeric fields present
    Complete,
    /// Exactly one field missing and recoverable from the identity
    Solvable(NumericField),
    /// Two or more fields unknown; needs statistical imputation
    Unsolvable,
    /// No transaction timestamp; excluded from every later stage
    Dropped,
}

impl RecoveryClass {
    /// Stable label written to the `recovery_class` column
    pub fn label(&self) -> &'static str {
        match self {
            RecoveryClass::Complete => "complete",
            RecoveryClass::Solvable(NumericField::Quantity) => "solvable_quantity",
            RecoveryClass::Solvable(NumericField::UnitPrice) => "solvable_unit_price",
            RecoveryClass::Solvable(NumericField::Total) => "solvable_total",
            RecoveryClass::Unsolvable => "unsolvable",
            RecoveryClass::Dropped => "dropped",
        }
    }

    /// Parse a label produced by [`RecoveryClass::label`]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "complete" => Some(RecoveryClass::Complete),
            "solvable_quantity" => Some(RecoveryClass::Solvable(NumericField::Quantity)),
            "solvable_unit_price" => Some(RecoveryClass::Solvable(NumericField::UnitPrice)),
            "solvable_total" => Some(RecoveryClass::Solvable(NumericField::Total)),
            "unsolvable" => Some(RecoveryClass::Unsolvable),
            "dropped" => Some(RecoveryClass::Dropped),
            _ => None,
        }
    }
}

/// The numeric triple of one record; `None` marks a missing value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericTriple {
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub total: Option<f64>,
}

impl NumericTriple {
    pub fn new(quantity: Option<f64>, unit_price: Option<f64>, total: Option<f64>) -> Self {
        Self {
            quantity,
            unit_price,
            total,
        }
    }

    pub fn get(&self, field: NumericField) -> Option<f64> {
        match field {
            NumericField::Quantity => self.quantity,
            NumericField::UnitPrice => self.unit_price,
            NumericField::Total => self.total,
        }
    }

    pub fn set(&mut self, field: NumericField, value: f64) {
        match field {
            NumericField::Quantity => self.quantity = Some(value),
            NumericField::UnitPrice => self.unit_price = Some(value),
            NumericField::Total => self.total = Some(value),
        }
    }

    /// Fields currently missing, in `NumericField::ALL` order
    pub fn missing(&self) -> Vec<NumericField> {
        NumericField::ALL
            .into_iter()
            .filter(|field| self.get(*field).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.quantity.is_some() && self.unit_price.is_some() && self.total.is_some()
    }

    /// Signed residual `total - quantity * unit_price` for a complete triple
    pub fn residual(&self) -> Option<f64> {
        Some(self.total? - self.quantity? * self.unit_price?)
    }

    /// Read the triple of every row of `df`
    pub fn extract(df: &DataFrame, schema: &SchemaConfig) -> Result<Vec<Self>> {
        let quantity = df.column(&schema.quantity)?.f64()?.clone();
        let unit_price = df.column(&schema.unit_price)?.f64()?.clone();
        let total = df.column(&schema.total)?.f64()?.clone();

        Ok(quantity
            .into_iter()
            .zip(unit_price.into_iter())
            .zip(total.into_iter())
            .map(|((q, p), t)| Self::new(q, p, t))
            .collect())
    }

    /// Replace the three numeric columns of `df` with `triples`
    pub fn write_back(df: &mut DataFrame, schema: &SchemaConfig, triples: &[Self]) -> Result<()> {
        for field in NumericField::ALL {
            let values: Vec<Option<f64>> = triples.iter().map(|t| t.get(field)).collect();
            df.with_column(Series::new(field.column(schema).into(), values))?;
        }
        Ok(())
    }
}
