//! Pipeline configuration

use crate::error::{Result, SalvageError};
use serde::{Deserialize, Serialize};

/// Column names and raw-value conventions of the input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub transaction_id: String,
    pub item: String,
    pub quantity: String,
    pub unit_price: String,
    pub total: String,
    pub payment_method: String,
    pub location: String,
    pub timestamp: String,

    /// Placeholder tokens treated as missing (trimmed, case-insensitive)
    pub sentinel_tokens: Vec<String>,

    /// chrono formats tried in order; date-only formats parse to midnight
    pub timestamp_formats: Vec<String>,

    /// Fill value for a missing `item` after numeric recovery
    pub item_fill: String,
    /// Fill value for a missing `location` after numeric recovery
    pub location_fill: String,
    /// Fill value for a missing `payment_method` after numeric recovery
    pub payment_method_fill: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            transaction_id: "transaction_id".to_string(),
            item: "item".to_string(),
            quantity: "quantity".to_string(),
            unit_price: "unit_price".to_string(),
            total: "total".to_string(),
            payment_method: "payment_method".to_string(),
            location: "location".to_string(),
            timestamp: "transaction_timestamp".to_string(),
            sentinel_tokens: vec![
                "ERROR".to_string(),
                "UNKNOWN".to_string(),
                String::new(),
            ],
            timestamp_formats: vec![
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%Y-%m-%d %H:%M".to_string(),
                "%Y-%m-%d".to_string(),
            ],
            item_fill: "Other".to_string(),
            location_fill: "Not Recorded".to_string(),
            payment_method_fill: "Not Recorded".to_string(),
        }
    }
}

impl SchemaConfig {
    /// The three columns linked by `total = quantity * unit_price`
    pub fn numeric_columns(&self) -> [&str; 3] {
        [
            self.quantity.as_str(),
            self.unit_price.as_str(),
            self.total.as_str(),
        ]
    }

    /// Categorical columns present in the raw table
    pub fn categorical_columns(&self) -> [&str; 3] {
        [
            self.item.as_str(),
            self.payment_method.as_str(),
            self.location.as_str(),
        ]
    }

    /// Every column the loader must find in the input
    pub fn required_columns(&self) -> Vec<&str> {
        vec![
            self.transaction_id.as_str(),
            self.item.as_str(),
            self.quantity.as_str(),
            self.unit_price.as_str(),
            self.total.as_str(),
            self.payment_method.as_str(),
            self.location.as_str(),
            self.timestamp.as_str(),
        ]
    }

    /// Check whether a raw value is a placeholder for missing data
    pub fn is_sentinel(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        self.sentinel_tokens
            .iter()
            .any(|token| token.trim().eq_ignore_ascii_case(trimmed))
    }
}

/// Configuration for the full recovery and preparation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input schema conventions
    pub schema: SchemaConfig,

    /// IQR multiplier for the outlier bounds on `total`
    pub outlier_iqr_factor: f64,

    /// Skewness above which the target is log-transformed
    pub skew_threshold: f64,

    /// Fraction of rows assigned to the held-out partition
    pub test_fraction: f64,

    /// Seed for the train/held-out shuffle
    pub random_state: u64,

    /// Relative tolerance for the identity check
    pub identity_tolerance: f64,

    /// Include `is_imputed` in the model feature matrix
    pub include_imputed_flag: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema: SchemaConfig::default(),
            outlier_iqr_factor: 1.5,
            skew_threshold: 0.5,
            test_fraction: 0.2,
            random_state: 42,
            identity_tolerance: 1e-6,
            include_imputed_flag: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to replace the schema
    pub fn with_schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = schema;
        self
    }

    /// Builder method to set the IQR factor
    pub fn with_outlier_factor(mut self, factor: f64) -> Self {
        self.outlier_iqr_factor = factor;
        self
    }

    /// Builder method to set the skewness threshold
    pub fn with_skew_threshold(mut self, threshold: f64) -> Self {
        self.skew_threshold = threshold;
        self
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    /// Builder method to set the split seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to set the identity tolerance
    pub fn with_identity_tolerance(mut self, tolerance: f64) -> Self {
        self.identity_tolerance = tolerance;
        self
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(SalvageError::ConfigError(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if !self.outlier_iqr_factor.is_finite() || self.outlier_iqr_factor < 0.0 {
            return Err(SalvageError::ConfigError(format!(
                "outlier_iqr_factor must be a non-negative number, got {}",
                self.outlier_iqr_factor
            )));
        }
        if !self.identity_tolerance.is_finite() || self.identity_tolerance <= 0.0 {
            return Err(SalvageError::ConfigError(format!(
                "identity_tolerance must be positive, got {}",
                self.identity_tolerance
            )));
        }
        if self.schema.timestamp_formats.is_empty() {
            return Err(SalvageError::ConfigError(
                "at least one timestamp format is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Save the configuration as pretty JSON
    pub fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a configuration from JSON; missing keys take their defaults
    pub fn load(path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.outlier_iqr_factor, 1.5);
        assert_eq!(config.skew_threshold, 0.5);
        assert_eq!(config.schema.item_fill, "Other");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PipelineConfig::new()
            .with_outlier_factor(3.0)
            .with_test_fraction(0.3)
            .with_random_state(7);

        assert_eq!(config.outlier_iqr_factor, 3.0);
        assert_eq!(config.test_fraction, 0.3);
        assert_eq!(config.random_state, 7);
    }

    #[test]
    fn test_validate_rejects_bad_fraction() {
        let config = PipelineConfig::new().with_test_fraction(1.0);
        assert!(matches!(config.validate(), Err(SalvageError::ConfigError(_))));
    }

    #[test]
    fn test_sentinel_matching() {
        let schema = SchemaConfig::default();
        assert!(schema.is_sentinel("ERROR"));
        assert!(schema.is_sentinel(" unknown "));
        assert!(schema.is_sentinel(""));
        assert!(!schema.is_sentinel("Coffee"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"test_fraction": 0.25}"#).unwrap();
        assert_eq!(config.test_fraction, 0.25);
        assert_eq!(config.schema.total, "total");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let path = path.to_str().unwrap();

        let config = PipelineConfig::new().with_random_state(99);
        config.save(path).unwrap();
        let loaded = PipelineConfig::load(path).unwrap();
        assert_eq!(loaded, config);
    }
}
