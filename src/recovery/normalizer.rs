//! Schema normalization: raw strings to typed, null-marked columns

use super::report::RecoveryReport;
use crate::config::SchemaConfig;
use crate::error::Result;
use crate::utils::require_columns;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// Coerces raw transaction fields to typed columns.
///
/// Sentinel tokens become nulls, numeric fields become `Float64` and the
/// timestamp becomes `Datetime(ms)`. A value that fails to parse, or parses
/// outside its field's range, is marked missing and counted; it never aborts
/// the record.
#[derive(Debug, Clone)]
pub struct SchemaNormalizer {
    schema: SchemaConfig,
}

impl SchemaNormalizer {
    pub fn new(schema: SchemaConfig) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SchemaConfig {
        &self.schema
    }

    /// Produce the typed working table with columns in schema order
    pub fn normalize(&self, raw: &DataFrame, report: &mut RecoveryReport) -> Result<DataFrame> {
        require_columns(raw, &self.schema.required_columns())?;

        let mut columns: Vec<Column> = Vec::with_capacity(8);

        columns.push(self.text_column(raw, &self.schema.transaction_id, report)?);
        columns.push(self.text_column(raw, &self.schema.item, report)?);
        for name in self.schema.numeric_columns() {
            columns.push(self.numeric_column(raw, name, report)?);
        }
        columns.push(self.text_column(raw, &self.schema.payment_method, report)?);
        columns.push(self.text_column(raw, &self.schema.location, report)?);
        columns.push(self.timestamp_column(raw, report)?);

        let df = DataFrame::new(columns)?;
        tracing::debug!(rows = df.height(), "Normalized raw table");
        Ok(df)
    }

    /// Fill missing categoricals with their configured placeholders.
    ///
    /// Runs after numeric recovery so that a missing `item` still routes its
    /// record to the global medians instead of a fabricated group.
    pub fn fill_categoricals(&self, df: &DataFrame, report: &mut RecoveryReport) -> Result<DataFrame> {
        let fills = [
            (&self.schema.item, &self.schema.item_fill),
            (&self.schema.location, &self.schema.location_fill),
            (&self.schema.payment_method, &self.schema.payment_method_fill),
        ];

        let mut result = df.clone();
        for (name, fill) in fills {
            let ca = df.column(name)?.str()?.clone();
            let missing = ca.null_count();
            if missing == 0 {
                continue;
            }

            let filled: StringChunked = ca
                .into_iter()
                .map(|opt| Some(opt.unwrap_or(fill.as_str()).to_string()))
                .collect();
            result.with_column(filled.with_name(name.as_str().into()).into_series())?;

            report.record_categorical_fill(name, missing);
        }

        Ok(result)
    }

    /// String values with sentinels replaced by null
    fn raw_strings(&self, raw: &DataFrame, name: &str, report: &mut RecoveryReport) -> Result<Vec<Option<String>>> {
        let casted = raw.column(name)?.cast(&DataType::String)?;
        let ca = casted.str()?;

        let mut sentinels = 0usize;
        let values = ca
            .into_iter()
            .map(|opt| match opt {
                Some(v) if self.schema.is_sentinel(v) => {
                    sentinels += 1;
                    None
                }
                Some(v) => Some(v.trim().to_string()),
                None => None,
            })
            .collect();

        report.record_sentinels(name, sentinels);
        Ok(values)
    }

    fn text_column(&self, raw: &DataFrame, name: &str, report: &mut RecoveryReport) -> Result<Column> {
        let values = self.raw_strings(raw, name, report)?;
        Ok(Column::new(name.into(), values))
    }

    fn numeric_column(&self, raw: &DataFrame, name: &str, report: &mut RecoveryReport) -> Result<Column> {
        let values = self.raw_strings(raw, name, report)?;

        let mut failures = 0usize;
        let mut out_of_range = 0usize;
        let parsed: Vec<Option<f64>> = values
            .iter()
            .map(|opt| {
                let number = parse_numeric(opt.as_deref()?);
                match number {
                    None => failures += 1,
                    Some(v) if !in_domain(v) => {
                        out_of_range += 1;
                        return None;
                    }
                    Some(_) => {}
                }
                number
            })
            .collect();

        if failures > 0 {
            tracing::debug!(column = name, failures, "Numeric coercion failures marked missing");
        }
        if out_of_range > 0 {
            tracing::warn!(column = name, out_of_range, "Negative values marked missing");
        }
        report.record_coercion_failures(name, failures);
        report.record_domain_violations(name, out_of_range);
        Ok(Column::new(name.into(), parsed))
    }

    fn timestamp_column(&self, raw: &DataFrame, report: &mut RecoveryReport) -> Result<Column> {
        let name = self.schema.timestamp.as_str();
        let values = self.raw_strings(raw, name, report)?;

        let mut failures = 0usize;
        let millis: Vec<Option<i64>> = values
            .iter()
            .map(|opt| {
                opt.as_deref().and_then(|v| {
                    let ts = parse_timestamp(v, &self.schema.timestamp_formats);
                    if ts.is_none() {
                        failures += 1;
                    }
                    ts.map(|dt| dt.and_utc().timestamp_millis())
                })
            })
            .collect();

        if failures > 0 {
            tracing::debug!(column = name, failures, "Timestamp coercion failures marked missing");
        }
        report.record_coercion_failures(name, failures);

        let column = Series::new(name.into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        Ok(column.into())
    }
}

/// Parse a numeric field; non-finite results count as unparseable
pub fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Quantities, unit prices and totals are all non-negative.
///
/// A zero unit price stays observed: the solver needs to see it to defer
/// the row instead of dividing by it.
fn in_domain(value: f64) -> bool {
    value >= 0.0
}

/// Parse a timestamp with the first matching format.
///
/// Formats without a time component parse to midnight.
pub fn parse_timestamp(raw: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    formats.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(raw, format).ok().or_else(|| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
    })
}

/// Read a `Datetime(ms)` column back as epoch milliseconds
pub fn timestamp_millis(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let casted = df.column(name)?.cast(&DataType::Int64)?;
    Ok(casted.i64()?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_df() -> DataFrame {
        df!(
            "transaction_id" => &["T1", "T2", "T3", "T4"],
            "item" => &["Coffee", "UNKNOWN", "Tea", "ERROR"],
            "quantity" => &["2", "ERROR", "abc", "1"],
            "unit_price" => &["3.0", "1.5", "", "2"],
            "total" => &["6.0", "3.0", "4", "inf"],
            "payment_method" => &["Cash", "Card", "UNKNOWN", "Cash"],
            "location" => &["In-store", "", "Takeaway", "In-store"],
            "transaction_timestamp" => &["2023-09-08", "2023-05-16 14:30:00", "not a date", "ERROR"],
        )
        .unwrap()
    }

    #[test]
    fn test_sentinels_become_null() {
        let normalizer = SchemaNormalizer::new(SchemaConfig::default());
        let mut report = RecoveryReport::default();
        let df = normalizer.normalize(&raw_df(), &mut report).unwrap();

        let item = df.column("item").unwrap().str().unwrap().clone();
        assert_eq!(item.get(0), Some("Coffee"));
        assert_eq!(item.get(1), None);
        assert_eq!(item.get(3), None);

        let location = df.column("location").unwrap().str().unwrap().clone();
        assert_eq!(location.get(1), None);
    }

    #[test]
    fn test_numeric_coercion() {
        let normalizer = SchemaNormalizer::new(SchemaConfig::default());
        let mut report = RecoveryReport::default();
        let df = normalizer.normalize(&raw_df(), &mut report).unwrap();

        let quantity = df.column("quantity").unwrap().f64().unwrap().clone();
        assert_eq!(quantity.get(0), Some(2.0));
        assert_eq!(quantity.get(1), None);
        assert_eq!(quantity.get(2), None);

        let total = df.column("total").unwrap().f64().unwrap().clone();
        assert_eq!(total.get(3), None);

        // "abc" and "inf" fail coercion; "ERROR" and "" are sentinels
        assert_eq!(report.coercion_failures.get("quantity"), Some(&1));
        assert_eq!(report.coercion_failures.get("total"), Some(&1));
        assert_eq!(report.sentinel_values.get("quantity"), Some(&1));
    }

    #[test]
    fn test_negative_values_marked_missing() {
        let raw = df!(
            "transaction_id" => &["T1", "T2", "T3"],
            "item" => &["Coffee", "Coffee", "Tea"],
            "quantity" => &["-3", "2", "0"],
            "unit_price" => &["1", "0", "-1.5"],
            "total" => &["-3", "0", "0"],
            "payment_method" => &["Cash", "Cash", "Card"],
            "location" => &["In-store", "In-store", "Takeaway"],
            "transaction_timestamp" => &["2023-01-02", "2023-01-03", "2023-01-04"],
        )
        .unwrap();

        let normalizer = SchemaNormalizer::new(SchemaConfig::default());
        let mut report = RecoveryReport::default();
        let df = normalizer.normalize(&raw, &mut report).unwrap();

        let quantity = df.column("quantity").unwrap().f64().unwrap().clone();
        assert_eq!(quantity.get(0), None);
        assert_eq!(quantity.get(2), Some(0.0));

        // Zero prices survive for the zero-divisor guard
        let unit_price = df.column("unit_price").unwrap().f64().unwrap().clone();
        assert_eq!(unit_price.get(1), Some(0.0));
        assert_eq!(unit_price.get(2), None);

        let total = df.column("total").unwrap().f64().unwrap().clone();
        assert_eq!(total.get(0), None);

        assert_eq!(report.domain_violations.get("quantity"), Some(&1));
        assert_eq!(report.domain_violations.get("unit_price"), Some(&1));
        assert_eq!(report.domain_violations.get("total"), Some(&1));
        assert_eq!(report.total_domain_violations(), 3);
        assert_eq!(report.total_coercion_failures(), 0);
    }

    #[test]
    fn test_timestamp_coercion() {
        let normalizer = SchemaNormalizer::new(SchemaConfig::default());
        let mut report = RecoveryReport::default();
        let df = normalizer.normalize(&raw_df(), &mut report).unwrap();

        assert!(matches!(
            df.column("transaction_timestamp").unwrap().dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, _)
        ));

        let millis = timestamp_millis(&df, "transaction_timestamp").unwrap();
        assert!(millis[0].is_some());
        assert!(millis[1].is_some());
        assert!(millis[2].is_none());
        assert!(millis[3].is_none());
        assert_eq!(report.coercion_failures.get("transaction_timestamp"), Some(&1));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let formats = SchemaConfig::default().timestamp_formats;
        let dt = parse_timestamp("2023-05-16 14:30:00", &formats).unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "14:30");

        let date_only = parse_timestamp("2023-09-08", &formats).unwrap();
        assert_eq!(date_only.format("%Y-%m-%d %H:%M:%S").to_string(), "2023-09-08 00:00:00");

        assert!(parse_timestamp("08/09/2023", &formats).is_none());
    }

    #[test]
    fn test_fill_categoricals() {
        let normalizer = SchemaNormalizer::new(SchemaConfig::default());
        let mut report = RecoveryReport::default();
        let df = normalizer.normalize(&raw_df(), &mut report).unwrap();
        let filled = normalizer.fill_categoricals(&df, &mut report).unwrap();

        let item = filled.column("item").unwrap().str().unwrap().clone();
        assert_eq!(item.get(1), Some("Other"));
        let payment = filled.column("payment_method").unwrap().str().unwrap().clone();
        assert_eq!(payment.get(2), Some("Not Recorded"));
        let location = filled.column("location").unwrap().str().unwrap().clone();
        assert_eq!(location.get(1), Some("Not Recorded"));

        assert_eq!(report.categorical_fills.get("item"), Some(&2));
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let normalizer = SchemaNormalizer::new(SchemaConfig::default());
        let mut report = RecoveryReport::default();
        let raw = raw_df().drop("total").unwrap();
        assert!(normalizer.normalize(&raw, &mut report).is_err());
    }
}
