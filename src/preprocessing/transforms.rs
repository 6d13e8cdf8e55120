//! Temporal feature extraction and target transforms

use crate::error::{Result, SalvageError};
use crate::recovery::timestamp_millis;
use crate::utils::stats;
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Meteorological season of a calendar month (northern hemisphere)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Dec-Feb winter, Mar-May spring, Jun-Aug summer, Sep-Nov autumn
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
        }
    }
}

/// Integer calendar columns added by [`TemporalFeatures`]
pub const TEMPORAL_COLUMNS: [&str; 6] = ["year", "month", "day", "weekday", "hour", "is_weekend"];

/// Categorical season column added by [`TemporalFeatures`]
pub const SEASON_COLUMN: &str = "season";

/// Derives calendar features from a `Datetime(ms)` column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalFeatures {
    timestamp_column: String,
}

impl TemporalFeatures {
    pub fn new(timestamp_column: impl Into<String>) -> Self {
        Self {
            timestamp_column: timestamp_column.into(),
        }
    }

    pub fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }

    /// Append `year`, `month`, `day`, `weekday` (0 = Monday), `hour`,
    /// `is_weekend` and `season`.
    ///
    /// Rows reaching this stage always carry a timestamp; a null here is a
    /// data error.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let millis = timestamp_millis(df, &self.timestamp_column)?;
        let datetimes: Vec<NaiveDateTime> = millis
            .into_iter()
            .map(|ms| {
                ms.and_then(DateTime::from_timestamp_millis)
                    .map(|dt| dt.naive_utc())
                    .ok_or_else(|| {
                        SalvageError::DataError(format!(
                            "null or out-of-range value in '{}'",
                            self.timestamp_column
                        ))
                    })
            })
            .collect::<Result<_>>()?;

        let extract = |f: fn(&NaiveDateTime) -> i32| -> Vec<i32> { datetimes.iter().map(f).collect() };

        let columns: [(&str, Vec<i32>); 6] = [
            ("year", extract(|dt| dt.year())),
            ("month", extract(|dt| dt.month() as i32)),
            ("day", extract(|dt| dt.day() as i32)),
            ("weekday", extract(|dt| dt.weekday().num_days_from_monday() as i32)),
            ("hour", extract(|dt| dt.hour() as i32)),
            ("is_weekend", extract(|dt| (dt.weekday().num_days_from_monday() >= 5) as i32)),
        ];

        let mut result = df.clone();
        for (name, values) in columns {
            result.with_column(Series::new(name.into(), values))?;
        }

        let seasons: Vec<&str> = datetimes
            .iter()
            .map(|dt| Season::from_month(dt.month()).as_str())
            .collect();
        result.with_column(Series::new(SEASON_COLUMN.into(), seasons))?;

        Ok(result)
    }
}

/// Transform applied to the regression target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetTransform {
    /// Target used as-is
    #[default]
    Identity,
    /// `ln(1 + y)`, inverted with `exp(y) - 1`
    Log1p,
}

impl TargetTransform {
    /// Pick `Log1p` when the sample skewness exceeds `threshold`.
    ///
    /// Returns the chosen transform and the measured skewness.
    pub fn select(values: &[f64], threshold: f64) -> (Self, f64) {
        let skew = stats::skewness(values);
        let transform = if skew > threshold {
            TargetTransform::Log1p
        } else {
            TargetTransform::Identity
        };
        (transform, skew)
    }

    pub fn apply(&self, value: f64) -> f64 {
        match self {
            TargetTransform::Identity => value,
            TargetTransform::Log1p => value.ln_1p(),
        }
    }

    pub fn inverse(&self, value: f64) -> f64 {
        match self {
            TargetTransform::Identity => value,
            TargetTransform::Log1p => value.exp_m1(),
        }
    }

    /// Write the transformed `source` column into `target`
    pub fn apply_column(&self, df: &DataFrame, source: &str, target: &str) -> Result<DataFrame> {
        let transformed: Float64Chunked = df
            .column(source)
            .map_err(|_| SalvageError::ColumnNotFound(source.to_string()))?
            .f64()?
            .into_iter()
            .map(|opt| opt.map(|v| self.apply(v)))
            .collect();

        let mut result = df.clone();
        result.with_column(transformed.with_name(target.into()).into_series())?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamped_df() -> DataFrame {
        // 2023-07-15 14:30 (Saturday), 2023-12-04 09:00 (Monday)
        let millis = vec![1_689_431_400_000i64, 1_701_680_400_000i64];
        let ts = Series::new("transaction_timestamp".into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        DataFrame::new(vec![ts.into()]).unwrap()
    }

    #[test]
    fn test_temporal_features() {
        let features = TemporalFeatures::new("transaction_timestamp");
        let df = features.transform(&stamped_df()).unwrap();

        let get = |name: &str| -> Vec<Option<i32>> {
            df.column(name).unwrap().i32().unwrap().into_iter().collect()
        };
        assert_eq!(get("year"), vec![Some(2023), Some(2023)]);
        assert_eq!(get("month"), vec![Some(7), Some(12)]);
        assert_eq!(get("day"), vec![Some(15), Some(4)]);
        assert_eq!(get("weekday"), vec![Some(5), Some(0)]);
        assert_eq!(get("hour"), vec![Some(14), Some(9)]);
        assert_eq!(get("is_weekend"), vec![Some(1), Some(0)]);

        let seasons = df.column(SEASON_COLUMN).unwrap().str().unwrap().clone();
        assert_eq!(seasons.get(0), Some("Summer"));
        assert_eq!(seasons.get(1), Some("Winter"));
    }

    #[test]
    fn test_season_boundaries() {
        assert_eq!(Season::from_month(2), Season::Winter);
        assert_eq!(Season::from_month(3), Season::Spring);
        assert_eq!(Season::from_month(8), Season::Summer);
        assert_eq!(Season::from_month(11), Season::Autumn);
        assert_eq!(Season::from_month(12), Season::Winter);
    }

    #[test]
    fn test_skewed_target_gets_log1p() {
        let skewed = [1.0, 1.0, 2.0, 2.0, 3.0, 50.0];
        let (transform, skew) = TargetTransform::select(&skewed, 0.5);
        assert!(skew > 0.5);
        assert_eq!(transform, TargetTransform::Log1p);

        let symmetric = [1.0, 2.0, 3.0, 4.0, 5.0];
        let (transform, _) = TargetTransform::select(&symmetric, 0.5);
        assert_eq!(transform, TargetTransform::Identity);
    }

    #[test]
    fn test_log1p_inverts() {
        let transform = TargetTransform::Log1p;
        let y = transform.apply(9.0);
        assert!((y - 10f64.ln()).abs() < 1e-12);
        assert!((transform.inverse(y) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_apply_column() {
        let df = df!("total" => &[0.0, 3.0]).unwrap();
        let out = TargetTransform::Log1p.apply_column(&df, "total", "target").unwrap();
        let target = out.column("target").unwrap().f64().unwrap().clone();
        assert_eq!(target.get(0), Some(0.0));
        assert!((target.get(1).unwrap() - 4f64.ln()).abs() < 1e-12);
    }
}
