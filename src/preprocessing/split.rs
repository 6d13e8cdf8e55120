//! Seeded train / held-out partitioning
//!
//! The two partitions are distinct types so that anything fitted from data
//! can demand a [`TrainPartition`] and never see held-out rows.

use crate::error::{Result, SalvageError};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Rows available for fitting
#[derive(Debug, Clone)]
pub struct TrainPartition(DataFrame);

/// Rows reserved for evaluation
#[derive(Debug, Clone)]
pub struct HoldoutPartition(DataFrame);

impl TrainPartition {
    #[cfg(test)]
    pub(crate) fn new(df: DataFrame) -> Self {
        Self(df)
    }

    pub fn data(&self) -> &DataFrame {
        &self.0
    }

    pub fn height(&self) -> usize {
        self.0.height()
    }
}

impl HoldoutPartition {
    pub fn data(&self) -> &DataFrame {
        &self.0
    }

    pub fn height(&self) -> usize {
        self.0.height()
    }
}

/// Shuffle-split with a fixed seed.
///
/// The held-out size is `n * test_fraction` rounded to the nearest row and
/// clamped so both sides keep at least one row. Rows keep their original
/// relative order within each partition.
#[derive(Debug, Clone, Copy)]
pub struct TrainTestSplit {
    test_fraction: f64,
    seed: u64,
}

impl TrainTestSplit {
    pub fn new(test_fraction: f64, seed: u64) -> Self {
        Self { test_fraction, seed }
    }

    /// Boolean mask of held-out rows for a table of `n` rows
    pub fn holdout_mask(&self, n: usize) -> Result<Vec<bool>> {
        if n < 2 {
            return Err(SalvageError::EmptyPartition(format!(
                "need at least 2 rows to split, got {}",
                n
            )));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(SalvageError::ConfigError(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }

        let n_test = ((n as f64 * self.test_fraction).round() as usize).clamp(1, n - 1);

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let mut mask = vec![false; n];
        for &idx in &indices[..n_test] {
            mask[idx] = true;
        }
        Ok(mask)
    }

    pub fn split(&self, df: &DataFrame) -> Result<(TrainPartition, HoldoutPartition)> {
        let mask = self.holdout_mask(df.height())?;
        let holdout = BooleanChunked::from_slice("holdout".into(), &mask);
        let train = !&holdout;

        let train_df = df.filter(&train)?;
        let holdout_df = df.filter(&holdout)?;

        tracing::debug!(
            train = train_df.height(),
            holdout = holdout_df.height(),
            seed = self.seed,
            "Partitioned rows"
        );
        Ok((TrainPartition(train_df), HoldoutPartition(holdout_df)))
    }
}
