//! Integration test: raw CSV on disk through every stage

use salvage::config::PipelineConfig;
use salvage::error::SalvageError;
use salvage::pipeline::SalvagePipeline;
use salvage::preprocessing::FittedArtifacts;
use salvage::recovery::IS_IMPUTED_COLUMN;
use salvage::utils::{DataLoader, DataSaver};
use polars::prelude::ChunkAgg;
use std::fmt::Write as _;
use tempfile::TempDir;

const HEADER: &str = "transaction_id,item,quantity,unit_price,total,payment_method,location,transaction_timestamp";

/// Forty rows with every corruption pattern plus one extreme total
fn write_raw_csv(dir: &TempDir) -> String {
    let items = [("Coffee", 2.0), ("Tea", 1.5), ("Cake", 3.0), ("Sandwich", 4.0)];
    let mut csv = String::from(HEADER);
    csv.push('\n');

    for i in 0..40usize {
        let (item, price) = items[i % items.len()];
        let quantity = (i % 5 + 1) as f64;
        let total = quantity * price;
        let day = i % 28 + 1;
        let month = i % 12 + 1;

        let mut fields = [
            format!("TXN_{:04}", i),
            item.to_string(),
            format!("{}", quantity),
            format!("{}", price),
            format!("{}", total),
            if i % 2 == 0 { "Cash".to_string() } else { "Credit Card".to_string() },
            if i % 3 == 0 { "Takeaway".to_string() } else { "In-store".to_string() },
            format!("2023-{:02}-{:02} {:02}:15:00", month, day, 8 + i % 10),
        ];

        match i {
            5 => fields[4] = String::new(),
            9 => fields[2] = "ERROR".to_string(),
            13 => fields[3] = "UNKNOWN".to_string(),
            17 => {
                fields[2] = String::new();
                fields[3] = String::new();
            }
            21 => {
                fields[2] = String::new();
                fields[3] = "ERROR".to_string();
                fields[4] = String::new();
            }
            25 => fields[7] = String::new(),
            29 => fields[1] = "UNKNOWN".to_string(),
            33 => {
                fields[2] = "100".to_string();
                fields[4] = format!("{}", 100.0 * price);
            }
            37 => {
                fields[3] = "0".to_string();
                fields[4] = String::new();
            }
            _ => {}
        }

        let _ = writeln!(csv, "{}", fields.join(","));
    }

    let path = dir.path().join("raw.csv");
    std::fs::write(&path, csv).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_full_pipeline_from_csv() {
    let dir = TempDir::new().unwrap();
    let raw = DataLoader::new().load_csv(&write_raw_csv(&dir)).unwrap();
    assert_eq!(raw.height(), 40);

    let pipeline = SalvagePipeline::new(PipelineConfig::default()).unwrap();
    let output = pipeline.run(&raw).unwrap();

    let report = &output.recovery.report;
    assert_eq!(report.rows_in, 40);
    assert_eq!(report.dropped_missing_timestamp, 1);
    assert_eq!(report.total_solved(), 3);
    assert_eq!(report.zero_divisor_deferrals, 1);
    assert_eq!(report.imputed_rows, 3);
    assert!(output.validation.identity_holds());

    // Row 33 carries a total far above the fences
    assert!(output.outliers.removed >= 1);
    let max_total = output.cleaned.column("total").unwrap().f64().unwrap().max().unwrap();
    assert!(max_total <= output.outliers.bounds.upper);

    let prepared = &output.prepared;
    assert_eq!(
        prepared.train.height() + prepared.holdout.height(),
        output.cleaned.height()
    );
    let x = prepared.train_features().unwrap();
    let y = prepared.train_target().unwrap();
    assert_eq!(x.nrows(), y.len());
    assert!(x.iter().all(|v| v.is_finite()));
    assert!(prepared.feature_columns().iter().any(|c| c == IS_IMPUTED_COLUMN));
}

#[test]
fn test_pipeline_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let raw = DataLoader::new().load_csv(&write_raw_csv(&dir)).unwrap();
    let pipeline = SalvagePipeline::new(PipelineConfig::default()).unwrap();

    let a = pipeline.run(&raw).unwrap();
    let b = pipeline.run(&raw).unwrap();
    assert!(a.prepared.train.equals_missing(&b.prepared.train));
    assert!(a.prepared.holdout.equals_missing(&b.prepared.holdout));
    assert_eq!(a.prepared.artifacts, b.prepared.artifacts);
}

#[test]
fn test_outputs_round_trip_through_disk() {
    let dir = TempDir::new().unwrap();
    let raw = DataLoader::new().load_csv(&write_raw_csv(&dir)).unwrap();
    let output = SalvagePipeline::new(PipelineConfig::default()).unwrap().run(&raw).unwrap();

    let train_path = dir.path().join("train.csv");
    let artifacts_path = dir.path().join("artifacts.json");
    DataSaver::save_csv(&mut output.prepared.train.clone(), train_path.to_str().unwrap()).unwrap();
    output.prepared.artifacts.save(artifacts_path.to_str().unwrap()).unwrap();

    let reloaded = DataLoader::new()
        .with_schema_inference()
        .load_csv(train_path.to_str().unwrap())
        .unwrap();
    assert_eq!(reloaded.height(), output.prepared.train.height());

    let artifacts = FittedArtifacts::load(artifacts_path.to_str().unwrap()).unwrap();
    assert_eq!(artifacts.feature_columns, output.prepared.artifacts.feature_columns);

    // Reloaded artifacts replay on recovered rows
    let replayed = artifacts.transform(&output.cleaned).unwrap();
    let x = artifacts.feature_matrix(&replayed).unwrap();
    assert_eq!(x.nrows(), output.cleaned.height());
}

#[test]
fn test_identity_violation_stops_the_run() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.csv");
    let csv = format!(
        "{}\nA,Coffee,2,2,4,Cash,In-store,2023-01-02\nB,Coffee,2,2,5,Cash,In-store,2023-01-03\nC,Tea,1,1,1,Cash,In-store,2023-01-04\n",
        HEADER
    );
    std::fs::write(&path, csv).unwrap();
    let raw = DataLoader::new().load_csv(path.to_str().unwrap()).unwrap();

    let result = SalvagePipeline::new(PipelineConfig::default()).unwrap().run(&raw);
    assert!(matches!(
        result,
        Err(SalvageError::IdentityViolation { violations: 1, .. })
    ));
}
