use crate::history::HistoryTable;
use crate::model_store::{self, ModelFileError};
use crate::regression;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTarget {
    pub target: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainReport {
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub removed: usize,
    pub trained: Vec<String>,
    pub skipped: Vec<SkippedTarget>,
}

/// Full retrain: rows dated `today` or later are dropped, every previous
/// model file is deleted, and one model per column is written.
pub async fn train_all(
    mut history: HistoryTable,
    today: NaiveDate,
    model_dir: &Path,
) -> Result<TrainReport, ModelFileError> {
    history.retain_before(today);
    fs::create_dir_all(model_dir).await?;

    let mut report = TrainReport {
        rows: history.len(),
        first_date: history.first_date(),
        last_date: history.last_date(),
        ..TrainReport::default()
    };

    info!("training base models on {} rows", report.rows);
    info!("available columns: {}", history.columns().join(", "));
    if let (Some(first), Some(last)) = (report.first_date, report.last_date) {
        info!("training dates: {first} to {last}");
    }

    report.removed = model_store::remove_models(model_dir).await?;
    info!("removed {} stale models from {}", report.removed, model_dir.display());

    for target in history.columns() {
        match regression::fit(&history, target, &[]) {
            Ok(model) => {
                let path = model_store::save_model(model_dir, &model).await?;
                info!("trained {target} -> {}", path.display());
                report.trained.push(target.clone());
            }
            Err(err) => {
                warn!("skipped {target}: {err}");
                report.skipped.push(SkippedTarget {
                    target: target.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok(report)
}
