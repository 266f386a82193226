//! Ordinary least squares fit of one parameter against the others.
//!
//! Features and target are centred before the solve, so the intercept is not
//! part of the least-squares system and rank-deficient designs resolve to the
//! minimum-norm coefficient vector.

use crate::history::HistoryTable;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("no history column for '{0}'")]
    MissingColumn(String),
    #[error("history has no rows")]
    NoRows,
    #[error("no features left to predict '{0}'")]
    NoFeatures(String),
    #[error("least squares solve failed for '{target}': {reason}")]
    Degenerate { target: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub target: String,
    pub features: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    /// Evaluates the model on one row. Features that are absent or blank
    /// count as 0.0.
    pub fn predict(&self, inputs: &BTreeMap<String, Option<f64>>) -> f64 {
        self.features
            .iter()
            .zip(&self.coefficients)
            .map(|(feature, coef)| coef * inputs.get(feature).copied().flatten().unwrap_or(0.0))
            .sum::<f64>()
            + self.intercept
    }

    pub fn is_consistent(&self) -> bool {
        self.features.len() == self.coefficients.len()
            && self.intercept.is_finite()
            && self.coefficients.iter().all(|coef| coef.is_finite())
    }
}

/// Fits `target` on every other column of `history` except those in
/// `exclude`.
pub fn fit(history: &HistoryTable, target: &str, exclude: &[String]) -> Result<LinearModel, FitError> {
    let target_index = history
        .column_index(target)
        .ok_or_else(|| FitError::MissingColumn(target.to_string()))?;
    if history.is_empty() {
        return Err(FitError::NoRows);
    }

    let features: Vec<(usize, &String)> = history
        .columns()
        .iter()
        .enumerate()
        .filter(|(index, name)| *index != target_index && !exclude.contains(*name))
        .collect();
    if features.is_empty() {
        return Err(FitError::NoFeatures(target.to_string()));
    }

    let rows = history.len();
    let n = rows as f64;
    let y_mean = (0..rows).map(|row| history.value(row, target_index)).sum::<f64>() / n;
    let x_means: Vec<f64> = features
        .iter()
        .map(|(column, _)| (0..rows).map(|row| history.value(row, *column)).sum::<f64>() / n)
        .collect();
    if !y_mean.is_finite() || !x_means.iter().all(|mean| mean.is_finite()) {
        return Err(FitError::Degenerate {
            target: target.to_string(),
            reason: "history values overflow".to_string(),
        });
    }

    let x = DMatrix::from_fn(rows, features.len(), |row, col| {
        history.value(row, features[col].0) - x_means[col]
    });
    let y = DVector::from_fn(rows, |row, _| history.value(row, target_index) - y_mean);

    let svd = x.svd(true, true);
    let largest = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let eps = largest * f64::EPSILON * rows.max(features.len()) as f64;
    let beta = svd.solve(&y, eps).map_err(|reason| FitError::Degenerate {
        target: target.to_string(),
        reason: reason.to_string(),
    })?;
    if !beta.iter().all(|value| value.is_finite()) {
        return Err(FitError::Degenerate {
            target: target.to_string(),
            reason: "non-finite coefficients".to_string(),
        });
    }

    let coefficients: Vec<f64> = beta.iter().copied().collect();
    let intercept = y_mean
        - x_means
            .iter()
            .zip(&coefficients)
            .map(|(mean, coef)| mean * coef)
            .sum::<f64>();

    let model = LinearModel {
        target: target.to_string(),
        features: features.into_iter().map(|(_, name)| name.clone()).collect(),
        coefficients,
        intercept,
    };
    if !model.is_consistent() {
        return Err(FitError::Degenerate {
            target: target.to_string(),
            reason: "non-finite intercept".to_string(),
        });
    }
    Ok(model)
}
