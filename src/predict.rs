use crate::history::HistoryTable;
use crate::model_store;
use crate::models::{ColorHint, Prediction};
use crate::regression;
use serde_json::Value;
use std::{collections::BTreeMap, path::Path};
use tracing::{error, warn};

/// Today's input per parameter key. `None` marks a blank field.
pub type TodayValues = BTreeMap<String, Option<f64>>;

/// Accepts numbers, numeric strings, and blanks (`null`, `""`, `"None"`).
pub fn coerce_value(raw: &Value) -> Result<Option<f64>, String> {
    let value = match raw {
        Value::Null => return Ok(None),
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| format!("value {number} is not representable"))?,
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() || text == "None" || text == "null" {
                return Ok(None);
            }
            text.replace(',', ".")
                .parse::<f64>()
                .map_err(|_| format!("value '{text}' is not a number"))?
        }
        other => return Err(format!("value {other} is not a number")),
    };
    if value.is_finite() {
        Ok(Some(value))
    } else {
        Err("value must be finite".to_string())
    }
}

pub fn color_hint(diff: f64) -> ColorHint {
    let diff = diff.abs();
    if diff < 1.0 {
        ColorHint::Green
    } else if diff <= 2.0 {
        ColorHint::Yellow
    } else {
        ColorHint::Red
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Fits a fresh model per target and evaluates it on `today`. Targets that
/// cannot be fit are logged and left out.
pub fn predict_live(history: &HistoryTable, today: &TodayValues, exclude_entered: bool) -> BTreeMap<String, f64> {
    let entered: Vec<String> = if exclude_entered {
        today
            .iter()
            .filter(|(_, value)| value.is_some())
            .map(|(key, _)| key.clone())
            .collect()
    } else {
        Vec::new()
    };

    let mut predictions = BTreeMap::new();
    for target in today.keys() {
        match regression::fit(history, target, &entered) {
            Ok(model) => insert_finite(&mut predictions, target, model.predict(today), "live"),
            Err(err) => warn!("prediction skipped for {target} (live mode): {err}"),
        }
    }
    predictions
}

/// Evaluates the previously trained model of each target on `today`.
pub async fn predict_base(model_dir: &Path, today: &TodayValues) -> BTreeMap<String, f64> {
    let mut predictions = BTreeMap::new();
    for target in today.keys() {
        match model_store::load_model(model_dir, target).await {
            Ok(Some(model)) => insert_finite(&mut predictions, target, model.predict(today), "base"),
            Ok(None) => warn!("base model for {target} not found in {}", model_dir.display()),
            Err(err) => error!("prediction failed for {target} (base mode): {err}"),
        }
    }
    predictions
}

fn insert_finite(predictions: &mut BTreeMap<String, f64>, target: &str, value: f64, mode: &str) {
    if value.is_finite() {
        predictions.insert(target.to_string(), round_to(value, 2));
    } else {
        warn!("prediction skipped for {target} ({mode} mode): non-finite value");
    }
}

pub fn annotate(raw: &BTreeMap<String, f64>, today: &TodayValues) -> BTreeMap<String, Prediction> {
    raw.iter()
        .map(|(key, predicted)| {
            let entered = today.get(key).copied().flatten();
            let diff = predicted - entered.unwrap_or(0.0);
            let prediction = Prediction {
                value: round_to(*predicted, 1),
                delta: entered.map(|_| round_to(diff, 1)),
                color: color_hint(diff),
            };
            (key.clone(), prediction)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_store::save_model;
    use chrono::NaiveDate;
    use serde_json::json;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn doubling_history() -> HistoryTable {
        HistoryTable::from_records(
            [day(1), day(2)],
            [
                (day(1), "a".to_string(), 1.0),
                (day(1), "b".to_string(), 2.0),
                (day(2), "a".to_string(), 2.0),
                (day(2), "b".to_string(), 4.0),
            ],
        )
    }

    fn today(values: &[(&str, Option<f64>)]) -> TodayValues {
        values
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect()
    }

    #[test]
    fn coerces_blank_and_numeric_inputs() {
        assert_eq!(coerce_value(&json!(null)), Ok(None));
        assert_eq!(coerce_value(&json!("")), Ok(None));
        assert_eq!(coerce_value(&json!("None")), Ok(None));
        assert_eq!(coerce_value(&json!("3")), Ok(Some(3.0)));
        assert_eq!(coerce_value(&json!("2,5")), Ok(Some(2.5)));
        assert_eq!(coerce_value(&json!(4)), Ok(Some(4.0)));
        assert!(coerce_value(&json!("lots")).is_err());
        assert!(coerce_value(&json!([1])).is_err());
    }

    #[test]
    fn color_buckets() {
        assert_eq!(color_hint(0.99), ColorHint::Green);
        assert_eq!(color_hint(-0.5), ColorHint::Green);
        assert_eq!(color_hint(1.0), ColorHint::Yellow);
        assert_eq!(color_hint(-2.0), ColorHint::Yellow);
        assert_eq!(color_hint(2.01), ColorHint::Red);
    }

    #[test]
    fn live_prediction_follows_history() {
        let history = doubling_history();
        let predictions = predict_live(&history, &today(&[("a", Some(3.0)), ("b", None)]), false);
        assert!((predictions["b"] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn targets_missing_from_history_are_skipped() {
        let history = doubling_history();
        let predictions = predict_live(
            &history,
            &today(&[("a", Some(3.0)), ("b", None), ("new", None)]),
            false,
        );
        assert!(!predictions.contains_key("new"));
        assert!(predictions.contains_key("b"));
    }

    #[test]
    fn leakage_guard_drops_entered_features() {
        let history = doubling_history();
        let input = today(&[("a", Some(3.0)), ("b", Some(1.0))]);

        let guarded = predict_live(&history, &input, true);
        assert!(guarded.is_empty());

        let open = predict_live(&history, &input, false);
        assert_eq!(open.len(), 2);
    }

    #[test]
    fn overflowing_history_is_left_out() {
        let history = HistoryTable::from_records(
            [day(1), day(2)],
            [
                (day(1), "a".to_string(), 1e308),
                (day(1), "b".to_string(), 1.0),
                (day(2), "a".to_string(), 1e308),
                (day(2), "b".to_string(), 2.0),
            ],
        );
        let predictions = predict_live(&history, &today(&[("a", Some(1.0)), ("b", None)]), false);
        assert!(!predictions.contains_key("b"));
        assert!(predictions.values().all(|value| value.is_finite()));
    }

    #[tokio::test]
    async fn base_model_overflowing_on_input_is_left_out() {
        let dir = tempfile::tempdir().unwrap();
        let model = regression::LinearModel {
            target: "b".to_string(),
            features: vec!["a".to_string()],
            coefficients: vec![1e300],
            intercept: 0.0,
        };
        save_model(dir.path(), &model).await.unwrap();

        let base = predict_base(dir.path(), &today(&[("a", Some(1e300)), ("b", None)])).await;
        assert!(base.is_empty());
    }

    #[test]
    fn live_predictions_are_deterministic() {
        let history = doubling_history();
        let input = today(&[("a", Some(1.5)), ("b", Some(2.0))]);
        assert_eq!(
            predict_live(&history, &input, false),
            predict_live(&history, &input, false)
        );
    }

    #[tokio::test]
    async fn base_prediction_matches_live_for_same_data() {
        let dir = tempfile::tempdir().unwrap();
        let history = doubling_history();
        for target in history.columns() {
            let model = regression::fit(&history, target, &[]).unwrap();
            save_model(dir.path(), &model).await.unwrap();
        }

        let input = today(&[("a", Some(3.0)), ("b", None)]);
        let live = predict_live(&history, &input, false);
        let base = predict_base(dir.path(), &input).await;
        assert_eq!(live.len(), base.len());
        for (key, value) in &live {
            assert!((value - base[key]).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn base_mode_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = predict_base(dir.path(), &today(&[("a", Some(1.0))])).await;
        assert!(base.is_empty());
    }

    #[test]
    fn annotation_reports_delta_only_for_entered_values() {
        let raw: BTreeMap<String, f64> =
            [("a".to_string(), 2.46), ("b".to_string(), 6.0)].into_iter().collect();
        let annotated = annotate(&raw, &today(&[("a", Some(5.0)), ("b", None)]));

        assert_eq!(annotated["a"].value, 2.5);
        assert_eq!(annotated["a"].delta, Some(-2.5));
        assert_eq!(annotated["a"].color, ColorHint::Red);
        assert_eq!(annotated["b"].delta, None);
        assert_eq!(annotated["b"].color, ColorHint::Red);
    }
}
