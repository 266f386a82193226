use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: i64,
    pub key: String,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub id: i64,
    pub date: NaiveDate,
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub date: NaiveDate,
    pub comment: String,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateValueRequest {
    #[serde(alias = "key")]
    pub parameter: String,
    #[serde(default)]
    pub value: Value,
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub date: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct SavedResponse {
    pub ok: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
    /// Drop every parameter already entered today from each target's features.
    #[serde(default)]
    pub exclude_entered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorHint {
    Green,
    Yellow,
    Red,
}

impl ColorHint {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorHint::Green => "green",
            ColorHint::Yellow => "yellow",
            ColorHint::Red => "red",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub value: f64,
    pub delta: Option<f64>,
    pub color: ColorHint,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PredictResponse {
    pub live: BTreeMap<String, Prediction>,
    pub base: BTreeMap<String, Prediction>,
}

#[derive(Debug, Deserialize)]
pub struct NewParameterRequest {
    pub label: String,
    pub key: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ParameterPatch {
    pub label: Option<String>,
    pub active: Option<bool>,
}
