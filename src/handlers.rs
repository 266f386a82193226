use crate::calendar::{self, parse_iso_date};
use crate::catalog;
use crate::errors::AppError;
use crate::import::{self, ImportReport};
use crate::models::{
    DateQuery, EntryResponse, NewParameterRequest, Parameter, ParameterPatch, PredictRequest,
    PredictResponse, SavedResponse, UpdateCommentRequest, UpdateValueRequest,
};
use crate::predict::{self, TodayValues};
use crate::state::AppState;
use crate::storage;
use crate::training::{self, TrainReport};
use crate::ui::{PageContext, render_page};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
};
use chrono::NaiveDate;
use tracing::{debug, info};

pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Html<String>, AppError> {
    let today = calendar::today();
    let date = match query.date.as_deref().filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => parse_iso_date(raw).unwrap_or_else(|_| {
            debug!("invalid date '{raw}', falling back to {today}");
            today
        }),
        None => today,
    };

    let (parameters, entry, values, history) = {
        let conn = state.db.lock().await;
        let parameters = storage::list_parameters(&conn, true)?;
        let entry = storage::get_or_create_entry(&conn, date)?;
        let values = storage::entry_values(&conn, entry.id)?;
        let history = storage::load_history(&conn)?;
        (parameters, entry, values, history)
    };

    let today_values: TodayValues = parameters
        .iter()
        .map(|parameter| (parameter.key.clone(), values.get(&parameter.key).copied()))
        .collect();
    let live = predict::predict_live(&history, &today_values, false);
    let base = predict::predict_base(&state.config.model_dir, &today_values).await;

    Ok(Html(render_page(&PageContext {
        today,
        entry: &entry,
        parameters: &parameters,
        values: &values,
        live: &predict::annotate(&live, &today_values),
        base: &predict::annotate(&base, &today_values),
    })))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<EntryResponse>, AppError> {
    let date = match query.date.as_deref() {
        Some(raw) => request_date(raw)?,
        None => calendar::today(),
    };

    let conn = state.db.lock().await;
    let entry = storage::get_or_create_entry(&conn, date)?;
    let values = storage::entry_values(&conn, entry.id)?;

    Ok(Json(EntryResponse {
        date: entry.date,
        comment: entry.comment,
        values,
    }))
}

pub async fn update_value(
    State(state): State<AppState>,
    Json(payload): Json<UpdateValueRequest>,
) -> Result<Json<SavedResponse>, AppError> {
    let date = request_date(&payload.date)?;
    let value = predict::coerce_value(&payload.value).map_err(AppError::bad_request)?;
    let key = payload.parameter.trim();

    let conn = state.db.lock().await;
    let parameter = active_parameter(&conn, key)?;
    storage::save_value(&conn, date, &parameter, value)?;

    match value {
        Some(value) => info!("saved {key} = {value} for {date}"),
        None => info!("cleared {key} for {date}"),
    }
    Ok(Json(SavedResponse { ok: true }))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<SavedResponse>, AppError> {
    let date = request_date(&payload.date)?;
    let conn = state.db.lock().await;
    storage::set_comment(&conn, date, payload.comment.trim())?;
    info!("saved comment for {date}");
    Ok(Json(SavedResponse { ok: true }))
}

pub async fn predict(
    State(state): State<AppState>,
    Json(payload): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, AppError> {
    let (parameters, history) = {
        let conn = state.db.lock().await;
        (storage::list_parameters(&conn, true)?, storage::load_history(&conn)?)
    };

    let mut today_values: TodayValues = parameters
        .into_iter()
        .map(|parameter| (parameter.key, None))
        .collect();
    for (key, raw) in &payload.values {
        let Some(slot) = today_values.get_mut(key) else {
            return Err(AppError::bad_request(format!("unknown parameter '{key}'")));
        };
        *slot = predict::coerce_value(raw)
            .map_err(|err| AppError::bad_request(format!("{key}: {err}")))?;
    }

    let live = predict::predict_live(&history, &today_values, payload.exclude_entered);
    let base = predict::predict_base(&state.config.model_dir, &today_values).await;
    let response = PredictResponse {
        live: predict::annotate(&live, &today_values),
        base: predict::annotate(&base, &today_values),
    };
    debug!(
        "predictions sent: {} live, {} base",
        response.live.len(),
        response.base.len()
    );
    Ok(Json(response))
}

pub async fn train(State(state): State<AppState>) -> Result<Json<TrainReport>, AppError> {
    Ok(Json(run_training(&state).await?))
}

pub async fn train_and_redirect(State(state): State<AppState>) -> Result<Redirect, AppError> {
    run_training(&state).await?;
    Ok(Redirect::to("/"))
}

async fn run_training(state: &AppState) -> Result<TrainReport, AppError> {
    let history = {
        let conn = state.db.lock().await;
        storage::load_history(&conn)?
    };
    let report = training::train_all(history, calendar::today(), &state.config.model_dir).await?;
    info!(
        "training finished: {} trained, {} skipped",
        report.trained.len(),
        report.skipped.len()
    );
    Ok(report)
}

pub async fn list_parameters(State(state): State<AppState>) -> Result<Json<Vec<Parameter>>, AppError> {
    let conn = state.db.lock().await;
    Ok(Json(storage::list_parameters(&conn, false)?))
}

pub async fn create_parameter(
    State(state): State<AppState>,
    Json(payload): Json<NewParameterRequest>,
) -> Result<(StatusCode, Json<Parameter>), AppError> {
    let conn = state.db.lock().await;
    let parameter = catalog::create_parameter(
        &conn,
        &payload.label,
        payload.key.as_deref(),
        payload.active.unwrap_or(true),
    )?;
    Ok((StatusCode::CREATED, Json(parameter)))
}

pub async fn update_parameter(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(patch): Json<ParameterPatch>,
) -> Result<Json<Parameter>, AppError> {
    let label = patch.label.as_deref().map(str::trim);
    if label.is_some_and(str::is_empty) {
        return Err(AppError::bad_request("label must not be empty"));
    }

    let conn = state.db.lock().await;
    let parameter = storage::update_parameter(&conn, &key, label, patch.active)?
        .ok_or_else(|| AppError::not_found(format!("unknown parameter '{key}'")))?;
    info!(
        "updated parameter {} ({}, active={})",
        parameter.key, parameter.label, parameter.active
    );
    Ok(Json(parameter))
}

pub async fn import(State(state): State<AppState>, body: String) -> Result<Json<ImportReport>, AppError> {
    let mut conn = state.db.lock().await;
    let report = import::import_csv(&mut conn, body.as_bytes())?;
    Ok(Json(report))
}

fn request_date(raw: &str) -> Result<NaiveDate, AppError> {
    parse_iso_date(raw).map_err(|err| AppError::bad_request(format!("invalid date '{raw}': {err}")))
}

fn active_parameter(conn: &rusqlite::Connection, key: &str) -> Result<Parameter, AppError> {
    storage::find_parameter(conn, key)?
        .filter(|parameter| parameter.active)
        .ok_or_else(|| AppError::bad_request(format!("unknown parameter '{key}'")))
}
