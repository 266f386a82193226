use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, patch, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/add", get(handlers::index))
        .route("/train", post(handlers::train_and_redirect))
        .route("/api/entry", get(handlers::get_entry))
        .route("/api/entry/value", post(handlers::update_value))
        .route("/api/entry/comment", post(handlers::update_comment))
        .route("/api/predict", post(handlers::predict))
        .route("/api/train", post(handlers::train))
        .route(
            "/api/parameters",
            get(handlers::list_parameters).post(handlers::create_parameter),
        )
        .route("/api/parameters/:key", patch(handlers::update_parameter))
        .route("/api/import", post(handlers::import))
        .with_state(state)
}
