pub mod app;
pub mod calendar;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod history;
pub mod import;
pub mod model_store;
pub mod models;
pub mod predict;
pub mod regression;
pub mod state;
pub mod storage;
pub mod training;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use state::AppState;
