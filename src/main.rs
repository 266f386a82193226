use clap::{Parser, Subcommand};
use diary::{AppState, Config, calendar, import, router, storage, training};
use std::path::PathBuf;
use tokio::fs;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "diary", about = "Daily parameter diary with regression hints")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the web server (default)
    Serve,
    /// Retrain every base model from past entries
    Train,
    /// Import historical values from a CSV spreadsheet export
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    if let Some(parent) = config.db_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut conn = storage::open(&config.db_path)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let addr = config.addr();
            let app = router(AppState::new(config, conn));

            info!("listening on http://{addr}");
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
        Command::Train => {
            let history = storage::load_history(&conn)?;
            let report = training::train_all(history, calendar::today(), &config.model_dir).await?;
            info!(
                "trained {} models, skipped {}",
                report.trained.len(),
                report.skipped.len()
            );
        }
        Command::Import { path } => {
            let data = fs::read(&path).await?;
            let report = import::import_csv(&mut conn, &data)?;
            info!(
                "imported {}: {} created, {} updated, {} new parameters",
                path.display(),
                report.created,
                report.updated,
                report.new_parameters.len()
            );
        }
    }

    Ok(())
}
