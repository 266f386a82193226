use std::{env, net::SocketAddr, path::PathBuf};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_PATH: &str = "data/diary.sqlite3";
const DEFAULT_MODEL_DIR: &str = "data/models/base";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub model_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            port,
            db_path: path_from_env("DIARY_DB_PATH", DEFAULT_DB_PATH),
            model_dir: path_from_env("DIARY_MODEL_DIR", DEFAULT_MODEL_DIR),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn path_from_env(name: &str, default: &str) -> PathBuf {
    match env::var(name) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from(default),
    }
}
