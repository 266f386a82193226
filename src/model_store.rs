use crate::regression::LinearModel;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

pub const MODEL_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum ModelFileError {
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse model file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("model file for '{0}' does not match its target or is malformed")]
    Inconsistent(String),
}

pub fn model_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.{MODEL_EXTENSION}"))
}

pub async fn save_model(dir: &Path, model: &LinearModel) -> Result<PathBuf, ModelFileError> {
    let path = model_path(dir, &model.target);
    let payload = serde_json::to_vec_pretty(model)?;
    fs::write(&path, payload).await?;
    Ok(path)
}

/// Loads the serialized model for `key`. A missing file is `Ok(None)`.
pub async fn load_model(dir: &Path, key: &str) -> Result<Option<LinearModel>, ModelFileError> {
    let bytes = match fs::read(model_path(dir, key)).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let model: LinearModel = serde_json::from_slice(&bytes)?;
    if model.target != key || !model.is_consistent() {
        return Err(ModelFileError::Inconsistent(key.to_string()));
    }
    Ok(Some(model))
}

/// Deletes every model file in `dir` and returns how many were removed.
pub async fn remove_models(dir: &Path) -> Result<usize, ModelFileError> {
    let mut removed = 0;
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(MODEL_EXTENSION) {
            fs::remove_file(&path).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(target: &str) -> LinearModel {
        LinearModel {
            target: target.to_string(),
            features: vec!["a".to_string()],
            coefficients: vec![2.0],
            intercept: 0.5,
        }
    }

    #[tokio::test]
    async fn saved_model_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_model(dir.path(), &model("b")).await.unwrap();
        assert_eq!(path, dir.path().join("b.json"));

        let loaded = load_model(dir.path(), "b").await.unwrap();
        assert_eq!(loaded, Some(model("b")));
    }

    #[tokio::test]
    async fn missing_model_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_model(dir.path(), "nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn model_saved_under_other_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let payload = serde_json::to_vec(&model("a")).unwrap();
        fs::write(dir.path().join("b.json"), payload).await.unwrap();

        assert!(matches!(
            load_model(dir.path(), "b").await,
            Err(ModelFileError::Inconsistent(_))
        ));
    }

    #[tokio::test]
    async fn remove_models_keeps_other_files() {
        let dir = tempfile::tempdir().unwrap();
        save_model(dir.path(), &model("a")).await.unwrap();
        save_model(dir.path(), &model("b")).await.unwrap();
        fs::write(dir.path().join("notes.txt"), b"keep").await.unwrap();

        assert_eq!(remove_models(dir.path()).await.unwrap(), 2);
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(remove_models(&dir.path().join("absent")).await.unwrap(), 0);
    }
}
