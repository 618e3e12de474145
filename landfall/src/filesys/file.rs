//! File operations

use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::errors::DeployError;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, DeployError> {
        let mut file = fs::File::open(&self.path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;
        Ok(contents)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, DeployError> {
        let contents = self.read_string().await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Write string to file
    pub async fn write_string(&self, contents: &str) -> Result<(), DeployError> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&self.path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Write JSON to file
    pub async fn write_json<T: Serialize>(&self, value: &T) -> Result<(), DeployError> {
        let contents = serde_json::to_string_pretty(value)?;
        self.write_string(&contents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("landfall-{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_string_round_trip() {
        let path = scratch_path("notes");
        let file = File::new(&path);
        assert!(!file.exists().await);

        file.write_string("status: done\n").await.unwrap();
        assert!(file.exists().await);
        assert_eq!(file.read_string().await.unwrap(), "status: done\n");

        fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_json_round_trip_creates_parent_dirs() {
        let dir = scratch_path("json");
        let file = File::new(dir.join("out").join("report.json"));

        let value = serde_json::json!({ "status": "succeeded", "stages": 8 });
        file.write_json(&value).await.unwrap();

        let back: serde_json::Value = file.read_json().await.unwrap();
        assert_eq!(back, value);

        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_reading_a_missing_file_fails() {
        let file = File::new(scratch_path("missing"));
        assert!(!file.exists().await);
        assert!(matches!(
            file.read_string().await,
            Err(DeployError::IoError(_))
        ));
    }
}
