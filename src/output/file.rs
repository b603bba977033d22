use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use repo_crawler_core::contract::OutputSink;
use repo_crawler_core::error::OutputError;
use repo_crawler_core::model::Repository;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Creates `path` (failing if it already exists) with `header` as its first content.
pub(crate) fn create_new_file(path: &Path, header: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(header.as_bytes())?;
    info!(path = %path.display(), "Output file created");
    Ok(())
}

/// Opens `path` in append mode, writes `content` and closes it.
pub(crate) async fn append_to_file(path: &Path, content: &str) -> Result<(), OutputError> {
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// One JSON line per repository in `<prefix>_<timestamp>.txt`.
pub struct FileOutput {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileOutput {
    pub fn create(directory: &Path, filename_prefix: &str, timestamp: &str) -> std::io::Result<Self> {
        let path = directory.join(format!("{filename_prefix}_{timestamp}.txt"));
        create_new_file(&path, &format!("OUTPUT FOR repo-crawler - {timestamp}\n"))?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OutputSink for FileOutput {
    async fn output(&self, repository: &Repository) -> Result<(), OutputError> {
        let line = serde_json::to_string(repository)
            .map_err(|e| OutputError::Serialization(e.to_string()))?;
        let _guard = self.lock.lock().await;
        append_to_file(&self.path, &format!("{line}\n")).await?;
        debug!(repo = %repository.full_name, path = %self.path.display(), "Repository written");
        Ok(())
    }
}
