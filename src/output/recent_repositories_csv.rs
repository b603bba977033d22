use std::path::{Path, PathBuf};

use async_trait::async_trait;
use repo_crawler_core::contract::OutputSink;
use repo_crawler_core::error::OutputError;
use repo_crawler_core::model::Repository;
use tokio::sync::Mutex;

use super::file::{append_to_file, create_new_file};

const FILE_PREFIX: &str = "RecentRepositories_";
const DAY_FORMAT: &str = "%Y-%m-%d";

/// Creation and last update day of every repository.
pub struct RecentRepositoriesCsvFileOutput {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RecentRepositoriesCsvFileOutput {
    pub fn create(directory: &Path, timestamp: &str) -> std::io::Result<Self> {
        let path = directory.join(format!("{FILE_PREFIX}{timestamp}.csv"));
        create_new_file(&path, "repositoryName;creationDate;lastUpdateDate\n")?;
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
impl OutputSink for RecentRepositoriesCsvFileOutput {
    async fn output(&self, repository: &Repository) -> Result<(), OutputError> {
        let row = format!(
            "{};{};{}\n",
            repository.name,
            repository.creation_date.format(DAY_FORMAT),
            repository.last_update_date.format(DAY_FORMAT)
        );
        let _guard = self.lock.lock().await;
        append_to_file(&self.path, &row).await
    }
}
