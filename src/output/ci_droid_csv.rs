use std::path::{Path, PathBuf};

use async_trait::async_trait;
use repo_crawler_core::contract::OutputSink;
use repo_crawler_core::error::OutputError;
use repo_crawler_core::model::Repository;
use tokio::sync::Mutex;

use super::file::{append_to_file, create_new_file};
use super::{all_indicators, value_as_text, CI_DROID_FILE_PREFIX};

const MISSING_VALUE: &str = "N/A";

/// `;` separated rows, one per branch, ready to be fed to CI-droid bulk actions.
pub struct CiDroidReadyCsvFileOutput {
    path: PathBuf,
    indicators_to_output: Vec<String>,
    lock: Mutex<()>,
}

impl CiDroidReadyCsvFileOutput {
    pub fn create(
        directory: &Path,
        indicators_to_output: Vec<String>,
        timestamp: &str,
    ) -> std::io::Result<Self> {
        let path = directory.join(format!("{CI_DROID_FILE_PREFIX}{timestamp}.csv"));
        let mut header = String::from("repositoryFullName;branchName");
        for indicator in &indicators_to_output {
            header.push(';');
            header.push_str(indicator);
        }
        header.push('\n');
        create_new_file(&path, &header)?;

        Ok(Self {
            path,
            indicators_to_output,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rows(&self, repository: &Repository) -> String {
        let mut rows = String::new();
        for (branch, indicators) in all_indicators(repository) {
            rows.push_str(&repository.full_name);
            rows.push(';');
            rows.push_str(&branch.name);
            for name in &self.indicators_to_output {
                rows.push(';');
                match indicators.get(name) {
                    Some(value) => rows.push_str(&value_as_text(value)),
                    None => rows.push_str(MISSING_VALUE),
                }
            }
            rows.push('\n');
        }
        rows
    }
}

#[async_trait]
impl OutputSink for CiDroidReadyCsvFileOutput {
    async fn output(&self, repository: &Repository) -> Result<(), OutputError> {
        let rows = self.rows(repository);
        if rows.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        append_to_file(&self.path, &rows).await
    }
}
