//! One row per file location found by a `pathsForHitsOnRepoSearch` task, so that the hits of
//! a code search can be reworked in a spreadsheet before being fed to another tool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use repo_crawler_core::contract::OutputSink;
use repo_crawler_core::error::OutputError;
use repo_crawler_core::model::Repository;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use super::file::{append_to_file, create_new_file};
use super::value_as_text;

const FILE_PREFIX: &str = "SearchPatternInCode_";
const UNPARSEABLE_PATHS: &str = "unable to parse item path";

pub struct SearchPatternInCodeCsvFileOutput {
    path: PathBuf,
    search_name_to_output: String,
    lock: Mutex<()>,
}

impl SearchPatternInCodeCsvFileOutput {
    pub fn create(
        directory: &Path,
        search_name_to_output: String,
        timestamp: &str,
    ) -> std::io::Result<Self> {
        let path = directory.join(format!("{FILE_PREFIX}{timestamp}.csv"));
        create_new_file(&path, "repositoryFullName;location\n")?;
        Ok(Self {
            path,
            search_name_to_output,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rows(&self, repository: &Repository) -> String {
        let hits = repository
            .misc_tasks_results
            .get(&repository.default_branch())
            .and_then(|results| results.get(&self.search_name_to_output));

        match hits {
            Some(Value::Array(paths)) => paths
                .iter()
                .map(|p| format!("{};{}\n", repository.full_name, value_as_text(p)))
                .collect(),
            _ => {
                warn!(
                    repo = %repository.full_name,
                    search = %self.search_name_to_output,
                    "no list of paths found for search"
                );
                format!("{};{UNPARSEABLE_PATHS}\n", repository.full_name)
            }
        }
    }
}

#[async_trait]
impl OutputSink for SearchPatternInCodeCsvFileOutput {
    async fn output(&self, repository: &Repository) -> Result<(), OutputError> {
        let rows = self.rows(repository);
        if rows.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        append_to_file(&self.path, &rows).await
    }
}
