//! JSON array of resources in the shape CI-droid's bulk-actions API expects, so the file
//! content can be pasted as is in the `resourcesToUpdate` of a bulk action payload.
//!
//! The first indicator to output is taken as the path of the file to update; the next
//! ones are written as `otherIndicator1`, `otherIndicator2`...

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use repo_crawler_core::contract::OutputSink;
use repo_crawler_core::error::OutputError;
use repo_crawler_core::model::Repository;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use super::file::{append_to_file, create_new_file};
use super::{all_indicators, value_as_text, CI_DROID_FILE_PREFIX};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CiDroidResource<'a> {
    repo_full_name: &'a str,
    file_path_on_repo: Option<String>,
    #[serde(flatten)]
    other_indicators: BTreeMap<String, Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<&'a [String]>,
    branch_name: &'a str,
}

pub struct CiDroidReadyJsonFileOutput {
    path: PathBuf,
    indicators_to_output: Vec<String>,
    with_tags: bool,
    /// Whether at least one resource was written; guards the file as well.
    has_entries: Mutex<bool>,
}

impl CiDroidReadyJsonFileOutput {
    pub fn create(
        directory: &Path,
        indicators_to_output: Vec<String>,
        with_tags: bool,
        timestamp: &str,
    ) -> std::io::Result<Self> {
        let path = directory.join(format!("{CI_DROID_FILE_PREFIX}{timestamp}.json"));
        create_new_file(&path, "[\n")?;
        Ok(Self {
            path,
            indicators_to_output,
            with_tags,
            has_entries: Mutex::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn resources(&self, repository: &Repository) -> Result<Vec<String>, OutputError> {
        let mut resources = Vec::new();
        for (branch, indicators) in all_indicators(repository) {
            let file_path_on_repo = self
                .indicators_to_output
                .first()
                .and_then(|name| indicators.get(name))
                .map(|value| match value {
                    // a list of paths: the first one is the file to update
                    Value::Array(paths) => paths.first().map(value_as_text).unwrap_or_default(),
                    other => value_as_text(other),
                });
            let other_indicators = self
                .indicators_to_output
                .iter()
                .enumerate()
                .skip(1)
                .map(|(i, name)| {
                    (
                        format!("otherIndicator{i}"),
                        indicators.get(name).map(value_as_text),
                    )
                })
                .collect();

            let resource = CiDroidResource {
                repo_full_name: &repository.full_name,
                file_path_on_repo,
                other_indicators,
                tags: self.with_tags.then_some(repository.tags.as_slice()),
                branch_name: &branch.name,
            };
            resources.push(
                serde_json::to_string(&resource)
                    .map_err(|e| OutputError::Serialization(e.to_string()))?,
            );
        }
        Ok(resources)
    }
}

#[async_trait]
impl OutputSink for CiDroidReadyJsonFileOutput {
    async fn output(&self, repository: &Repository) -> Result<(), OutputError> {
        let resources = self.resources(repository)?;
        if resources.is_empty() {
            return Ok(());
        }

        let mut has_entries = self.has_entries.lock().await;
        let separator = if *has_entries { ",\n" } else { "" };
        append_to_file(&self.path, &format!("{separator}{}", resources.join(",\n"))).await?;
        *has_entries = true;
        Ok(())
    }

    async fn finalize_output(&self) -> Result<(), OutputError> {
        let _guard = self.has_entries.lock().await;
        append_to_file(&self.path, "\n]\n").await?;
        info!(path = %self.path.display(), "CI-droid JSON output closed");
        Ok(())
    }
}
