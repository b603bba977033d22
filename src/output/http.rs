use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::join_all;
use repo_crawler_core::contract::OutputSink;
use repo_crawler_core::error::OutputError;
use repo_crawler_core::model::Repository;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

fn serialize_date<S: serde::Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
}

/// The document posted for each crawled branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputIndicator {
    pub name: String,
    pub branch_name: String,
    #[serde(serialize_with = "serialize_date")]
    pub creation_date: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    pub last_update_date: DateTime<Utc>,
    pub indicators: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub groups: Vec<String>,
    pub crawler_run_id: String,
    pub misc_tasks_results: BTreeMap<String, Value>,
    pub timestamp: String,
}

impl OutputIndicator {
    /// One document per branch to parse, in branch order.
    pub fn for_each_branch(repository: &Repository) -> Vec<OutputIndicator> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        repository
            .branches_to_parse
            .iter()
            .map(|branch| OutputIndicator {
                name: repository.name.clone(),
                branch_name: branch.name.clone(),
                creation_date: repository.creation_date,
                last_update_date: repository.last_update_date,
                indicators: repository.indicators.get(branch).cloned().unwrap_or_default(),
                tags: repository.tags.clone(),
                groups: repository.groups.clone(),
                crawler_run_id: repository.crawler_run_id.clone(),
                misc_tasks_results: repository
                    .misc_tasks_results
                    .get(branch)
                    .cloned()
                    .unwrap_or_default(),
                timestamp: timestamp.clone(),
            })
            .collect()
    }
}

/// POSTs an [`OutputIndicator`] per branch to `target_url`. A rejected document is logged,
/// not reported as an error.
pub struct HttpOutput {
    client: Client,
    target_url: String,
}

impl HttpOutput {
    pub fn new(target_url: String) -> Self {
        Self {
            client: Client::new(),
            target_url,
        }
    }

    async fn post(&self, document: &OutputIndicator) -> Result<(), OutputError> {
        let resp = self
            .client
            .post(&self.target_url)
            .json(document)
            .send()
            .await
            .map_err(|e| {
                OutputError::Other(format!("POST to {} failed: {e}", self.target_url))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(
                repo = %document.name,
                branch = %document.branch_name,
                status = %status,
                body = %body,
                "couldn't push result for repo"
            );
        } else {
            debug!(repo = %document.name, branch = %document.branch_name, "Result pushed");
        }
        Ok(())
    }
}

#[async_trait]
impl OutputSink for HttpOutput {
    async fn output(&self, repository: &Repository) -> Result<(), OutputError> {
        let documents = OutputIndicator::for_each_branch(repository);
        join_all(documents.iter().map(|document| self.post(document)))
            .await
            .into_iter()
            .collect()
    }
}
