//! Code-search based tasks. The search covers the repository as indexed by the platform,
//! not each branch.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::required_param;
use crate::contract::{RepoTask, SourceControlClient, TaskBuilder};
use crate::error::{RegistryError, SourceControlError};
use crate::model::{Branch, Repository};
use crate::parsers::NOT_FOUND;

/// Number of hits of a code search, as a string.
pub struct CountHitsOnRepoSearch {
    name: String,
    query: String,
    client: Arc<dyn SourceControlClient>,
}

#[async_trait]
impl RepoTask for CountHitsOnRepoSearch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn perform(
        &self,
        repository: &Repository,
    ) -> Result<BTreeMap<Branch, (String, Value)>, SourceControlError> {
        let result = self
            .client
            .fetch_code_search_result(&repository.full_name, &self.query)
            .await?;
        debug!(repo = %repository.full_name, query = %self.query, hits = result.total_count, "code search done");

        Ok(BTreeMap::from([(
            repository.default_branch(),
            (self.name.clone(), Value::from(result.total_count.to_string())),
        )]))
    }
}

pub struct CountHitsOnRepoSearchBuilder {
    client: Arc<dyn SourceControlClient>,
}

impl CountHitsOnRepoSearchBuilder {
    pub const TYPE: &'static str = "countHitsOnRepoSearch";
    pub const QUERY_STRING: &'static str = "queryString";

    pub fn new(client: Arc<dyn SourceControlClient>) -> Self {
        Self { client }
    }
}

impl TaskBuilder for CountHitsOnRepoSearchBuilder {
    fn task_type(&self) -> &str {
        Self::TYPE
    }

    fn build(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn RepoTask>, RegistryError> {
        Ok(Arc::new(CountHitsOnRepoSearch {
            name: name.to_string(),
            query: required_param(name, params, Self::QUERY_STRING)?,
            client: self.client.clone(),
        }))
    }
}

/// Paths of the files hit by a code search, or `"not found"` when there's none.
pub struct PathsForHitsOnRepoSearch {
    name: String,
    query: String,
    client: Arc<dyn SourceControlClient>,
}

#[async_trait]
impl RepoTask for PathsForHitsOnRepoSearch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn perform(
        &self,
        repository: &Repository,
    ) -> Result<BTreeMap<Branch, (String, Value)>, SourceControlError> {
        let result = self
            .client
            .fetch_code_search_result(&repository.full_name, &self.query)
            .await?;

        let value = if result.total_count > 0 {
            Value::from(
                result
                    .items
                    .into_iter()
                    .map(|item| item.path)
                    .collect::<Vec<_>>(),
            )
        } else {
            Value::from(NOT_FOUND)
        };

        Ok(BTreeMap::from([(
            repository.default_branch(),
            (self.name.clone(), value),
        )]))
    }
}

pub struct PathsForHitsOnRepoSearchBuilder {
    client: Arc<dyn SourceControlClient>,
}

impl PathsForHitsOnRepoSearchBuilder {
    pub const TYPE: &'static str = "pathsForHitsOnRepoSearch";
    pub const SEARCH_QUERY: &'static str = "searchQuery";

    pub fn new(client: Arc<dyn SourceControlClient>) -> Self {
        Self { client }
    }
}

impl TaskBuilder for PathsForHitsOnRepoSearchBuilder {
    fn task_type(&self) -> &str {
        Self::TYPE
    }

    fn build(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn RepoTask>, RegistryError> {
        Ok(Arc::new(PathsForHitsOnRepoSearch {
            name: name.to_string(),
            query: required_param(name, params, Self::SEARCH_QUERY)?,
            client: self.client.clone(),
        }))
    }
}
