use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::contract::{RepoTask, SourceControlClient, TaskBuilder};
use crate::error::{RegistryError, SourceControlError};
use crate::model::{Branch, Repository};

/// Number of open pull requests on the repository.
pub struct NbOpenPrsOnRepo {
    name: String,
    client: Arc<dyn SourceControlClient>,
}

#[async_trait]
impl RepoTask for NbOpenPrsOnRepo {
    fn name(&self) -> &str {
        &self.name
    }

    async fn perform(
        &self,
        repository: &Repository,
    ) -> Result<BTreeMap<Branch, (String, Value)>, SourceControlError> {
        let open_prs = self
            .client
            .fetch_open_pull_requests(&repository.full_name)
            .await?;
        debug!(repo = %repository.full_name, nb_open_prs = open_prs.len(), "counted open pull requests");

        Ok(BTreeMap::from([(
            repository.default_branch(),
            (self.name.clone(), Value::from(open_prs.len())),
        )]))
    }
}

pub struct NbOpenPrsOnRepoBuilder {
    client: Arc<dyn SourceControlClient>,
}

impl NbOpenPrsOnRepoBuilder {
    pub const TYPE: &'static str = "nbOpenPRsOnRepo";

    pub fn new(client: Arc<dyn SourceControlClient>) -> Self {
        Self { client }
    }
}

impl TaskBuilder for NbOpenPrsOnRepoBuilder {
    fn task_type(&self) -> &str {
        Self::TYPE
    }

    fn build(
        &self,
        name: &str,
        _params: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn RepoTask>, RegistryError> {
        Ok(Arc::new(NbOpenPrsOnRepo {
            name: name.to_string(),
            client: self.client.clone(),
        }))
    }
}
