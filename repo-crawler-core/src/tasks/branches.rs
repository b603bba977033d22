use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::contract::{RepoTask, SourceControlClient, TaskBuilder};
use crate::error::{RegistryError, SourceControlError};
use crate::model::{Branch, Repository};

/// Number of branches of the repository.
pub struct NbBranchesOnRepo {
    name: String,
    client: Arc<dyn SourceControlClient>,
}

#[async_trait]
impl RepoTask for NbBranchesOnRepo {
    fn name(&self) -> &str {
        &self.name
    }

    async fn perform(
        &self,
        repository: &Repository,
    ) -> Result<BTreeMap<Branch, (String, Value)>, SourceControlError> {
        let branches = self.client.fetch_repo_branches(&repository.full_name).await?;
        debug!(repo = %repository.full_name, nb_branches = branches.len(), "counted branches");

        Ok(BTreeMap::from([(
            repository.default_branch(),
            (self.name.clone(), Value::from(branches.len())),
        )]))
    }
}

pub struct NbBranchesOnRepoBuilder {
    client: Arc<dyn SourceControlClient>,
}

impl NbBranchesOnRepoBuilder {
    pub const TYPE: &'static str = "nbBranchesOnRepo";

    pub fn new(client: Arc<dyn SourceControlClient>) -> Self {
        Self { client }
    }
}

impl TaskBuilder for NbBranchesOnRepoBuilder {
    fn task_type(&self) -> &str {
        Self::TYPE
    }

    fn build(
        &self,
        name: &str,
        _params: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn RepoTask>, RegistryError> {
        Ok(Arc::new(NbBranchesOnRepo {
            name: name.to_string(),
            client: self.client.clone(),
        }))
    }
}
