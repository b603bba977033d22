use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::contract::{RepoTask, TaskBuilder};
use crate::error::{RegistryError, SourceControlError};
use crate::model::{Branch, Repository};
use crate::ownership::MembershipResolver;

/// Indicator under which the owning team is reported, whatever the task name.
pub const OWNING_TEAM_INDICATOR: &str = "owningTeam";

const DEFAULT_LAST_COMMIT_NUMBER: usize = 150;

/// Owning team of the repository, based on who authored its most recent commits.
/// Reports `"Undefined"` when no team can be found.
pub struct RepositoryOwnershipComputation {
    name: String,
    last_commit_number: usize,
    resolver: Arc<MembershipResolver>,
}

#[async_trait]
impl RepoTask for RepositoryOwnershipComputation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn perform(
        &self,
        repository: &Repository,
    ) -> Result<BTreeMap<Branch, (String, Value)>, SourceControlError> {
        let owner = self
            .resolver
            .compute_ownership_for(&repository.full_name, self.last_commit_number)
            .await?;

        Ok(BTreeMap::from([(
            repository.default_branch(),
            (OWNING_TEAM_INDICATOR.to_string(), Value::from(owner)),
        )]))
    }
}

pub struct RepositoryOwnershipBuilder {
    resolver: Arc<MembershipResolver>,
}

impl RepositoryOwnershipBuilder {
    pub const TYPE: &'static str = "repositoryOwnershipComputation";
    pub const LAST_COMMIT_NUMBER: &'static str = "lastCommitNumber";

    pub fn new(resolver: Arc<MembershipResolver>) -> Self {
        Self { resolver }
    }
}

impl TaskBuilder for RepositoryOwnershipBuilder {
    fn task_type(&self) -> &str {
        Self::TYPE
    }

    fn build(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn RepoTask>, RegistryError> {
        let last_commit_number = match params.get(Self::LAST_COMMIT_NUMBER) {
            None => DEFAULT_LAST_COMMIT_NUMBER,
            Some(value) => value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| RegistryError::InvalidTaskParam {
                    task: name.to_string(),
                    param: Self::LAST_COMMIT_NUMBER.to_string(),
                    value: value.clone(),
                })?,
        };

        Ok(Arc::new(RepositoryOwnershipComputation {
            name: name.to_string(),
            last_commit_number,
            resolver: self.resolver.clone(),
        }))
    }
}
