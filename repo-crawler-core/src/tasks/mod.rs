//! Built-in repository tasks and their builders.
//!
//! Every task reports a single `(task name, value)` pair on the default branch.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::contract::{SourceControlClient, TaskBuilder};
use crate::error::RegistryError;
use crate::ownership::MembershipResolver;

pub mod branches;
pub mod ownership;
pub mod pull_requests;
pub mod search;

pub use self::branches::NbBranchesOnRepoBuilder;
pub use self::ownership::RepositoryOwnershipBuilder;
pub use self::pull_requests::NbOpenPrsOnRepoBuilder;
pub use self::search::{CountHitsOnRepoSearchBuilder, PathsForHitsOnRepoSearchBuilder};

/// One builder per built-in task type, sharing `client` and `resolver`.
pub fn builtin_task_builders(
    client: Arc<dyn SourceControlClient>,
    resolver: Arc<MembershipResolver>,
) -> Vec<Arc<dyn TaskBuilder>> {
    vec![
        Arc::new(NbBranchesOnRepoBuilder::new(client.clone())),
        Arc::new(NbOpenPrsOnRepoBuilder::new(client.clone())),
        Arc::new(CountHitsOnRepoSearchBuilder::new(client.clone())),
        Arc::new(PathsForHitsOnRepoSearchBuilder::new(client)),
        Arc::new(RepositoryOwnershipBuilder::new(resolver)),
    ]
}

fn required_param(
    task: &str,
    params: &BTreeMap<String, String>,
    param: &str,
) -> Result<String, RegistryError> {
    params
        .get(param)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| RegistryError::MissingTaskParam {
            task: task.to_string(),
            param: param.to_string(),
        })
}
