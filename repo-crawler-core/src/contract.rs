//! # contract: seams between the crawl pipeline and its collaborators
//!
//! The pipeline only ever talks to a source-control platform, a set of content parsers,
//! a set of repository tasks and a set of outputs through the traits defined here.
//!
//! ## Mocking & Testing
//! - [`SourceControlClient`] and [`OutputSink`] are annotated for `mockall`. The generated
//!   `MockSourceControlClient` / `MockOutputSink` are exported by the default
//!   `test-export-mocks` feature so downstream crates can use them in their own tests.
//!
//! ## Adding a platform
//! - Implement [`SourceControlClient`]: map "file absent" to
//!   [`SourceControlError::NoFileFound`], an unparseable repository config to
//!   [`SourceControlError::RepoConfigParse`] and everything else to
//!   [`SourceControlError::Remote`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
#[allow(unused_imports)]
use mockall::{automock, predicate::*};
use serde_json::Value;

use crate::error::{OutputError, RegistryError, SourceControlError};
use crate::model::{
    Branch, CommitRef, DetailedCommit, IndicatorDefinition, PullRequest, Repository,
    RepositoryConfig, SearchResult, Team, TeamMember,
};

/// Everything the pipeline needs from a source-control platform.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceControlClient: Send + Sync {
    /// All repositories of the organization (or user), without any filtering.
    async fn fetch_repositories(
        &self,
        organization: &str,
    ) -> Result<Vec<Repository>, SourceControlError>;

    /// The repository-level config found on the default branch.
    async fn fetch_repo_config(
        &self,
        full_name: &str,
        default_branch: &str,
    ) -> Result<RepositoryConfig, SourceControlError>;

    async fn fetch_repo_branches(&self, full_name: &str) -> Result<Vec<Branch>, SourceControlError>;

    /// Raw content of `file_path` on `branch`.
    async fn fetch_file_content(
        &self,
        full_name: &str,
        branch: &str,
        file_path: &str,
    ) -> Result<String, SourceControlError>;

    /// Code search restricted to one repository.
    async fn fetch_code_search_result(
        &self,
        full_name: &str,
        query: &str,
    ) -> Result<SearchResult, SourceControlError>;

    /// The `per_page` most recent commits of the default branch.
    async fn fetch_commits(
        &self,
        full_name: &str,
        per_page: usize,
    ) -> Result<Vec<CommitRef>, SourceControlError>;

    async fn fetch_commit(
        &self,
        full_name: &str,
        sha: &str,
    ) -> Result<DetailedCommit, SourceControlError>;

    async fn fetch_teams(&self, organization: &str) -> Result<Vec<Team>, SourceControlError>;

    async fn fetch_teams_members(&self, team_id: &str)
        -> Result<Vec<TeamMember>, SourceControlError>;

    async fn fetch_open_pull_requests(
        &self,
        full_name: &str,
    ) -> Result<Vec<PullRequest>, SourceControlError>;

    /// Checks that the platform is reachable with the configured credentials.
    /// Fails with [`SourceControlError::NoReachableRepositories`] otherwise.
    async fn validate_remote_config(&self, organization: &str) -> Result<(), SourceControlError>;
}

/// Extracts indicator values from a file's content.
///
/// Parsing never fails: problems end up as a sentinel value under the indicator name.
pub trait ContentParser: Send + Sync {
    /// Name referenced by `IndicatorDefinition::kind` in the configuration.
    fn name(&self) -> &str;

    fn parse(
        &self,
        content: &str,
        file_path: &str,
        definition: &IndicatorDefinition,
    ) -> BTreeMap<String, String>;
}

/// Builds a configured [`RepoTask`] from its name and params.
pub trait TaskBuilder: Send + Sync {
    fn task_type(&self) -> &str;

    fn build(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn RepoTask>, RegistryError>;
}

/// A repository-level computation whose result is reported per branch,
/// as `(indicator name, value)`.
#[async_trait]
pub trait RepoTask: Send + Sync {
    fn name(&self) -> &str;

    async fn perform(
        &self,
        repository: &Repository,
    ) -> Result<BTreeMap<Branch, (String, Value)>, SourceControlError>;
}

/// Destination of enriched repositories.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn output(&self, repository: &Repository) -> Result<(), OutputError>;

    /// Called once after every repository went through `output`.
    async fn finalize_output(&self) -> Result<(), OutputError> {
        Ok(())
    }
}
