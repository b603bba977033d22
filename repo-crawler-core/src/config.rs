use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::IndicatorsToFetch;

/// Source-control platforms the configuration can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceControlType {
    Github,
    Gitlab,
    AzureDevops,
    Bitbucket,
}

impl std::fmt::Display for SourceControlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceControlType::Github => "GITHUB",
            SourceControlType::Gitlab => "GITLAB",
            SourceControlType::AzureDevops => "AZURE_DEVOPS",
            SourceControlType::Bitbucket => "BITBUCKET",
        };
        f.write_str(name)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceControlConfig {
    #[serde(rename = "type", default = "default_source_control_type")]
    pub kind: SourceControlType,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub crawl_users_repo_instead_of_orgas_repos: bool,
}

// keeps the token out of debug logs
impl std::fmt::Debug for SourceControlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceControlConfig")
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("organization_name", &self.organization_name)
            .field(
                "crawl_users_repo_instead_of_orgas_repos",
                &self.crawl_users_repo_instead_of_orgas_repos,
            )
            .finish()
    }
}

fn default_source_control_type() -> SourceControlType {
    SourceControlType::Github
}

/// A misc task as declared in configuration; turned into a `RepoTask` by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Static configuration of one crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub source_control: SourceControlConfig,
    #[serde(default)]
    pub indicators_to_fetch_by_file: Vec<IndicatorsToFetch>,
    #[serde(default)]
    pub repositories_to_exclude: Vec<String>,
    #[serde(default)]
    pub repositories_to_include: Vec<String>,
    #[serde(default)]
    pub publish_excluded_repositories: bool,
    #[serde(default)]
    pub crawl_all_branches: bool,
    #[serde(default = "default_crawl_in_parallel")]
    pub crawl_in_parallel: bool,
    #[serde(default = "default_max_parallel_repositories")]
    pub max_parallel_repositories: usize,
    #[serde(default)]
    pub misc_repository_tasks: Vec<TaskDefinition>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default = "default_excluded_teams")]
    pub excluded_teams: Vec<String>,
}

fn default_crawl_in_parallel() -> bool {
    true
}

fn default_max_parallel_repositories() -> usize {
    8
}

fn default_excluded_teams() -> Vec<String> {
    ["Developers", "Tech Leads", "Architects"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

impl CrawlerConfig {
    /// A config with every optional setting at its default.
    pub fn new(source_control: SourceControlConfig) -> Self {
        Self {
            source_control,
            indicators_to_fetch_by_file: Vec::new(),
            repositories_to_exclude: Vec::new(),
            repositories_to_include: Vec::new(),
            publish_excluded_repositories: false,
            crawl_all_branches: false,
            crawl_in_parallel: default_crawl_in_parallel(),
            max_parallel_repositories: default_max_parallel_repositories(),
            misc_repository_tasks: Vec::new(),
            groups: Vec::new(),
            excluded_teams: default_excluded_teams(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            platform = %self.source_control.kind,
            url = %self.source_control.url,
            organization = %self.source_control.organization_name,
            files_to_parse = self.indicators_to_fetch_by_file.len(),
            misc_tasks = self.misc_repository_tasks.len(),
            crawl_in_parallel = self.crawl_in_parallel,
            "Loaded crawler config"
        );
        debug!(?self, "Crawler config loaded (full debug)");
    }
}

/// Compiled server-side exclusion / inclusion patterns.
#[derive(Debug, Clone, Default)]
pub struct RepositoryFilter {
    exclude: Vec<Regex>,
    include: Vec<Regex>,
}

impl RepositoryFilter {
    pub fn from_patterns(exclude: &[String], include: &[String]) -> Result<Self, regex::Error> {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            exclude: compile(exclude)?,
            include: compile(include)?,
        })
    }

    pub fn has_exclusions(&self) -> bool {
        !self.exclude.is_empty()
    }

    pub fn has_inclusions(&self) -> bool {
        !self.include.is_empty()
    }

    pub fn matches_exclusion(&self, repo_name: &str) -> bool {
        self.exclude.iter().any(|r| r.is_match(repo_name))
    }

    pub fn matches_inclusion(&self, repo_name: &str) -> bool {
        self.include.iter().any(|r| r.is_match(repo_name))
    }
}
