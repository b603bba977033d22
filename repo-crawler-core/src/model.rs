//! Domain records flowing through the crawl pipeline.
//!
//! [`Repository`] is an immutable value: every pipeline stage consumes a snapshot and returns
//! a new one (`Repository { field, ..previous }`), so repositories processed concurrently never
//! share mutable state.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::RepositoryFilter;
use crate::error::SourceControlError;

/// Run id carried by repositories that haven't been stamped by a crawl yet.
pub const NO_CRAWLER_RUN_ID_DEFINED: &str = "NO_CRAWLER_RUN_ID_DEFINED";

const EXCLUDED_FROM_SERVER_CONFIG: &str = "excluded from server config side";
const EXCLUDED_FROM_REPO_CONFIG: &str = "excluded from repo config side";

/// A branch, compared by name only. Used as a map key for per-branch results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Branch {
    pub name: String,
}

impl Branch {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A file to fetch on each branch, optionally redirected by the repository-level config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileToParse {
    pub name: String,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

impl FileToParse {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            redirect_to: None,
        }
    }
}

/// Per-repository overrides, read from a file committed in the crawled repository itself.
///
/// ```yaml
/// excluded: false
/// filesToParse:
///   - name: pom.xml
///     redirectTo: sub/pom.xml
/// tags: [backend]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositoryConfig {
    pub excluded: bool,
    pub files_to_parse: Vec<FileToParse>,
    pub tags: Vec<String>,
}

impl RepositoryConfig {
    /// Name of the repository-level config file, looked up at the root of the default branch.
    pub const FILE_NAME: &'static str = ".githubCrawler";

    /// Parses the YAML content of a repository-level config file. Unknown fields are ignored
    /// and an empty file yields the default config.
    pub fn from_yaml(content: &str) -> Result<Self, SourceControlError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| {
            SourceControlError::RepoConfigParse(format!(
                "unable to parse config for repo - content : \"{content}\" ({e})"
            ))
        })
    }

    /// The path configured to be fetched instead of `file_name`, if any.
    pub fn redirection_for(&self, file_name: &str) -> Option<&str> {
        self.files_to_parse
            .iter()
            .find(|f| f.name == file_name)
            .and_then(|f| f.redirect_to.as_deref())
    }
}

/// An indicator to extract from a file, dispatched by `kind` to a registered parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl IndicatorDefinition {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// All the indicators to extract from one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorsToFetch {
    pub file: FileToParse,
    #[serde(default)]
    pub indicators: Vec<IndicatorDefinition>,
}

/// A repository as discovered on the platform, then enriched stage after stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub url: String,
    pub name: String,
    pub full_name: String,
    pub creation_date: DateTime<Utc>,
    pub last_update_date: DateTime<Utc>,
    pub default_branch: String,
    #[serde(default)]
    pub excluded: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub config: Option<RepositoryConfig>,
    #[serde(default)]
    pub branches_to_parse: BTreeSet<Branch>,
    #[serde(default)]
    pub indicators: BTreeMap<Branch, BTreeMap<String, String>>,
    #[serde(default)]
    pub misc_tasks_results: BTreeMap<Branch, BTreeMap<String, Value>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    pub crawler_run_id: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub owner_team: Option<String>,
}

impl Repository {
    /// A freshly discovered repository; `name` is the last segment of `full_name`.
    pub fn new(
        url: impl Into<String>,
        full_name: impl Into<String>,
        default_branch: impl Into<String>,
    ) -> Self {
        let full_name = full_name.into();
        let name = full_name
            .rsplit('/')
            .next()
            .unwrap_or(full_name.as_str())
            .to_string();
        let now = Utc::now();
        Self {
            url: url.into(),
            name,
            full_name,
            creation_date: now,
            last_update_date: now,
            default_branch: default_branch.into(),
            excluded: false,
            reason: None,
            skipped: false,
            config: None,
            branches_to_parse: BTreeSet::new(),
            indicators: BTreeMap::new(),
            misc_tasks_results: BTreeMap::new(),
            tags: Vec::new(),
            groups: Vec::new(),
            crawler_run_id: NO_CRAWLER_RUN_ID_DEFINED.to_string(),
            topics: Vec::new(),
            owner_team: None,
        }
    }

    pub fn default_branch(&self) -> Branch {
        Branch::new(self.default_branch.clone())
    }

    /// Applies the server-side exclusion (or inclusion) patterns to the repository name.
    /// Exclusion is monotonic: an excluded repository is returned as is.
    pub fn flag_as_excluded_if_required(self, filter: &RepositoryFilter) -> Repository {
        if self.excluded {
            return self;
        }

        if filter.has_exclusions() {
            if filter.matches_exclusion(&self.name) {
                info!(repo = %self.name, "excluding repo because of server config");
                return Repository {
                    excluded: true,
                    reason: Some(EXCLUDED_FROM_SERVER_CONFIG.to_string()),
                    ..self
                };
            }
        } else if filter.has_inclusions() && !filter.matches_inclusion(&self.name) {
            info!(
                repo = %self.name,
                "excluding repo because of server config - not matching the inclusion pattern"
            );
            return Repository {
                excluded: true,
                reason: Some(EXCLUDED_FROM_SERVER_CONFIG.to_string()),
                ..self
            };
        }

        self
    }

    /// Layers the repository-level `excluded` flag on top of the server-side one.
    pub fn flag_as_excluded_if_configured_at_repo_level(self) -> Repository {
        if self.excluded {
            return self;
        }

        match &self.config {
            Some(config) if config.excluded => {
                info!(repo = %self.name, "excluding repo because of repo config");
                Repository {
                    excluded: true,
                    reason: Some(EXCLUDED_FROM_REPO_CONFIG.to_string()),
                    ..self
                }
            }
            _ => self,
        }
    }

    /// Seeds `tags` with the platform topics, then appends the repository-level config tags.
    pub fn copy_tags_from_topics(self) -> Repository {
        let mut tags = self.topics.clone();
        if let Some(config) = &self.config {
            for tag in &config.tags {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        Repository { tags, ..self }
    }

    pub fn add_groups(self, groups: &[String]) -> Repository {
        if groups.is_empty() {
            return self;
        }
        Repository {
            groups: groups.to_vec(),
            ..self
        }
    }

    pub fn with_crawler_run_id(self, crawler_run_id: &str) -> Repository {
        debug!(repo = %self.name, crawler_run_id, "stamping crawler run id");
        Repository {
            crawler_run_id: crawler_run_id.to_string(),
            ..self
        }
    }

    pub fn indicators_for_branch(&self, branch_name: &str) -> BTreeMap<String, String> {
        self.indicators
            .get(&Branch::new(branch_name))
            .cloned()
            .unwrap_or_default()
    }
}

/// Outcome of a code search restricted to one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<SearchResultItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub login: String,
}

/// A commit with its author (absent when the platform couldn't map it to an account)
/// and the number of added plus deleted lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedCommit {
    pub sha: String,
    pub author: Option<Author>,
    pub changed_lines: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_config_ignores_unknown_fields() {
        let config = RepositoryConfig::from_yaml(
            "excluded: true\nsomethingElse: 42\nfilesToParse:\n  - name: pom.xml\n    redirectTo: sub/pom.xml\n",
        )
        .expect("config should parse");

        assert!(config.excluded);
        assert_eq!(config.redirection_for("pom.xml"), Some("sub/pom.xml"));
        assert_eq!(config.redirection_for("package.json"), None);
    }

    #[test]
    fn empty_repository_config_is_default() {
        assert_eq!(
            RepositoryConfig::from_yaml("  \n").expect("empty config is valid"),
            RepositoryConfig::default()
        );
    }

    #[test]
    fn malformed_repository_config_is_a_parse_error() {
        let result = RepositoryConfig::from_yaml("excluded: [not, a, bool");
        assert!(matches!(result, Err(SourceControlError::RepoConfigParse(_))));
    }

    #[test]
    fn name_is_derived_from_full_name() {
        let repo = Repository::new("http://hello", "orgName/someRepo", "master");
        assert_eq!(repo.name, "someRepo");
        assert_eq!(repo.crawler_run_id, NO_CRAWLER_RUN_ID_DEFINED);
    }

    #[test]
    fn repo_level_exclusion_never_clears_server_exclusion() {
        let repo = Repository {
            excluded: true,
            reason: Some("excluded from server config side".into()),
            config: Some(RepositoryConfig::default()),
            ..Repository::new("http://hello", "orgName/foo-service", "master")
        };

        let repo = repo.flag_as_excluded_if_configured_at_repo_level();

        assert!(repo.excluded);
        assert_eq!(repo.reason.as_deref(), Some("excluded from server config side"));
    }

    #[test]
    fn tags_are_seeded_from_topics_then_config() {
        let repo = Repository {
            topics: vec!["java".into(), "backend".into()],
            config: Some(RepositoryConfig {
                tags: vec!["backend".into(), "critical".into()],
                ..RepositoryConfig::default()
            }),
            ..Repository::new("http://hello", "orgName/someRepo", "master")
        };

        assert_eq!(
            repo.copy_tags_from_topics().tags,
            vec!["java".to_string(), "backend".to_string(), "critical".to_string()]
        );
    }
}
