//! Per-repository enrichment stages.
//!
//! Each stage takes a [`Repository`] by value and returns a new snapshot. Excluded
//! repositories go through the config, indicator and misc-task stages untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::contract::{RepoTask, SourceControlClient};
use crate::error::{EnrichmentError, SourceControlError};
use crate::model::{Branch, IndicatorDefinition, IndicatorsToFetch, Repository};
use crate::registry::IndicatorParserRegistry;
use crate::tasks::ownership::OWNING_TEAM_INDICATOR;

pub struct RepositoryEnricher {
    client: Arc<dyn SourceControlClient>,
    registry: Arc<IndicatorParserRegistry>,
}

impl RepositoryEnricher {
    pub fn new(
        client: Arc<dyn SourceControlClient>,
        registry: Arc<IndicatorParserRegistry>,
    ) -> Self {
        Self { client, registry }
    }

    /// Attaches the repository-level config, if the repository has one.
    ///
    /// A config that can't be parsed marks the repository as skipped, with the parse
    /// error as reason.
    pub async fn load_repo_specific_config_if_any(
        &self,
        repository: Repository,
    ) -> Result<Repository, EnrichmentError> {
        if repository.excluded {
            return Ok(repository);
        }

        debug!(repo = %repository.full_name, "loading repo config");
        match self
            .client
            .fetch_repo_config(&repository.full_name, &repository.default_branch)
            .await
        {
            Ok(config) => {
                debug!(repo = %repository.full_name, ?config, "repo config found");
                Ok(Repository {
                    config: Some(config),
                    ..repository
                })
            }
            Err(SourceControlError::NoFileFound(_)) => Ok(repository),
            Err(SourceControlError::RepoConfigParse(reason)) => {
                warn!(repo = %repository.full_name, %reason, "problem while parsing repo config, skipping");
                Ok(Repository {
                    skipped: true,
                    reason: Some(reason),
                    ..repository
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every branch of the repository when `crawl_all_branches`, the default branch otherwise.
    pub async fn identify_branches_to_parse(
        &self,
        repository: Repository,
        crawl_all_branches: bool,
    ) -> Result<Repository, EnrichmentError> {
        let branches_to_parse: BTreeSet<Branch> = if crawl_all_branches {
            self.client
                .fetch_repo_branches(&repository.full_name)
                .await?
                .into_iter()
                .collect()
        } else {
            BTreeSet::from([repository.default_branch()])
        };
        debug!(repo = %repository.full_name, nb_branches = branches_to_parse.len(), "branches to parse identified");

        Ok(Repository {
            branches_to_parse,
            ..repository
        })
    }

    /// Fetches every configured file on every branch to parse and extracts its indicators.
    ///
    /// A file that can't be fetched contributes no indicator. When several indicators
    /// share a name, the last one in configuration order wins.
    pub async fn fetch_indicators_values(
        &self,
        repository: Repository,
        indicators_to_fetch: &[IndicatorsToFetch],
    ) -> Result<Repository, EnrichmentError> {
        if repository.excluded {
            return Ok(repository);
        }

        let mut indicators = BTreeMap::new();
        for branch in &repository.branches_to_parse {
            let mut found = BTreeMap::new();
            for to_fetch in indicators_to_fetch {
                found.extend(
                    self.fetch_file_and_parse_indicators(&repository, branch, to_fetch)
                        .await?,
                );
            }
            indicators.insert(branch.clone(), found);
        }

        Ok(Repository {
            indicators,
            ..repository
        })
    }

    async fn fetch_file_and_parse_indicators(
        &self,
        repository: &Repository,
        branch: &Branch,
        to_fetch: &IndicatorsToFetch,
    ) -> Result<BTreeMap<String, String>, EnrichmentError> {
        let file_name = &to_fetch.file.name;
        let redirection = repository
            .config
            .as_ref()
            .and_then(|c| c.redirection_for(file_name));

        let path = match redirection {
            Some(redirect_to) => {
                info!(repo = %repository.full_name, file = %file_name, redirect_to, "redirection found");
                redirect_to
            }
            None => file_name.as_str(),
        };

        let content = match self
            .client
            .fetch_file_content(&repository.full_name, &branch.name, path)
            .await
        {
            Ok(content) => content,
            Err(SourceControlError::NoFileFound(_)) => {
                debug!(repo = %repository.full_name, %branch, path, "file not found");
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                warn!(repo = %repository.full_name, %branch, path, error = %e, "unable to fetch file, ignoring it");
                return Ok(BTreeMap::new());
            }
        };

        self.parse_indicators(&content, path, &to_fetch.indicators)
    }

    fn parse_indicators(
        &self,
        content: &str,
        path: &str,
        definitions: &[IndicatorDefinition],
    ) -> Result<BTreeMap<String, String>, EnrichmentError> {
        let mut found = BTreeMap::new();
        for definition in definitions {
            let parser = self.registry.parser_by_name(&definition.kind)?;
            found.extend(parser.parse(content, path, definition));
        }
        Ok(found)
    }

    /// Runs every task and merges its per-branch result into the existing ones.
    pub async fn perform_misc_tasks(
        &self,
        repository: Repository,
        tasks: &[Arc<dyn RepoTask>],
    ) -> Result<Repository, EnrichmentError> {
        if repository.excluded {
            return Ok(repository);
        }

        info!(repo = %repository.full_name, nb_tasks = tasks.len(), "performing misc tasks");
        let mut results = repository.misc_tasks_results.clone();
        for task in tasks {
            debug!(repo = %repository.full_name, task = task.name(), "performing task");
            for (branch, (indicator, value)) in task.perform(&repository).await? {
                results.entry(branch).or_default().insert(indicator, value);
            }
        }

        let owner_team = results
            .get(&repository.default_branch())
            .and_then(|r| r.get(OWNING_TEAM_INDICATOR))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or(repository.owner_team.clone());

        Ok(Repository {
            misc_tasks_results: results,
            owner_team,
            ..repository
        })
    }
}
