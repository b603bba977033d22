//! Top-level crawl: validate → build tasks → fetch repositories → enrich and publish
//! each repository → finalize outputs.
//!
//! # Responsibilities
//! - Fails fast, before touching any repository, on configuration errors and when the
//!   repository list can't be fetched.
//! - Processes repositories one after the other, or concurrently (bounded by
//!   `max_parallel_repositories`) when `crawl_in_parallel` is set. Stages run in the same
//!   order in both modes.
//! - A repository whose enrichment fails is logged and reported as failed; the run goes on.
//! - Output errors are logged and never abort the run.
//!
//! # Navigation
//! - Main entrypoint: [`Crawler::crawl`]
//! - Outcome: [`CrawlReport`]

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::config::{CrawlerConfig, RepositoryFilter};
use crate::contract::{OutputSink, RepoTask, SourceControlClient};
use crate::enricher::RepositoryEnricher;
use crate::error::{CrawlError, EnrichmentError, RegistryError};
use crate::model::Repository;
use crate::ownership::MembershipResolver;
use crate::registry::IndicatorParserRegistry;
use crate::validator::ConfigValidator;

/// What happened to the repositories of one crawl run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    pub crawler_run_id: String,
    /// Published repositories, sorted by full name.
    pub published: Vec<Repository>,
    /// Full names of the excluded repositories that weren't published.
    pub filtered_out: Vec<String>,
    pub failed: Vec<FailedRepository>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRepository {
    pub full_name: String,
    pub reason: String,
}

enum Outcome {
    Published(Repository),
    FilteredOut(String),
    Failed(FailedRepository),
}

/// Per-run values shared by every repository.
struct RunContext {
    crawler_run_id: String,
    filter: RepositoryFilter,
    tasks: Vec<Arc<dyn RepoTask>>,
}

pub struct Crawler {
    client: Arc<dyn SourceControlClient>,
    registry: Arc<IndicatorParserRegistry>,
    enricher: RepositoryEnricher,
    outputs: Vec<Arc<dyn OutputSink>>,
    config: Arc<CrawlerConfig>,
}

impl Crawler {
    pub fn new(
        client: Arc<dyn SourceControlClient>,
        registry: Arc<IndicatorParserRegistry>,
        outputs: Vec<Arc<dyn OutputSink>>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            enricher: RepositoryEnricher::new(client.clone(), registry.clone()),
            client,
            registry,
            outputs,
            config: Arc::new(config),
        }
    }

    /// A crawler using every built-in parser and task.
    pub fn with_builtin(
        client: Arc<dyn SourceControlClient>,
        outputs: Vec<Arc<dyn OutputSink>>,
        config: CrawlerConfig,
    ) -> Result<Self, RegistryError> {
        let resolver = Arc::new(MembershipResolver::new(
            client.clone(),
            config.source_control.organization_name.clone(),
            config.excluded_teams.clone(),
        ));
        let registry = Arc::new(IndicatorParserRegistry::with_builtin(
            client.clone(),
            resolver,
        )?);
        Ok(Self::new(client, registry, outputs, config))
    }

    pub async fn crawl(&self) -> Result<CrawlReport, CrawlError> {
        info!("[CRAWL] Starting crawl");

        let errors = ConfigValidator::new(
            self.config.clone(),
            self.registry.clone(),
            self.client.clone(),
        )
        .validation_errors()
        .await;
        if !errors.is_empty() {
            error!(nb_errors = errors.len(), "[CRAWL][ERROR] Config validation failed");
            return Err(CrawlError::InvalidConfig(errors));
        }

        let tasks = self.build_tasks()?;
        let filter = RepositoryFilter::from_patterns(
            &self.config.repositories_to_exclude,
            &self.config.repositories_to_include,
        )
        .map_err(|e| CrawlError::InvalidConfig(vec![e.to_string()]))?;

        let organization = &self.config.source_control.organization_name;
        let repositories = self
            .client
            .fetch_repositories(organization)
            .await
            .map_err(|source| {
                error!(%organization, error = %source, "[CRAWL][ERROR] Unable to fetch repositories");
                CrawlError::FetchRepositories {
                    organization: organization.clone(),
                    source,
                }
            })?;
        let repositories = dedupe_by_full_name(repositories);
        info!(%organization, nb_repositories = repositories.len(), "[CRAWL] Repositories fetched");

        let crawler_run_id = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        info!(%crawler_run_id, groups = ?self.config.groups, "[CRAWL] Crawler run id");

        let context = RunContext {
            crawler_run_id: crawler_run_id.clone(),
            filter,
            tasks,
        };

        let outcomes: Vec<Outcome> = if self.config.crawl_in_parallel {
            stream::iter(repositories)
                .map(|repository| self.process(repository, &context))
                .buffer_unordered(self.config.max_parallel_repositories.max(1))
                .collect()
                .await
        } else {
            let mut outcomes = Vec::new();
            for repository in repositories {
                outcomes.push(self.process(repository, &context).await);
            }
            outcomes
        };

        self.finalize_outputs().await;

        let mut report = CrawlReport {
            crawler_run_id,
            ..CrawlReport::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Published(repository) => report.published.push(repository),
                Outcome::FilteredOut(full_name) => report.filtered_out.push(full_name),
                Outcome::Failed(failed) => report.failed.push(failed),
            }
        }
        report.published.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        report.filtered_out.sort();
        report.failed.sort_by(|a, b| a.full_name.cmp(&b.full_name));

        info!(
            crawler_run_id = %report.crawler_run_id,
            published = report.published.len(),
            filtered_out = report.filtered_out.len(),
            failed = report.failed.len(),
            "[CRAWL] Crawl complete"
        );
        Ok(report)
    }

    fn build_tasks(&self) -> Result<Vec<Arc<dyn RepoTask>>, RegistryError> {
        self.config
            .misc_repository_tasks
            .iter()
            .map(|definition| {
                self.registry
                    .task_builder_by_type(&definition.kind)?
                    .build(&definition.name, &definition.params)
            })
            .collect()
    }

    async fn process(&self, repository: Repository, context: &RunContext) -> Outcome {
        let full_name = repository.full_name.clone();
        info!(repo = %repository.name, "[CRAWL] Processing repository");

        match self.enrich_and_publish(repository, context).await {
            Ok(Some(repository)) => Outcome::Published(repository),
            Ok(None) => Outcome::FilteredOut(full_name),
            Err(e) => {
                error!(repo = %full_name, error = %e, "[CRAWL][ERROR] Repository processing failed");
                Outcome::Failed(FailedRepository {
                    full_name,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// `Ok(None)` when the repository was filtered out.
    async fn enrich_and_publish(
        &self,
        repository: Repository,
        context: &RunContext,
    ) -> Result<Option<Repository>, EnrichmentError> {
        let repository = repository.flag_as_excluded_if_required(&context.filter);
        if !self.should_keep_for_further_processing(&repository) {
            return Ok(None);
        }

        let repository = self
            .enricher
            .load_repo_specific_config_if_any(repository)
            .await?
            .flag_as_excluded_if_configured_at_repo_level();
        if !self.should_keep_for_further_processing(&repository) {
            return Ok(None);
        }

        let repository = repository
            .with_crawler_run_id(&context.crawler_run_id)
            .copy_tags_from_topics()
            .add_groups(&self.config.groups);

        let repository = self
            .enricher
            .identify_branches_to_parse(repository, self.config.crawl_all_branches)
            .await?;
        let repository = self
            .enricher
            .fetch_indicators_values(repository, &self.config.indicators_to_fetch_by_file)
            .await?;
        let repository = self
            .enricher
            .perform_misc_tasks(repository, &context.tasks)
            .await?;

        self.publish(&repository).await;
        Ok(Some(repository))
    }

    fn should_keep_for_further_processing(&self, repository: &Repository) -> bool {
        if self.config.publish_excluded_repositories {
            return true;
        }
        if repository.excluded {
            info!(repo = %repository.name, "filtering out repo from further processing");
            return false;
        }
        true
    }

    async fn publish(&self, repository: &Repository) {
        for output in &self.outputs {
            if let Err(e) = output.output(repository).await {
                warn!(repo = %repository.full_name, error = %e, "unable to publish results for repo");
            }
        }
    }

    async fn finalize_outputs(&self) {
        for output in &self.outputs {
            if let Err(e) = output.finalize_output().await {
                warn!(error = %e, "problem while calling finalize on an output");
            }
        }
    }
}

/// Keeps the first repository seen for each full name.
fn dedupe_by_full_name(repositories: Vec<Repository>) -> Vec<Repository> {
    let mut seen = HashSet::new();
    repositories
        .into_iter()
        .filter(|r| seen.insert(r.full_name.clone()))
        .collect()
}
