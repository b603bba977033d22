use std::sync::Arc;

use regex::Regex;
use tracing::{error, info};

use crate::config::{CrawlerConfig, SourceControlType};
use crate::contract::SourceControlClient;
use crate::error::SourceControlError;
use crate::registry::IndicatorParserRegistry;

/// Checks a [`CrawlerConfig`] before any repository is fetched.
///
/// Static checks are all collected. The remote check only runs once they pass.
pub struct ConfigValidator {
    config: Arc<CrawlerConfig>,
    registry: Arc<IndicatorParserRegistry>,
    client: Arc<dyn SourceControlClient>,
}

impl ConfigValidator {
    pub fn new(
        config: Arc<CrawlerConfig>,
        registry: Arc<IndicatorParserRegistry>,
        client: Arc<dyn SourceControlClient>,
    ) -> Self {
        Self {
            config,
            registry,
            client,
        }
    }

    /// Every problem found in the config; empty when the crawl can start.
    pub async fn validation_errors(&self) -> Vec<String> {
        let errors = self.static_errors();
        if !errors.is_empty() {
            return errors;
        }

        let source_control = &self.config.source_control;
        match self
            .client
            .validate_remote_config(&source_control.organization_name)
            .await
        {
            Ok(()) => {
                info!(organization = %source_control.organization_name, "remote config validated");
                Vec::new()
            }
            Err(SourceControlError::NoReachableRepositories(cause)) => {
                let message = format!(
                    "Not able to fetch repositories from the organization {} on URL {}. This could be due to several things :\n\
                     \t\t - URL should be the API URL. For github.com it's https://api.github.com, for Github Enterprise, it's usually https://myGHEserver/api/v3 (no trailing slash)\n\
                     \t\t - the organization doesn't exist\n\
                     \t\t - remote server is not reachable (are you using a proxy ?)\n\
                     \t\t - are you using a valid token ?",
                    source_control.organization_name, source_control.url
                );
                error!(%cause, "{message}");
                vec![message]
            }
            Err(e) => {
                error!(error = %e, "unable to validate remote config");
                vec![format!("unable to validate remote config: {e}")]
            }
        }
    }

    fn static_errors(&self) -> Vec<String> {
        let config = &self.config;
        let mut errors = Vec::new();

        if config.source_control.url.trim().is_empty() {
            errors.push("source-control.url can't be empty".to_string());
        }
        if config.source_control.organization_name.trim().is_empty() {
            errors.push("organization can't be empty".to_string());
        }
        if config.source_control.kind != SourceControlType::Github {
            errors.push(format!(
                "source-control type {} is not supported by this build",
                config.source_control.kind
            ));
        }

        if !config.repositories_to_exclude.is_empty() && !config.repositories_to_include.is_empty() {
            errors.push(
                "repositories to exclude and repositories to include can't be both configured"
                    .to_string(),
            );
        }
        for (kind, patterns) in [
            ("exclusion", &config.repositories_to_exclude),
            ("inclusion", &config.repositories_to_include),
        ] {
            for pattern in patterns {
                if let Err(e) = Regex::new(pattern) {
                    errors.push(format!("invalid {kind} pattern '{pattern}': {e}"));
                }
            }
        }

        for to_fetch in &config.indicators_to_fetch_by_file {
            for indicator in &to_fetch.indicators {
                if !self.registry.has_parser(&indicator.kind) {
                    errors.push(format!(
                        "indicator '{}' on file '{}' uses an unknown parser type: {}",
                        indicator.name, to_fetch.file.name, indicator.kind
                    ));
                }
            }
        }

        for task in &config.misc_repository_tasks {
            if !self.registry.has_task_type(&task.kind) {
                errors.push(format!(
                    "misc task '{}' uses an unknown task type: {}",
                    task.name, task.kind
                ));
            }
        }

        if config.max_parallel_repositories == 0 {
            errors.push("max_parallel_repositories must be greater than 0".to_string());
        }

        errors
    }
}
