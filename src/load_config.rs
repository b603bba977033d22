//! Loads the YAML configuration file into a [`CliConfig`], injecting secrets from the environment.
//!
//! # Accepted YAML
//! ```yaml
//! crawler:
//!   source_control:
//!     type: GITHUB
//!     url: https://api.github.com
//!     organization_name: my-org
//!   indicators_to_fetch_by_file:
//!     - file:
//!         name: pom.xml
//!       indicators:
//!         - name: spring_boot_version
//!           type: findDependencyVersionInXml
//!           params:
//!             artifactId: spring-boot-starter-parent
//! outputs:
//!   - type: console
//! ```
//!
//! The API token is never read from the file when [`API_TOKEN_ENV_VAR`] is set.

use std::fs;
use std::path::Path;

use anyhow::Result;
use repo_crawler_core::config::CrawlerConfig;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::output::OutputConfig;

pub const API_TOKEN_ENV_VAR: &str = "CRAWLER_API_TOKEN";

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    match std::env::var(API_TOKEN_ENV_VAR) {
        Ok(token) if !token.trim().is_empty() => {
            info!(env_var = API_TOKEN_ENV_VAR, "API token taken from environment");
            config.crawler.source_control.api_token = Some(token);
        }
        _ if config.crawler.source_control.api_token.is_none() => {
            warn!(
                env_var = API_TOKEN_ENV_VAR,
                "No API token configured, calls will be anonymous"
            );
        }
        _ => {}
    }

    if config.outputs.is_empty() {
        warn!("No output configured, crawl results will only be logged");
    }

    config.crawler.trace_loaded();
    Ok(config)
}
