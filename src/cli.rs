//! Command line interface: argument parsing and the `crawl` entrypoint.
//!
//! All crawling logic lives in `repo-crawler-core`; this module only wires the loaded
//! configuration to the GitHub client and the configured output sinks.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use repo_crawler_core::contract::SourceControlClient;
use repo_crawler_core::crawler::{CrawlReport, Crawler};

use crate::github::GitHubClient;
use crate::load_config::load_config;
use crate::output::build_outputs;

/// CLI for repo-crawler: crawl an organization's repositories and publish indicators.
#[derive(Parser)]
#[clap(
    name = "repo-crawler",
    version,
    about = "Crawl the repositories of an organization and publish indicators about them"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl every repository of the configured organization once
    Crawl {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Group added to every published repository, on top of the configured ones
        #[clap(long = "group")]
        groups: Vec<String>,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Crawl { config, groups } => {
            let mut config = load_config(config)?;
            config.crawler.groups.extend(groups);
            tracing::info!(command = "crawl", groups = ?config.crawler.groups, "Starting crawl");

            let client: Arc<dyn SourceControlClient> =
                Arc::new(GitHubClient::new(&config.crawler.source_control));
            let outputs = build_outputs(&config.outputs)
                .map_err(|e| anyhow::anyhow!("Unable to create outputs: {e}"))?;
            let crawler = Crawler::with_builtin(client, outputs, config.crawler)?;

            match crawler.crawl().await {
                Ok(report) => {
                    tracing::info!(
                        command = "crawl",
                        run_id = %report.crawler_run_id,
                        published = report.published.len(),
                        filtered_out = report.filtered_out.len(),
                        failed = report.failed.len(),
                        "Crawl complete"
                    );
                    print_summary(&report);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "crawl", error = %e, "Crawl failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}

fn print_summary(report: &CrawlReport) {
    println!("Crawl {} complete.", report.crawler_run_id);
    println!(
        "published: {}, filtered out: {}, failed: {}",
        report.published.len(),
        report.filtered_out.len(),
        report.failed.len()
    );
    for failed in &report.failed {
        println!("  failed {}: {}", failed.full_name, failed.reason);
    }
}
