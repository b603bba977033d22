//! repo-crawler: the runnable side of the crawler.
//!
//! Crawling logic lives in `repo-crawler-core`. This crate adds the GitHub REST client, the
//! output sinks, YAML configuration loading and the command line interface.

pub mod cli;
pub mod github;
pub mod load_config;
pub mod output;

pub use cli::{run, Cli, Commands};
