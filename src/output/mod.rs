//! Output sinks receiving every published repository.
//!
//! Sinks are declared in the `outputs` section of the configuration file and built once per
//! run by [`build_outputs`]. File based sinks create their file when built, append on every
//! [`OutputSink::output`] call and close it after each write.

mod ci_droid_csv;
mod ci_droid_json;
mod console;
mod file;
mod http;
mod recent_repositories_csv;
mod search_pattern_csv;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use repo_crawler_core::contract::OutputSink;
use repo_crawler_core::model::{Branch, Repository};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

pub use ci_droid_csv::CiDroidReadyCsvFileOutput;
pub use ci_droid_json::CiDroidReadyJsonFileOutput;
pub use console::ConsoleOutput;
pub use file::FileOutput;
pub use http::{HttpOutput, OutputIndicator};
pub use recent_repositories_csv::RecentRepositoriesCsvFileOutput;
pub use search_pattern_csv::SearchPatternInCodeCsvFileOutput;

/// Timestamp used in output file names.
pub(crate) const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
pub(crate) const CI_DROID_FILE_PREFIX: &str = "CIdroidReadyContent_";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputConfig {
    Console,
    File {
        filename_prefix: String,
        #[serde(default = "default_directory")]
        directory: PathBuf,
    },
    CiDroidCsv {
        indicators_to_output: Vec<String>,
        #[serde(default = "default_directory")]
        directory: PathBuf,
    },
    CiDroidJson {
        indicators_to_output: Vec<String>,
        #[serde(default)]
        with_tags: bool,
        #[serde(default = "default_directory")]
        directory: PathBuf,
    },
    Http {
        target_url: String,
    },
    SearchPatternInCodeCsv {
        search_name_to_output: String,
        #[serde(default = "default_directory")]
        directory: PathBuf,
    },
    RecentRepositoriesCsv {
        #[serde(default = "default_directory")]
        directory: PathBuf,
    },
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

/// Builds every configured sink. File sinks create their file here, so an unwritable
/// directory fails the run before any repository is crawled.
pub fn build_outputs(configs: &[OutputConfig]) -> std::io::Result<Vec<Arc<dyn OutputSink>>> {
    let timestamp = Local::now().format(FILE_TIMESTAMP_FORMAT).to_string();
    let mut outputs: Vec<Arc<dyn OutputSink>> = Vec::with_capacity(configs.len());

    for config in configs {
        let output: Arc<dyn OutputSink> = match config {
            OutputConfig::Console => Arc::new(ConsoleOutput),
            OutputConfig::File {
                filename_prefix,
                directory,
            } => Arc::new(FileOutput::create(directory, filename_prefix, &timestamp)?),
            OutputConfig::CiDroidCsv {
                indicators_to_output,
                directory,
            } => Arc::new(CiDroidReadyCsvFileOutput::create(
                directory,
                indicators_to_output.clone(),
                &timestamp,
            )?),
            OutputConfig::CiDroidJson {
                indicators_to_output,
                with_tags,
                directory,
            } => Arc::new(CiDroidReadyJsonFileOutput::create(
                directory,
                indicators_to_output.clone(),
                *with_tags,
                &timestamp,
            )?),
            OutputConfig::Http { target_url } => Arc::new(HttpOutput::new(target_url.clone())),
            OutputConfig::SearchPatternInCodeCsv {
                search_name_to_output,
                directory,
            } => Arc::new(SearchPatternInCodeCsvFileOutput::create(
                directory,
                search_name_to_output.clone(),
                &timestamp,
            )?),
            OutputConfig::RecentRepositoriesCsv { directory } => {
                Arc::new(RecentRepositoriesCsvFileOutput::create(directory, &timestamp)?)
            }
        };
        outputs.push(output);
    }

    info!(count = outputs.len(), "Output sinks built");
    Ok(outputs)
}

/// File indicators and misc task results of each branch in a single map.
/// On a name clash the file indicator wins.
pub(crate) fn all_indicators(repository: &Repository) -> BTreeMap<Branch, BTreeMap<String, Value>> {
    let mut merged: BTreeMap<Branch, BTreeMap<String, Value>> = repository
        .misc_tasks_results
        .iter()
        .map(|(branch, results)| (branch.clone(), results.clone()))
        .collect();

    for (branch, indicators) in &repository.indicators {
        merged.entry(branch.clone()).or_default().extend(
            indicators
                .iter()
                .map(|(name, value)| (name.clone(), Value::String(value.clone()))),
        );
    }
    merged
}

/// Plain text rendering of an indicator value: strings unquoted, anything else as JSON.
pub(crate) fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
