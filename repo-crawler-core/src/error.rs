//! Error types shared by the crawl pipeline.
//!
//! Errors are handled as close to their source as possible: a missing file degrades to an
//! empty indicator map, a malformed repository config marks the repository as skipped.
//! Only configuration errors and the initial repository fetch surface as [`CrawlError`].

use thiserror::Error;

/// Errors raised by a [`crate::contract::SourceControlClient`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceControlError {
    /// The requested file (or repository config) doesn't exist on the given branch.
    #[error("no file found: {0}")]
    NoFileFound(String),

    /// The repository-level config file exists but can't be parsed.
    #[error("unable to parse repository config: {0}")]
    RepoConfigParse(String),

    /// The platform endpoint or credentials are wrong: not even one call succeeds.
    #[error("no reachable repositories: {0}")]
    NoReachableRepositories(String),

    /// Any other transport or decoding failure.
    #[error("remote call failed: {0}")]
    Remote(String),
}

/// Lookup and construction errors of the parser/task registry. Always fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("file content parser name is unknown: {0}. please double check your config, the name must match one of the known values")]
    UnknownParser(String),

    #[error("repo task builder type is unknown: {0}. please double check your config, the type must match one of the known values")]
    UnknownTaskType(String),

    #[error("two file content parsers are registered under the same name: {0}")]
    DuplicateParser(String),

    #[error("two repo task builders are registered under the same type: {0}")]
    DuplicateTaskType(String),

    #[error("task '{task}' requires a '{param}' param")]
    MissingTaskParam { task: String, param: String },

    #[error("task '{task}' has an invalid '{param}' param: {value}")]
    InvalidTaskParam {
        task: String,
        param: String,
        value: String,
    },
}

/// A pipeline stage that couldn't complete for one repository.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnrichmentError {
    #[error(transparent)]
    SourceControl(#[from] SourceControlError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors raised by an [`crate::contract::OutputSink`]. Logged by the crawler, never fatal.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("output I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to serialize repository: {0}")]
    Serialization(String),

    #[error("output failed: {0}")]
    Other(String),
}

/// Errors that abort a whole crawl run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("there are some config validation errors - please double check the config.\n\t - {}", .0.join("\n\t - "))]
    InvalidConfig(Vec<String>),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("unable to fetch repositories of '{organization}': {source}")]
    FetchRepositories {
        organization: String,
        #[source]
        source: SourceControlError,
    },
}
