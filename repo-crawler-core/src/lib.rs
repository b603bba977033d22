#![doc = "repo-crawler-core: core logic library for repo-crawler."]

//! This crate contains the repository enrichment pipeline, the parser/task registry and
//! every built-in parser and task. It has no platform-specific transport: the
//! [`contract::SourceControlClient`] and [`contract::OutputSink`] implementations live in the
//! `repo-crawler` crate.
//!
//! # Usage
//! Build a [`crawler::Crawler`] from a client, a list of outputs and a
//! [`config::CrawlerConfig`], then call [`crawler::Crawler::crawl`].

pub mod config;
pub mod contract;
pub mod crawler;
pub mod enricher;
pub mod error;
pub mod model;
pub mod ownership;
pub mod parsers;
pub mod registry;
pub mod tasks;
pub mod validator;
