//! Name-based lookup of content parsers and repository task builders.
//!
//! Built once at startup from explicit lists and read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::contract::{ContentParser, SourceControlClient, TaskBuilder};
use crate::error::RegistryError;
use crate::ownership::MembershipResolver;
use crate::parsers::builtin_parsers;
use crate::tasks::builtin_task_builders;

pub struct IndicatorParserRegistry {
    parsers: HashMap<String, Arc<dyn ContentParser>>,
    task_builders: HashMap<String, Arc<dyn TaskBuilder>>,
}

impl IndicatorParserRegistry {
    /// Fails when two parsers share a name or two builders share a type.
    pub fn new(
        parsers: Vec<Arc<dyn ContentParser>>,
        task_builders: Vec<Arc<dyn TaskBuilder>>,
    ) -> Result<Self, RegistryError> {
        let mut parsers_by_name = HashMap::new();
        for parser in parsers {
            let name = parser.name().to_string();
            if parsers_by_name.insert(name.clone(), parser).is_some() {
                return Err(RegistryError::DuplicateParser(name));
            }
        }

        let mut builders_by_type = HashMap::new();
        for builder in task_builders {
            let task_type = builder.task_type().to_string();
            if builders_by_type.insert(task_type.clone(), builder).is_some() {
                return Err(RegistryError::DuplicateTaskType(task_type));
            }
        }

        let mut task_types: Vec<&str> = builders_by_type.keys().map(String::as_str).collect();
        task_types.sort_unstable();
        info!(nb_parsers = parsers_by_name.len(), "available parser(s)");
        info!(
            nb_task_builders = builders_by_type.len(),
            task_types = %task_types.join(", "),
            "available task builder(s)"
        );

        Ok(Self {
            parsers: parsers_by_name,
            task_builders: builders_by_type,
        })
    }

    /// Registry holding every built-in parser and task builder.
    pub fn with_builtin(
        client: Arc<dyn SourceControlClient>,
        resolver: Arc<MembershipResolver>,
    ) -> Result<Self, RegistryError> {
        Self::new(builtin_parsers(), builtin_task_builders(client, resolver))
    }

    pub fn parser_by_name(&self, name: &str) -> Result<Arc<dyn ContentParser>, RegistryError> {
        self.parsers
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownParser(name.to_string()))
    }

    pub fn task_builder_by_type(
        &self,
        task_type: &str,
    ) -> Result<Arc<dyn TaskBuilder>, RegistryError> {
        self.task_builders
            .get(task_type)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTaskType(task_type.to_string()))
    }

    pub fn has_parser(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    pub fn has_task_type(&self, task_type: &str) -> bool {
        self.task_builders.contains_key(task_type)
    }
}
