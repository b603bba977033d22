//! Built-in [`ContentParser`](crate::contract::ContentParser) implementations.
//!
//! A parser never fails: a missing value yields [`NOT_FOUND`], a misconfigured indicator
//! yields [`CONFIG_ISSUE`] and unparseable content yields an `"issue while parsing ..."`
//! (or `"error while processing ..."`) message, always under the indicator name.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::contract::ContentParser;
use crate::model::IndicatorDefinition;

pub mod file_path;
pub mod json_path;
pub mod regex;
pub mod xml;
pub mod yaml;

pub use self::file_path::FilePathParser;
pub use self::json_path::{JsonPathParser, NpmDependencyVersionParser};
pub use self::regex::FirstMatchingRegexpParser;
pub use self::xml::{CountXmlElementsParser, PomDependencyVersionParser};
pub use self::yaml::YamlPropertyValueParser;

pub const NOT_FOUND: &str = "not found";
pub const CONFIG_ISSUE: &str = "issue in config, check logs";

/// One instance of every built-in parser.
pub fn builtin_parsers() -> Vec<Arc<dyn ContentParser>> {
    vec![
        Arc::new(FirstMatchingRegexpParser),
        Arc::new(YamlPropertyValueParser),
        Arc::new(JsonPathParser),
        Arc::new(NpmDependencyVersionParser),
        Arc::new(PomDependencyVersionParser),
        Arc::new(CountXmlElementsParser),
        Arc::new(FilePathParser),
    ]
}

fn single(definition: &IndicatorDefinition, value: impl Into<String>) -> BTreeMap<String, String> {
    BTreeMap::from([(definition.name.clone(), value.into())])
}

/// The mandatory `param` of `definition`, or `None` after logging the misconfiguration.
fn required_param<'a>(definition: &'a IndicatorDefinition, param: &str) -> Option<&'a str> {
    let value = definition.param(param).filter(|v| !v.trim().is_empty());
    if value.is_none() {
        warn!(
            indicator = %definition.name,
            parser = %definition.kind,
            param,
            "please define the param in your config for this indicator"
        );
    }
    value
}
