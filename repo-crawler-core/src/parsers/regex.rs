use std::collections::BTreeMap;

use ::regex::Regex;
use tracing::{debug, warn};

use super::{required_param, single, CONFIG_ISSUE, NOT_FOUND};
use crate::contract::ContentParser;
use crate::model::IndicatorDefinition;

/// `findFirstValueWithRegexpCapture`: value of the single capturing group of `pattern`,
/// taken from its first match in the file.
pub struct FirstMatchingRegexpParser;

impl FirstMatchingRegexpParser {
    pub const NAME: &'static str = "findFirstValueWithRegexpCapture";
    pub const PATTERN: &'static str = "pattern";
}

impl ContentParser for FirstMatchingRegexpParser {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parse(
        &self,
        content: &str,
        _file_path: &str,
        definition: &IndicatorDefinition,
    ) -> BTreeMap<String, String> {
        let Some(pattern) = required_param(definition, Self::PATTERN) else {
            return single(definition, CONFIG_ISSUE);
        };

        let regex = match Regex::new(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(indicator = %definition.name, error = %e, "invalid regex in config");
                return single(definition, CONFIG_ISSUE);
            }
        };

        // group 0 is the whole match
        if regex.captures_len() != 2 {
            warn!(
                indicator = %definition.name,
                pattern,
                "double check the regex config, it needs exactly one capturing group"
            );
            return single(definition, CONFIG_ISSUE);
        }

        let value = regex
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        debug!(indicator = %definition.name, found = value.is_some(), "regex parsed");

        single(definition, value.unwrap_or_else(|| NOT_FOUND.to_string()))
    }
}
