use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::warn;

use super::{required_param, single, CONFIG_ISSUE, NOT_FOUND};
use crate::contract::ContentParser;
use crate::model::IndicatorDefinition;

/// `findPropertyValueInYamlFile`: value of a dotted property (`spring.application.name`).
///
/// Keys may be written flat (`spring.application.name: x`), nested, or any mix of both.
/// In a multi-document file the first document holding the property wins.
pub struct YamlPropertyValueParser;

impl YamlPropertyValueParser {
    pub const NAME: &'static str = "findPropertyValueInYamlFile";
    pub const PROPERTY_NAME: &'static str = "propertyName";
}

impl ContentParser for YamlPropertyValueParser {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parse(
        &self,
        content: &str,
        _file_path: &str,
        definition: &IndicatorDefinition,
    ) -> BTreeMap<String, String> {
        let Some(property_name) = required_param(definition, Self::PROPERTY_NAME) else {
            return single(definition, CONFIG_ISSUE);
        };

        for document in serde_yaml::Deserializer::from_str(content) {
            let value = match Value::deserialize(document) {
                Ok(value) => value,
                Err(e) => {
                    warn!(indicator = %definition.name, error = %e, "problem while parsing yaml file");
                    return single(definition, format!("issue while parsing {e}"));
                }
            };

            if let Value::Mapping(mapping) = value {
                let components: Vec<&str> = property_name.split('.').collect();
                if let Some(found) = find_property(&mapping, &components) {
                    return single(definition, found);
                }
            }
        }

        single(definition, NOT_FOUND)
    }
}

/// Looks up `components` in `mapping`, trying every split between a flat key prefix
/// (`a.b`) and the nested remainder, shortest prefix first.
fn find_property(mapping: &Mapping, components: &[&str]) -> Option<String> {
    for prefix_len in 1..=components.len() {
        let key = components[..prefix_len].join(".");
        let Some(value) = mapping.get(key.as_str()) else {
            continue;
        };

        let rest = &components[prefix_len..];
        let found = match (value, rest.is_empty()) {
            (Value::Mapping(nested), false) => find_property(nested, rest),
            (scalar, true) => scalar_to_string(scalar),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
