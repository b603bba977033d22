use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use super::{required_param, single, CONFIG_ISSUE, NOT_FOUND};
use crate::contract::ContentParser;
use crate::model::IndicatorDefinition;

const JSON_PATH: &str = "jsonPath";

/// `findValueForJsonPath`: value at a JSON path such as `$.engines.node`,
/// `$['dependencies']['@angular/core']` or `$.contributors[0].name`.
pub struct JsonPathParser;

impl JsonPathParser {
    pub const NAME: &'static str = "findValueForJsonPath";
}

/// `findNpmDependencyVersion`: same lookup, kept under its historical name for `package.json`.
pub struct NpmDependencyVersionParser;

impl NpmDependencyVersionParser {
    pub const NAME: &'static str = "findNpmDependencyVersion";
}

impl ContentParser for JsonPathParser {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parse(
        &self,
        content: &str,
        _file_path: &str,
        definition: &IndicatorDefinition,
    ) -> BTreeMap<String, String> {
        parse_with_json_path(content, definition)
    }
}

impl ContentParser for NpmDependencyVersionParser {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parse(
        &self,
        content: &str,
        _file_path: &str,
        definition: &IndicatorDefinition,
    ) -> BTreeMap<String, String> {
        parse_with_json_path(content, definition)
    }
}

fn parse_with_json_path(content: &str, definition: &IndicatorDefinition) -> BTreeMap<String, String> {
    let Some(path) = required_param(definition, JSON_PATH) else {
        return single(definition, CONFIG_ISSUE);
    };

    let segments = match parse_path(path) {
        Ok(segments) => segments,
        Err(e) => {
            warn!(indicator = %definition.name, json_path = path, error = %e, "invalid json path in config");
            return single(definition, CONFIG_ISSUE);
        }
    };

    let document: Value = match serde_json::from_str(content) {
        Ok(document) => document,
        Err(e) => {
            warn!(indicator = %definition.name, error = %e, "problem while parsing json file");
            return single(definition, format!("issue while parsing {e}"));
        }
    };

    let value = segments
        .iter()
        .try_fold(&document, |node, segment| match segment {
            Segment::Key(key) => node.get(key.as_str()),
            Segment::Index(i) => node.get(*i),
        })
        .and_then(value_to_string);

    single(definition, value.unwrap_or_else(|| NOT_FOUND.to_string()))
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items.first().and_then(|first| first.as_str()).map(str::to_string),
        _ => None,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment>, String> {
    let rest = path
        .trim()
        .strip_prefix('$')
        .ok_or_else(|| format!("'{path}' must start with '$'"))?;

    let chars: Vec<char> = rest.chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
                    end += 1;
                }
                if end == start {
                    return Err(format!("empty key at position {start} in '{path}'"));
                }
                segments.push(Segment::Key(chars[start..end].iter().collect()));
                i = end;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| format!("unclosed '[' in '{path}'"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                let inner = inner.trim();
                let quoted = inner
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                    .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
                let segment = match quoted {
                    Some(key) => Segment::Key(key.to_string()),
                    None => Segment::Index(
                        inner
                            .parse()
                            .map_err(|_| format!("'{inner}' is neither a quoted key nor an index"))?,
                    ),
                };
                segments.push(segment);
                i = close + 1;
            }
            other => return Err(format!("unexpected '{other}' in '{path}'")),
        }
    }

    Ok(segments)
}
