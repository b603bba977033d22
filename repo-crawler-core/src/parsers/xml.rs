use std::collections::BTreeMap;

use roxmltree::{Document, Node};
use tracing::{debug, warn};

use super::{required_param, single, CONFIG_ISSUE, NOT_FOUND};
use crate::contract::ContentParser;
use crate::model::IndicatorDefinition;

/// `findDependencyVersionInXml`: version of the Maven dependency whose `artifactId`
/// matches, with `${property}` placeholders resolved from the `<properties>` section.
pub struct PomDependencyVersionParser;

impl PomDependencyVersionParser {
    pub const NAME: &'static str = "findDependencyVersionInXml";
    pub const ARTIFACT_ID: &'static str = "artifactId";
}

impl ContentParser for PomDependencyVersionParser {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parse(
        &self,
        content: &str,
        _file_path: &str,
        definition: &IndicatorDefinition,
    ) -> BTreeMap<String, String> {
        let Some(artifact_id) = required_param(definition, Self::ARTIFACT_ID) else {
            return single(definition, CONFIG_ISSUE);
        };

        let document = match Document::parse(content) {
            Ok(document) => document,
            Err(e) => {
                warn!(indicator = %definition.name, error = %e, "problem while parsing xml file");
                return single(definition, format!("error while processing {e}"));
            }
        };

        single(definition, dependency_version(&document, artifact_id))
    }
}

fn dependency_version(document: &Document, artifact_id: &str) -> String {
    let mut artifact_seen = false;

    for node in document.descendants().filter(|n| has_local_name(n, "artifactId")) {
        if node.text().map(str::trim) != Some(artifact_id) {
            continue;
        }
        artifact_seen = true;

        let version = node
            .parent_element()
            .and_then(|p| p.children().find(|c| has_local_name(c, "version")))
            .and_then(|v| v.text())
            .map(str::trim);

        if let Some(version) = version {
            debug!(artifact_id, version, "found dependency version");
            return match version.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
                Some(property) => property_value(document, property)
                    .unwrap_or_else(|| format!("{version} not found in properties section")),
                None => version.to_string(),
            };
        }
    }

    if artifact_seen {
        "artifact found, but not the version".to_string()
    } else {
        NOT_FOUND.to_string()
    }
}

fn property_value(document: &Document, property: &str) -> Option<String> {
    document
        .descendants()
        .filter(|n| has_local_name(n, "properties"))
        .flat_map(|properties| properties.children())
        .find(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case(property))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
}

/// `countMatchingXmlElements`: number of elements matching a simple location path,
/// either absolute (`/project/dependencies/dependency`) or relative to any
/// element (`//dependencies/dependency`). `*` matches any element. Namespaces are ignored.
pub struct CountXmlElementsParser;

impl CountXmlElementsParser {
    pub const NAME: &'static str = "countMatchingXmlElements";
    pub const XPATH_TO_MATCH: &'static str = "xpathToMatch";
}

impl ContentParser for CountXmlElementsParser {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parse(
        &self,
        content: &str,
        _file_path: &str,
        definition: &IndicatorDefinition,
    ) -> BTreeMap<String, String> {
        let Some(path) = required_param(definition, Self::XPATH_TO_MATCH) else {
            return single(definition, CONFIG_ISSUE);
        };

        let document = match Document::parse(content) {
            Ok(document) => document,
            Err(e) => {
                warn!(indicator = %definition.name, error = %e, "problem while parsing xml file");
                return single(definition, format!("issue while parsing {e}"));
            }
        };

        match count_matching(&document, path) {
            Ok(count) => single(definition, count.to_string()),
            Err(e) => {
                warn!(indicator = %definition.name, xpath = path, error = %e, "unsupported xpath in config");
                single(definition, CONFIG_ISSUE)
            }
        }
    }
}

fn count_matching(document: &Document, path: &str) -> Result<usize, String> {
    let path = path.trim();
    let (anywhere, rest) = if let Some(rest) = path.strip_prefix("//") {
        (true, rest)
    } else if let Some(rest) = path.strip_prefix('/') {
        (false, rest)
    } else {
        return Err(format!("'{path}' must start with '/' or '//'"));
    };

    let steps: Vec<&str> = rest.split('/').collect();
    if steps
        .iter()
        .any(|s| s.is_empty() || s.contains(['[', '@', '(', ':']))
    {
        return Err(format!("'{path}' is not a simple element path"));
    }

    let first = steps[0];
    let mut current: Vec<Node> = if anywhere {
        document
            .descendants()
            .filter(|n| step_matches(n, first))
            .collect()
    } else {
        let root = document.root_element();
        if step_matches(&root, first) {
            vec![root]
        } else {
            Vec::new()
        }
    };

    for step in &steps[1..] {
        let step = *step;
        current = current
            .iter()
            .flat_map(|n| n.children().filter(move |c| step_matches(c, step)))
            .collect();
    }

    Ok(current.len())
}

fn step_matches(node: &Node, step: &str) -> bool {
    node.is_element() && (step == "*" || node.tag_name().name() == step)
}

fn has_local_name(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}
