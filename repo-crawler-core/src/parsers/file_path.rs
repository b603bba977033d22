use std::collections::BTreeMap;

use super::single;
use crate::contract::ContentParser;
use crate::model::IndicatorDefinition;

/// `findFilePath`: ignores the content and reports the path the file was fetched from,
/// which is the redirected path when the repository config redirects it.
pub struct FilePathParser;

impl FilePathParser {
    pub const NAME: &'static str = "findFilePath";
}

impl ContentParser for FilePathParser {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn parse(
        &self,
        _content: &str,
        file_path: &str,
        definition: &IndicatorDefinition,
    ) -> BTreeMap<String, String> {
        single(definition, file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_the_fetched_path() {
        let definition = IndicatorDefinition::new("pomPath", FilePathParser::NAME);
        let result = FilePathParser.parse("<project/>", "modules/api/pom.xml", &definition);
        assert_eq!(result["pomPath"], "modules/api/pom.xml");
    }
}
