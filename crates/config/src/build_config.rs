//! Publication pipeline configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// External converter command templates
///
/// Each template is split on whitespace; `{input}` and `{output}` are replaced
/// with the source document and the destination file. An empty template leaves
/// that format without a converter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConverterCommands {
    pub pdf: String,
    pub epub: String,
    pub mobi: String,
    pub cover: String,
}

/// Settings for the per-book derived file builds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    /// Build PDF files after publication
    pub build_pdf: bool,

    /// Build EPUB files after publication
    pub build_epub: bool,

    /// Build MOBI files after publication
    pub build_mobi: bool,

    /// Build plain text files after publication
    pub build_txt: bool,

    /// Keep the full-text search index in step with publications
    pub search_index: bool,

    /// Run builds in-line instead of in the background
    pub eager: bool,

    /// Upper bound on background builds running at once
    pub max_concurrent_builds: usize,

    /// Converter command templates
    pub converters: ConverterCommands,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_pdf: true,
            build_epub: true,
            build_mobi: true,
            build_txt: true,
            search_index: true,
            eager: false,
            max_concurrent_builds: 2,
            converters: ConverterCommands::default(),
        }
    }
}

impl ConfigSection for BuildConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let results = vec![
            Validator::in_range(
                self.max_concurrent_builds,
                1,
                32,
                "build.max_concurrent_builds",
            ),
            Validator::command_template(&self.converters.pdf, "build.converters.pdf"),
            Validator::command_template(&self.converters.epub, "build.converters.epub"),
            Validator::command_template(&self.converters.mobi, "build.converters.mobi"),
            Validator::command_template(&self.converters.cover, "build.converters.cover"),
        ];

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        *self = other;
    }

    fn section_name(&self) -> &'static str {
        "build"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = BuildConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.eager);
        assert_eq!(config.max_concurrent_builds, 2);
    }

    #[test]
    fn test_concurrency_bounds() {
        let mut config = BuildConfig::default();
        config.max_concurrent_builds = 0;
        assert!(config.validate().is_err());

        config.max_concurrent_builds = 33;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_converter_templates_checked() {
        let mut config = BuildConfig::default();
        config.converters.pdf = "xelatex {input}".to_string();
        config.converters.epub = "ebook-convert {output}".to_string();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "build.converters.pdf");
    }

    #[test]
    fn test_merge_replaces_section() {
        let mut base = BuildConfig::default();
        let mut other = BuildConfig::default();
        other.eager = true;
        other.converters.epub = "pandoc {input} -o {output}".to_string();

        base.merge(other.clone());
        assert_eq!(base, other);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BuildConfig = toml::from_str("eager = true\n[converters]\nepub = \"c {input} {output}\"")
            .expect("Should parse partial section");
        assert!(config.eager);
        assert!(config.build_pdf);
        assert_eq!(config.converters.epub, "c {input} {output}");
        assert!(config.converters.pdf.is_empty());
    }
}
