//! Configuration loader for kateline.
//!
//! `defaults/kateline.default.toml` is embedded into the library so that docs and
//! runtime behavior stay in sync. Hosts layer their own files on top of those
//! defaults via [`Loader`] before deserializing into [`KatelineConfig`].

use crate::syntax::loader::LoadOptions;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, Map, ValueKind};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../defaults/kateline.default.toml");
const ENV_PREFIX: &str = "KATELINE";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct KatelineConfig {
    pub registry: RegistryConfig,
    pub loading: LoadingConfig,
    pub output: OutputConfig,
}

/// Where the grammar registry looks for definition files.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub search_paths: Vec<String>,
    pub extension: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadingConfig {
    pub validate: bool,
    pub max_validation_depth: usize,
}

impl LoadingConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            validate: self.validate,
            max_validation_depth: self.max_validation_depth,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// How the binary renders tokenized lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub const NAMES: [&'static str; 3] = ["text", "json", "yaml"];

    pub fn from_name(name: &str) -> Option<OutputFormat> {
        match name {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "yaml" => Some(OutputFormat::Yaml),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        };
        write!(f, "{}", name)
    }
}

/// Builds a [`KatelineConfig`] from layered sources.
///
/// Later layers win: embedded defaults, then files in the order added, then
/// `KATELINE_*` environment variables, then explicit overrides.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    pub fn new() -> Self {
        Self {
            builder: Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml)),
        }
    }

    /// Layer a TOML file that must exist.
    pub fn with_file(self, path: impl AsRef<Path>) -> Self {
        self.layer_file(path.as_ref(), true)
    }

    /// Layer a TOML file if it exists, e.g. a per-user `kateline.toml`.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> Self {
        self.layer_file(path.as_ref(), false)
    }

    /// Layer `KATELINE_<SECTION>__<KEY>` variables from the process environment,
    /// so `KATELINE_LOADING__VALIDATE=false` turns validation off.
    pub fn with_environment(self) -> Self {
        self.layer_environment(None)
    }

    /// Override one dotted key, e.g. `output.format` from a command-line flag.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<KatelineConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }

    fn layer_file(mut self, path: &Path, required: bool) -> Self {
        let source = File::from(path).format(FileFormat::Toml).required(required);
        self.builder = self.builder.add_source(source);
        self
    }

    fn layer_environment(mut self, variables: Option<Map<String, String>>) -> Self {
        let source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(variables);
        self.builder = self.builder.add_source(source);
        self
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// The embedded defaults with nothing layered on top.
pub fn load_defaults() -> Result<KatelineConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_default_config() {
        let config = load_defaults().expect("defaults to deserialize");
        assert_eq!(config.registry.search_paths, vec!["samples".to_string()]);
        assert_eq!(config.registry.extension, "xml");
        assert!(config.loading.validate);
        assert_eq!(config.loading.max_validation_depth, 16);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn supports_overrides() {
        let config = Loader::new()
            .set_override("output.format", "yaml")
            .expect("override to apply")
            .set_override("loading.validate", false)
            .expect("override to apply")
            .build()
            .expect("config to build");
        assert_eq!(config.output.format, OutputFormat::Yaml);
        assert_eq!(
            config.loading.load_options(),
            LoadOptions {
                validate: false,
                max_validation_depth: 16
            }
        );
    }

    #[test]
    fn layers_user_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kateline.toml");
        fs::write(
            &path,
            "[registry]\nsearch_paths = [\"/usr/share/katepart/syntax\"]\n[loading]\nmax_validation_depth = 4\n",
        )
        .unwrap();
        let config = Loader::new().with_file(&path).build().unwrap();
        assert_eq!(
            config.registry.search_paths,
            vec!["/usr/share/katepart/syntax".to_string()]
        );
        assert_eq!(config.loading.max_validation_depth, 4);
        assert!(config.loading.validate);
    }

    #[test]
    fn optional_file_may_be_absent() {
        let config = Loader::new()
            .with_optional_file("/no/such/kateline.toml")
            .build()
            .unwrap();
        assert_eq!(config.registry.extension, "xml");
    }

    #[test]
    fn environment_sits_between_files_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kateline.toml");
        fs::write(&path, "[loading]\nmax_validation_depth = 4\n[output]\nformat = \"json\"\n")
            .unwrap();
        let variables = Map::from([
            ("KATELINE_LOADING__MAX_VALIDATION_DEPTH".to_string(), "8".to_string()),
            ("KATELINE_OUTPUT__FORMAT".to_string(), "yaml".to_string()),
            ("OTHER_OUTPUT__FORMAT".to_string(), "text".to_string()),
        ]);
        let config = Loader::new()
            .with_file(&path)
            .layer_environment(Some(variables))
            .set_override("output.format", "text")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.loading.max_validation_depth, 8);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn rejects_unknown_output_format() {
        let result = Loader::new()
            .set_override("output.format", "html")
            .unwrap()
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn output_format_names() {
        for name in OutputFormat::NAMES {
            assert_eq!(OutputFormat::from_name(name).unwrap().to_string(), name);
        }
        assert_eq!(OutputFormat::from_name("xml"), None);
    }
}
