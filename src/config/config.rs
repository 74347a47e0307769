use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use std::{
    borrow::Cow,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

use crate::{ext::BestEffortPathExt, sync::SyncSettings};

const CONFIG_FILE_NAME: &str = "explorer.yaml";
const DEFAULT_STORE_DIR: &str = ".explorer";

fn get_config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Settings read from `explorer.yaml` in the workspace root.
///
/// ```yaml
/// sync:
///   debounce_ms: 300
///   retry_ms: 1000
///   max_retries: 5
/// store_dir: .explorer
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerConfig {
    pub sync: SyncSettings,
    /// Directory of the durable store, relative to the workspace root.
    pub store_dir: PathBuf,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            sync: SyncSettings::default(),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
        }
    }
}

impl ExplorerConfig {
    /// Reads the config from the workspace root, falling back to defaults
    /// when there is no config file.
    pub async fn read(root: &Path) -> Result<Self, ConfigError> {
        let path = get_config_file_path(root);
        debug!("Opening config file: {}", path.best_effort_path_display());
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No {CONFIG_FILE_NAME} found, using default settings");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).context(ReadSnafu {
                    file_path: path.best_effort_path_display(),
                });
            }
        };
        debug!("Successfully read config file: {} bytes", bytes.len());

        let contents = String::from_utf8(bytes).map_err(|_| ConfigError::NotUtf8)?;
        contents.as_str().try_into()
    }

    fn parse_sync(
        top_level: &LinkedHashMap<Yaml, Yaml>,
    ) -> Result<SyncSettings, ConfigError> {
        let defaults = SyncSettings::default();
        let Some(section) = top_level.get(&key("sync")) else {
            return Ok(defaults);
        };
        let section = section.as_mapping().ok_or(ConfigError::SyncNotMap)?;

        let debounce = read_u64(section, "debounce_ms")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.debounce);
        let retry_delay = read_u64(section, "retry_ms")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_delay);
        let max_retries = match read_u64(section, "max_retries")? {
            Some(value) => u32::try_from(value).map_err(|_| ConfigError::InvalidValue {
                key: "max_retries".to_string(),
            })?,
            None => defaults.max_retries,
        };

        Ok(SyncSettings {
            debounce,
            retry_delay,
            max_retries,
        })
    }
}

impl TryFrom<&str> for ExplorerConfig {
    type Error = ConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let Some(document) = documents.first() else {
            // An empty file configures nothing.
            return Ok(Self::default());
        };

        let top_level = document.as_mapping().ok_or(ConfigError::TopLevelNotMap)?;
        let sync = Self::parse_sync(top_level)?;
        let store_dir = match top_level.get(&key("store_dir")) {
            None => PathBuf::from(DEFAULT_STORE_DIR),
            Some(value) => value
                .as_str()
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "store_dir".to_string(),
                })?,
        };

        Ok(ExplorerConfig { sync, store_dir })
    }
}

fn key(name: &'static str) -> Yaml<'static> {
    Yaml::Value(Scalar::String(Cow::Borrowed(name)))
}

fn read_u64(
    section: &LinkedHashMap<Yaml, Yaml>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match section.get(&key(name)) {
        None => Ok(None),
        Some(Yaml::Value(Scalar::Integer(value))) => u64::try_from(*value)
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: name.to_string(),
            }),
        Some(_) => InvalidValueSnafu { key: name }.fail(),
    }
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("The config file is not valid UTF-8"))]
    NotUtf8,
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Sync section should be a map"))]
    SyncNotMap,
    #[snafu(display("Invalid value for '{}'", key))]
    InvalidValue { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use tempfile::TempDir;

    #[compio::test]
    async fn missing_config_file_yields_defaults() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let config = ExplorerConfig::read(dir.path()).await.unwrap();
        assert_eq!(config, ExplorerConfig::default());
    }

    #[compio::test]
    async fn config_is_read_from_workspace_root() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "sync:\n  debounce_ms: 50\nstore_dir: state\n",
        )
        .expect("Failed to write config file");

        let config = ExplorerConfig::read(dir.path()).await.unwrap();
        assert_eq!(config.sync.debounce, Duration::from_millis(50));
        assert_eq!(config.sync.retry_delay, SyncSettings::default().retry_delay);
        assert_eq!(config.store_dir, PathBuf::from("state"));
    }

    #[test]
    fn full_config_is_parsed() {
        let yaml = r#"
sync:
  debounce_ms: 120
  retry_ms: 2000
  max_retries: 3
store_dir: ".state/projects"
"#;
        let config: ExplorerConfig = yaml.try_into().unwrap();
        assert_eq!(
            config.sync,
            SyncSettings {
                debounce: Duration::from_millis(120),
                retry_delay: Duration::from_millis(2000),
                max_retries: 3,
            }
        );
        assert_eq!(config.store_dir, PathBuf::from(".state/projects"));
    }

    #[rstest]
    #[case("")]
    #[case("other: value")]
    #[case("sync: {}")]
    fn sparse_configs_fall_back_to_defaults(#[case] yaml: &str) {
        let config: ExplorerConfig = yaml.try_into().unwrap();
        assert_eq!(config, ExplorerConfig::default());
    }

    #[rstest]
    #[case("- item1\n- item2")]
    #[case("just a string")]
    fn top_level_must_be_a_map(#[case] yaml: &str) {
        let result: Result<ExplorerConfig, _> = yaml.try_into();
        assert!(matches!(result, Err(ConfigError::TopLevelNotMap)));
    }

    #[rstest]
    #[case("sync:\n  debounce_ms: fast", "debounce_ms")]
    #[case("sync:\n  retry_ms: -5", "retry_ms")]
    #[case("sync:\n  max_retries: 99999999999", "max_retries")]
    #[case("store_dir: 42", "store_dir")]
    fn invalid_values_are_named(#[case] yaml: &str, #[case] expected: &str) {
        let result: Result<ExplorerConfig, _> = yaml.try_into();
        match result {
            Err(ConfigError::InvalidValue { key }) => assert_eq!(key, expected),
            other => panic!("Expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let result: Result<ExplorerConfig, _> = "invalid: yaml: content: [unclosed".try_into();
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn sync_section_must_be_a_map() {
        let result: Result<ExplorerConfig, _> = "sync: 5".try_into();
        assert!(matches!(result, Err(ConfigError::SyncNotMap)));
    }
}
