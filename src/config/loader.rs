// src/config/loader.rs
//! Layered configuration loader: defaults, TOML files, then environment overrides

use crate::config::{constants::paths, ConfigError, SessionConfig};
use ::config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration loader
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader over the default search paths
    pub fn new() -> Self {
        Self {
            config_paths: Self::discover_config_paths(),
            env_prefix: paths::ENV_PREFIX.to_string(),
        }
    }

    /// Create loader with custom paths
    pub fn with_paths(config_paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths,
            env_prefix: paths::ENV_PREFIX.to_string(),
        }
    }

    /// Override the environment variable prefix
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Load and validate a session configuration.
    ///
    /// Later sources win: each existing file in order, then variables such as
    /// `BEAMFORM__CHANNEL_COUNT` or `BEAMFORM__POST_FILTER__ENABLED`.
    pub fn load(&self) -> Result<SessionConfig, ConfigError> {
        let mut builder = Config::builder();

        for path in &self.config_paths {
            if path.exists() {
                debug!(path = %path.display(), "adding configuration file");
                builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .separator(paths::ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config: SessionConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            channels = config.channel_count,
            sample_rate_hz = config.sample_rate_hz,
            window_size = config.window_size,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load a configuration from a TOML string, without environment overrides
    pub fn from_toml_str(content: &str) -> Result<SessionConfig, ConfigError> {
        let config: SessionConfig = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Export a configuration to a TOML file
    pub fn export<P: AsRef<Path>>(config: &SessionConfig, path: P) -> Result<(), ConfigError> {
        let toml_content =
            toml::to_string_pretty(config).map_err(|e| ConfigError::Export(e.to_string()))?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Paths searched for configuration files
    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from(paths::DEFAULT_CONFIG_FILE),
            PathBuf::from(paths::LOCAL_CONFIG_FILE),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_toml(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_missing_files_yield_defaults() {
        let loader = ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/beamform.toml")])
            .with_env_prefix("BEAMFORM_TEST_MISSING");
        let config = loader.load().unwrap();
        assert_eq!(config.channel_count, SessionConfig::default().channel_count);
    }

    #[test]
    #[serial]
    fn test_later_files_override_earlier() {
        let base = temp_toml("channel_count = 2\nwindow_size = 2048\n");
        let local = temp_toml("window_size = 8192\n");

        let loader = ConfigLoader::with_paths(vec![
            base.path().to_path_buf(),
            local.path().to_path_buf(),
        ])
        .with_env_prefix("BEAMFORM_TEST_LAYERS");
        let config = loader.load().unwrap();

        assert_eq!(config.channel_count, 2);
        assert_eq!(config.window_size, 8192);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        std::env::set_var("BEAMFORM_TEST_ENV__CHANNEL_COUNT", "1");
        let loader = ConfigLoader::with_paths(Vec::new()).with_env_prefix("BEAMFORM_TEST_ENV");
        let config = loader.load();
        std::env::remove_var("BEAMFORM_TEST_ENV__CHANNEL_COUNT");

        assert_eq!(config.unwrap().channel_count, 1);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let result = ConfigLoader::from_toml_str("[frame]\nsamples = 256\nms = 16.0\n");
        assert!(matches!(result, Err(ConfigError::FrameSize("both"))));
    }

    #[test]
    fn test_export_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exported.toml");

        let mut config = SessionConfig::default();
        config.post_filter.enabled = true;
        ConfigLoader::export(&config, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let reloaded = ConfigLoader::from_toml_str(&content).unwrap();
        assert!(reloaded.post_filter.enabled);
        assert_eq!(reloaded.window_size, config.window_size);
    }
}
