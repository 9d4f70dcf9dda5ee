//! Configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::fs;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use ciservice_config::{Config, ServiceEntry};

use crate::bootstrap::ConfigLoader;

/// Loader returning a configuration assembled by the test.
#[derive(Debug, Clone, Default)]
pub struct TestConfigLoader {
    config: Config,
}

impl TestConfigLoader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Adds a named service declared in the configuration file.
    pub fn with_service(mut self, entry: ServiceEntry) -> Self {
        self.config.services.push(entry);
        self
    }

    /// Adds an anonymous, always-active command.
    pub fn with_command(mut self, command: &str) -> Self {
        self.config.commands.push(command.to_owned());
        self
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Loader pointing `--config-path` at a malformed TOML file.
pub struct FailingConfigLoader {
    dir: TempDir,
}

impl FailingConfigLoader {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create config directory");
        fs::write(dir.path().join("ciservice.toml"), "port = not_a_number")
            .expect("write malformed config");
        Self { dir }
    }
}

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("ciserviced"),
            OsString::from("--config-path"),
            self.dir.path().join("ciservice.toml").into_os_string(),
        ];
        Config::load_from_iter(args)
    }
}
