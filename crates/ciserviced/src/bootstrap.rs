//! Daemon bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::warn;

use ciservice_config::Config;

use crate::client::{ClientHandle, ClientLoop, ClientSettings, Connector};
use crate::dispatch::{
    CallerResolver, CommandResolver, CommandSpawner, DispatchEngine, RingDispatcher,
};
use crate::health::LifecycleReporter;
use crate::protocol::ProtocolClient;
use crate::services::{ServiceError, ServiceRegistry};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the aggregated `ortho_config` error when any layer is invalid.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already-resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// An anonymous command could not be registered.
    #[error("invalid command '{command}': {source}")]
    Command {
        /// Command template as configured.
        command: String,
        /// Registration failure.
        #[source]
        source: ServiceError,
    },
    /// The resolver command is not runnable.
    #[error("invalid resolver command '{command}': {source}")]
    Resolver {
        /// Resolver command line as configured.
        command: String,
        /// Validation failure.
        #[source]
        source: ServiceError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    engine: DispatchEngine,
    resolver: Option<Arc<dyn CallerResolver>>,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn LifecycleReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Services registered from the configuration.
    #[must_use]
    pub const fn registry(&self) -> &ServiceRegistry {
        self.engine.registry()
    }

    /// Whether a caller-name resolver is configured.
    #[must_use]
    pub const fn has_resolver(&self) -> bool {
        self.resolver.is_some()
    }

    /// Wires the dispatch engine into a client loop connecting through
    /// `connector`.
    pub fn into_client(self, connector: Arc<dyn Connector>) -> (ClientLoop, ClientHandle) {
        let settings = ClientSettings::from_config(&self.config);
        let protocol = ProtocolClient::new(RingDispatcher::new(self.engine, self.resolver));
        ClientLoop::new(settings, connector, protocol, self.reporter)
    }
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] when the configuration cannot be loaded,
/// telemetry cannot be installed, an anonymous command is invalid, or the
/// resolver command is not runnable. Invalid named services are skipped with
/// a warning instead.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn LifecycleReporter>,
    spawner: Arc<dyn CommandSpawner>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    match assemble(loader, spawner) {
        Ok((config, engine, resolver, telemetry)) => {
            reporter.bootstrap_succeeded(&config);
            Ok(Daemon {
                config,
                engine,
                resolver,
                telemetry,
                reporter,
            })
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

type Assembled = (
    Config,
    DispatchEngine,
    Option<Arc<dyn CallerResolver>>,
    TelemetryHandle,
);

fn assemble(
    loader: &dyn ConfigLoader,
    spawner: Arc<dyn CommandSpawner>,
) -> Result<Assembled, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    let registry = build_registry(&config)?;
    let resolver = match config.resolver_command() {
        Some(command) => {
            let resolver =
                CommandResolver::new(command).map_err(|source| BootstrapError::Resolver {
                    command: command.to_owned(),
                    source,
                })?;
            Some(Arc::new(resolver) as Arc<dyn CallerResolver>)
        }
        None => None,
    };
    let engine = DispatchEngine::new(registry, spawner);
    Ok((config, engine, resolver, telemetry))
}

/// Registers the configured services, in file order followed by anonymous
/// commands, and applies `activate`.
///
/// # Errors
///
/// Returns [`BootstrapError::Command`] for the first invalid anonymous
/// command.
pub fn build_registry(config: &Config) -> Result<ServiceRegistry, BootstrapError> {
    let mut registry = ServiceRegistry::new();
    for entry in config.services() {
        match registry.add(Some(&entry.name), &entry.command, entry.active) {
            Ok(service) => {
                if let Some(lookup_id) = entry.lookup_id {
                    service.with_lookup_id(lookup_id);
                }
            }
            Err(error) => warn!(
                target: BOOTSTRAP_TARGET,
                service = %entry.name,
                error = %error,
                "skipping invalid service"
            ),
        }
    }
    for command in config.commands() {
        registry
            .add(None, command, true)
            .map_err(|source| BootstrapError::Command {
                command: command.clone(),
                source,
            })?;
    }
    for name in config.activate() {
        match registry.get_mut(name) {
            Some(service) => {
                service.set_active(true);
            }
            None => warn!(
                target: BOOTSTRAP_TARGET,
                service = %name,
                "cannot activate unknown service"
            ),
        }
    }
    Ok(registry)
}
