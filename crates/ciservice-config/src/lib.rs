//! Layered configuration for the caller-information service daemon.
//!
//! [`Config`] merges built-in defaults, a TOML configuration file, `CISERVICE_*`
//! environment variables, and command-line flags via `ortho_config`. Later
//! layers win: CLI flags override the environment, which overrides the file.
//!
//! A configuration file might look like:
//!
//! ```toml
//! host = "pbx.example.org"
//! port = 63690
//! retry_interval = 5
//! activate = ["popup"]
//!
//! [[services]]
//! name = "popup"
//! command = "notify-send 'Incoming call' ${name}"
//! lookup_id = 2
//! ```

mod defaults;
mod endpoint;
mod logging;
mod service;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_MAX_PAYLOAD_LEN, DEFAULT_PORT,
    DEFAULT_RETRY_INTERVAL_SECS, PIDFILE_NAME, default_log_filter, default_log_format,
    default_pidfile,
};
pub use endpoint::{EndpointParseError, ServerEndpoint};
pub use logging::{LogFormat, LogFormatParseError};
pub use ortho_config::OrthoError;
pub use service::{ServiceEntry, ServiceEntryParseError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "CISERVICE")]
#[serde(default)]
pub struct Config {
    /// Host name of the call-information server.
    pub host: String,
    /// TCP port of the call-information server.
    pub port: u16,
    /// Seconds between reconnect attempts; `0` disables reconnecting.
    pub retry_interval: u64,
    /// Largest accepted frame payload in bytes.
    pub max_payload_len: u32,
    /// Pid file written when running as a daemon.
    pub pidfile: Option<Utf8PathBuf>,
    /// Detach into the background after start-up.
    pub daemonize: bool,
    /// Print the configured services and exit.
    pub list: bool,
    /// Print the daemon version and exit.
    #[ortho_config(cli_long = "print-version", cli_short = 'v')]
    pub print_version: bool,
    /// `tracing` filter expression.
    pub log_filter: String,
    /// Output format of log records.
    pub log_format: LogFormat,
    /// Named services, sleeping unless activated.
    pub services: Vec<ServiceEntry>,
    /// Anonymous command templates, always active.
    pub commands: Vec<String>,
    /// Names of services to activate.
    pub activate: Vec<String>,
    /// External command used to resolve caller names for services with a
    /// lookup id.
    pub resolver_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            retry_interval: DEFAULT_RETRY_INTERVAL_SECS,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            pidfile: None,
            daemonize: false,
            list: false,
            print_version: false,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            services: Vec::new(),
            commands: Vec::new(),
            activate: Vec::new(),
            resolver_command: None,
        }
    }
}

impl Config {
    /// Server the daemon connects to.
    #[must_use]
    pub fn server_endpoint(&self) -> ServerEndpoint {
        ServerEndpoint::new(self.host.clone(), self.port)
    }

    /// Delay between reconnect attempts, `None` when reconnecting is disabled.
    #[must_use]
    pub const fn retry_interval(&self) -> Option<Duration> {
        if self.retry_interval == 0 {
            None
        } else {
            Some(Duration::from_secs(self.retry_interval))
        }
    }

    /// Largest accepted frame payload in bytes.
    #[must_use]
    pub const fn max_payload_len(&self) -> u32 {
        self.max_payload_len
    }

    /// Pid file location, falling back to the runtime directory.
    #[must_use]
    pub fn pidfile(&self) -> Utf8PathBuf {
        self.pidfile.clone().unwrap_or_else(default_pidfile)
    }

    /// Explicitly configured pid file, if any.
    #[must_use]
    pub fn configured_pidfile(&self) -> Option<&Utf8Path> {
        self.pidfile.as_deref()
    }

    /// Whether the daemon should detach from the terminal.
    #[must_use]
    pub const fn daemonize(&self) -> bool {
        self.daemonize
    }

    /// Whether only the service listing was requested.
    #[must_use]
    pub const fn list_services(&self) -> bool {
        self.list
    }

    /// Whether only the version banner was requested.
    #[must_use]
    pub const fn print_version(&self) -> bool {
        self.print_version
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Named services in declaration order.
    #[must_use]
    pub fn services(&self) -> &[ServiceEntry] {
        &self.services
    }

    /// Anonymous command templates in declaration order.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Service names to activate.
    #[must_use]
    pub fn activate(&self) -> &[String] {
        &self.activate
    }

    /// External resolver command line, if configured.
    #[must_use]
    pub fn resolver_command(&self) -> Option<&str> {
        self.resolver_command.as_deref()
    }
}
