//! Log output for the daemon.
//!
//! One global `tracing` subscriber writes to stderr. The settings of the
//! first [`initialise`] call stay in force for the life of the process; later
//! calls hand back a handle describing them. Events raised on the client
//! thread run inside a `connection` span carrying the server address, so the
//! JSON records of every connect, loss and reconnect name the server.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Span, Subscriber, debug, info_span, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use ciservice_config::{Config, LogFormat, ServerEndpoint};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static INSTALLED: OnceCell<TelemetrySettings> = OnceCell::new();

/// Filter and format the subscriber is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    filter: String,
    format: LogFormat,
}

impl TelemetrySettings {
    /// Reads the log settings out of `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            filter: config.log_filter().to_owned(),
            format: config.log_format(),
        }
    }

    /// `EnvFilter` directive.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Record format.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}

/// Describes the subscriber that is in force.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryHandle {
    settings: &'static TelemetrySettings,
}

impl TelemetryHandle {
    /// Settings of the installed subscriber.
    #[must_use]
    pub const fn settings(&self) -> &'static TelemetrySettings {
        self.settings
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression did not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Directive as configured.
        filter: String,
        /// Parser message.
        message: String,
    },
    /// Another global subscriber was installed first.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on the first call.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when `log_filter` is not a valid
/// `EnvFilter` directive, or [`TelemetryError::Subscriber`] when a subscriber
/// installed elsewhere is already active.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let requested = TelemetrySettings::from_config(config);
    let settings = INSTALLED.get_or_try_init(|| {
        install_subscriber(&requested)?;
        Ok::<_, TelemetryError>(requested.clone())
    })?;
    if *settings != requested {
        debug!(
            target: TELEMETRY_TARGET,
            kept_filter = %settings.filter(),
            kept_format = %settings.format(),
            "log settings already installed; ignoring later settings"
        );
    }
    Ok(TelemetryHandle { settings })
}

/// Span wrapping the client loop of one server connection.
#[must_use]
pub fn connection_span(endpoint: &ServerEndpoint) -> Span {
    info_span!(
        target: TELEMETRY_TARGET,
        "connection",
        server = %endpoint,
        host = %endpoint.host(),
        port = endpoint.port()
    )
}

fn install_subscriber(settings: &TelemetrySettings) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(settings.filter()).map_err(|error| TelemetryError::Filter {
        filter: settings.filter().to_owned(),
        message: error.to_string(),
    })?;

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match settings.format() {
        LogFormat::Json => Box::new(
            builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .finish(),
        ),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
